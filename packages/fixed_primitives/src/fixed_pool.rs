use core::any::type_name;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
#[cfg(all(debug_assertions, target_has_atomic = "ptr"))]
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{DropPolicy, Exhausted, FixedPoolBuilder, thread_is_panicking};

/// An object pool with a fixed capacity of `CAPACITY` objects of type `T`, stored inline.
///
/// The pool never allocates: all storage is part of the pool value itself, so a pool placed in
/// a `static` or on the stack needs no heap at all. [`new()`][1] is a `const fn` for that reason.
///
/// Creating an object claims a vacant slot and returns a [`Handle`] that exclusively owns the
/// object until it is passed back to [`destroy()`][2] or [`take()`][3]. Handles cannot be copied,
/// so an object cannot be destroyed twice. When the pool is full, [`create()`][4] hands the value
/// back inside [`Exhausted`] instead of failing silently.
///
/// # Free slot bookkeeping
///
/// Vacant slots that have been used before form a LIFO free list threaded through the slots
/// themselves, so the most recently released slot is the next one to be reused. Slots that have
/// never been used are handed out in index order after the free list runs dry. Both paths are
/// O(1) and, as all slots have the same size, the pool cannot fragment.
///
/// # Misuse
///
/// Passing a handle to a pool that did not issue it, or using a handle after [`clear()`][5], is a
/// usage error. In debug builds every handle is stamped with the identity of its pool and the
/// generation of its slot, and the pool panics on a mismatch. In release builds the pool only
/// panics if the handle points at a vacant slot; if it points at an occupied slot, the pool
/// operates on that object instead. This is memory-safe but almost certainly a logic bug.
///
/// # Examples
///
/// ```
/// use fixed_primitives::FixedPool;
///
/// let mut pool = FixedPool::<(i32, f64), 10>::new();
///
/// let handle = pool.create((1, 2.0)).unwrap();
/// assert_eq!(*pool.get(&handle), (1, 2.0));
///
/// pool.get_mut(&handle).0 = 5;
/// assert_eq!(pool.get(&handle).0, 5);
///
/// pool.destroy(handle);
/// assert!(pool.is_empty());
/// ```
///
/// [1]: Self::new
/// [2]: Self::destroy
/// [3]: Self::take
/// [4]: Self::create
/// [5]: Self::clear
pub struct FixedPool<T, const CAPACITY: usize> {
    entries: [Entry<T>; CAPACITY],

    /// Index of the most recently released slot. Think of this as a virtual stack of freed slots,
    /// with the stack entries stored in the slots themselves. This is `CAPACITY` if no
    /// previously used slot is vacant.
    next_free_index: usize,

    /// Number of leading slots that have ever held an object. Slots at or beyond this index are
    /// vacant and not on the free list.
    initialized_count: usize,

    /// The number of live objects.
    count: usize,

    drop_policy: DropPolicy,

    /// Assigned when the first handle is issued, zero before that.
    #[cfg(debug_assertions)]
    pool_id: usize,

    /// Bumped whenever the object in the slot goes away, so handles to it can be recognized
    /// as stale.
    #[cfg(debug_assertions)]
    generations: [usize; CAPACITY],
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { value: T },

    Vacant { next_free_index: usize },
}

/// Exclusive owner of an object living in a [`FixedPool`].
///
/// Returned by [`FixedPool::create()`] and [`FixedPool::create_with()`]. The handle is neither
/// `Copy` nor `Clone`: the only way to end the object's life early is to hand the handle back to
/// [`FixedPool::destroy()`] or [`FixedPool::take()`].
///
/// Dropping a handle without doing so leaves the object alive until the pool is cleared or
/// dropped.
#[must_use = "the object stays in the pool until the handle is passed to destroy() or take()"]
pub struct Handle<T> {
    index: usize,

    #[cfg(debug_assertions)]
    stamp: Stamp,

    _item: PhantomData<fn() -> T>,
}

/// Which pool issued a handle and which occupancy of the slot it refers to.
#[cfg(debug_assertions)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Stamp {
    pool_id: usize,
    generation: usize,
}

impl<T> Handle<T> {
    /// The index of the slot that holds the object.
    ///
    /// Slot indexes are stable for the lifetime of the object and are reused after it is
    /// destroyed.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("index", &self.index)
            .finish()
    }
}

impl<T, const CAPACITY: usize> FixedPool<T, CAPACITY> {
    /// Creates an empty pool with the default configuration.
    ///
    /// Fails to compile if `CAPACITY` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// static POOL: std::sync::Mutex<FixedPool<u64, 32>> = std::sync::Mutex::new(FixedPool::new());
    ///
    /// let mut pool = POOL.lock().unwrap();
    /// assert_eq!(pool.len(), 0);
    /// assert_eq!(pool.available(), 32);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self::with_drop_policy(DropPolicy::MayDropItems)
    }

    /// Starts building a new [`FixedPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    pub const fn builder() -> FixedPoolBuilder<T, CAPACITY> {
        FixedPoolBuilder::new()
    }

    #[must_use]
    pub(crate) const fn with_drop_policy(drop_policy: DropPolicy) -> Self {
        const {
            assert!(CAPACITY > 0, "FixedPool must have non-zero capacity");
            assert!(
                CAPACITY < usize::MAX,
                "FixedPool capacity must be less than usize::MAX"
            );
        }

        Self {
            entries: [const {
                Entry::Vacant {
                    next_free_index: CAPACITY,
                }
            }; CAPACITY],
            next_free_index: CAPACITY,
            initialized_count: 0,
            count: 0,
            drop_policy,
            #[cfg(debug_assertions)]
            pool_id: 0,
            #[cfg(debug_assertions)]
            generations: [0; CAPACITY],
        }
    }

    /// The maximum number of objects the pool can hold at the same time.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// The number of live objects in the pool.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to a pool that never fills up.
    pub fn len(&self) -> usize {
        self.count
    }

    /// The number of objects that can still be created before the pool is full.
    ///
    /// `len() + available() == capacity()` holds at all times.
    #[must_use]
    pub fn available(&self) -> usize {
        CAPACITY
            .checked_sub(self.count)
            .expect("count never exceeds capacity")
    }

    /// Whether the pool holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether [`create()`][Self::create] would fail because every slot is in use.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == CAPACITY
    }

    /// How the pool treats remaining objects when it is dropped.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// Moves `value` into a vacant slot and returns the handle that owns it.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying `value` if every slot is already in use. The pool is not
    /// modified in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// let mut pool = FixedPool::<&str, 1>::new();
    ///
    /// let first = pool.create("first").unwrap();
    /// assert!(pool.create("second").is_err());
    ///
    /// pool.destroy(first);
    /// let second = pool.create("second").unwrap();
    /// assert_eq!(*pool.get(&second), "second");
    /// # pool.destroy(second);
    /// ```
    pub fn create(&mut self, value: T) -> Result<Handle<T>, Exhausted<T>> {
        let Some(index) = self.vacant_index() else {
            return Err(Exhausted::new(value));
        };

        self.occupy(index, value);

        Ok(self.issue_handle(index))
    }

    /// Constructs an object in a vacant slot by calling `constructor`, returning the handle that
    /// owns it.
    ///
    /// The constructor is only called if a slot is available. The pool is only modified after
    /// the constructor returns, so a panicking constructor leaves the pool as it was.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying the uncalled `constructor` if every slot is already in use.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// let mut pool = FixedPool::<[u8; 64], 4>::new();
    ///
    /// let buffer = pool.create_with(|| [0xAA; 64]).unwrap();
    /// assert_eq!(pool.get(&buffer)[63], 0xAA);
    /// # pool.destroy(buffer);
    /// ```
    pub fn create_with<F>(&mut self, constructor: F) -> Result<Handle<T>, Exhausted<F>>
    where
        F: FnOnce() -> T,
    {
        let Some(index) = self.vacant_index() else {
            return Err(Exhausted::new(constructor));
        };

        let value = constructor();

        self.occupy(index, value);

        Ok(self.issue_handle(index))
    }

    /// Drops the object owned by `handle` and returns its slot to the free list.
    ///
    /// # Panics
    ///
    /// Panics if the handle points at a vacant slot, which means it was not issued by this pool
    /// or the pool was cleared since it was issued. In debug builds, also panics if the handle
    /// was not issued by this pool or the pool was cleared since, whatever the slot holds now.
    pub fn destroy(&mut self, handle: Handle<T>) {
        drop(self.take(handle));
    }

    /// Moves the object owned by `handle` out of the pool and returns its slot to the free list.
    ///
    /// # Panics
    ///
    /// Panics if the handle points at a vacant slot, which means it was not issued by this pool
    /// or the pool was cleared since it was issued. In debug builds, also panics if the handle
    /// was not issued by this pool or the pool was cleared since, whatever the slot holds now.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// let mut pool = FixedPool::<String, 4>::new();
    ///
    /// let handle = pool.create("hello".to_string()).unwrap();
    /// let value = pool.take(handle);
    ///
    /// assert_eq!(value, "hello");
    /// assert!(pool.is_empty());
    /// ```
    #[must_use]
    pub fn take(&mut self, handle: Handle<T>) -> T {
        #[cfg(debug_assertions)]
        self.integrity_check();

        #[cfg(debug_assertions)]
        self.verify_stamp(&handle, "take");

        let index = handle.index;
        let next_free_index = self.next_free_index;

        let entry = self.entry_mut(index);

        assert!(
            matches!(entry, Entry::Occupied { .. }),
            "take({index}) entry was vacant in pool of {}",
            type_name::<T>()
        );

        let Entry::Occupied { value } = mem::replace(entry, Entry::Vacant { next_free_index })
        else {
            unreachable!("we asserted above that the entry is occupied");
        };

        #[cfg(debug_assertions)]
        self.bump_generation(index);

        // Push the released entry onto the free stack.
        self.next_free_index = index;

        self.count = self
            .count
            .checked_sub(1)
            .expect("we asserted above that the entry is occupied so count must be non-zero");

        value
    }

    /// Borrows the object owned by `handle`.
    ///
    /// # Panics
    ///
    /// Panics if the handle points at a vacant slot. In debug builds, also panics if the handle
    /// was not issued by this pool or the pool was cleared since.
    #[must_use]
    pub fn get(&self, handle: &Handle<T>) -> &T {
        #[cfg(debug_assertions)]
        self.verify_stamp(handle, "get");

        match self.entry(handle.index) {
            Entry::Occupied { value } => value,
            Entry::Vacant { .. } => panic!(
                "get({}) entry was vacant in pool of {}",
                handle.index,
                type_name::<T>()
            ),
        }
    }

    /// Exclusively borrows the object owned by `handle`.
    ///
    /// # Panics
    ///
    /// Panics if the handle points at a vacant slot. In debug builds, also panics if the handle
    /// was not issued by this pool or the pool was cleared since.
    #[must_use]
    pub fn get_mut(&mut self, handle: &Handle<T>) -> &mut T {
        #[cfg(debug_assertions)]
        self.verify_stamp(handle, "get_mut");

        match self.entry_mut(handle.index) {
            Entry::Occupied { value } => value,
            Entry::Vacant { .. } => panic!(
                "get_mut({}) entry was vacant in pool of {}",
                handle.index,
                type_name::<T>()
            ),
        }
    }

    /// Iterates over all live objects in slot order.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// let mut pool = FixedPool::<u32, 4>::new();
    /// let a = pool.create(1).unwrap();
    /// let b = pool.create(2).unwrap();
    /// let c = pool.create(3).unwrap();
    /// pool.destroy(b);
    ///
    /// assert_eq!(pool.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    /// # pool.destroy(a);
    /// # pool.destroy(c);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .take(self.initialized_count)
            .filter_map(|entry| match entry {
                Entry::Occupied { value } => Some(value),
                Entry::Vacant { .. } => None,
            })
    }

    /// Iterates over all live objects in slot order, allowing them to be modified.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries
            .iter_mut()
            .take(self.initialized_count)
            .filter_map(|entry| match entry {
                Entry::Occupied { value } => Some(value),
                Entry::Vacant { .. } => None,
            })
    }

    /// Drops every live object and makes all slots available again.
    ///
    /// Handles issued before the call no longer refer to anything. Using them afterwards panics
    /// in debug builds. In release builds it panics or, once the slot has been reused, refers to
    /// the new object.
    pub fn clear(&mut self) {
        #[cfg(debug_assertions)]
        for generation in self.generations.iter_mut().take(self.initialized_count) {
            *generation = generation.wrapping_add(1);
        }

        for entry in self.entries.iter_mut().take(self.initialized_count) {
            *entry = Entry::Vacant {
                next_free_index: CAPACITY,
            };
        }

        self.next_free_index = CAPACITY;
        self.initialized_count = 0;
        self.count = 0;
    }

    fn issue_handle(&mut self, index: usize) -> Handle<T> {
        Handle {
            index,
            #[cfg(debug_assertions)]
            stamp: self.stamp(index),
            _item: PhantomData,
        }
    }

    #[cfg(debug_assertions)]
    fn stamp(&mut self, index: usize) -> Stamp {
        if self.pool_id == 0 {
            self.pool_id = next_pool_id();
        }

        Stamp {
            pool_id: self.pool_id,
            generation: *self.generation_mut(index),
        }
    }

    #[cfg(debug_assertions)]
    fn verify_stamp(&self, handle: &Handle<T>, operation: &str) {
        let index = handle.index;

        assert!(
            handle.stamp.pool_id == self.pool_id,
            "{operation}({index}) handle was issued by a different pool of {}",
            type_name::<T>()
        );

        let generation = self.generations.get(index).unwrap_or_else(|| {
            panic!(
                "{operation}({index}) index out of bounds in pool of {}",
                type_name::<T>()
            )
        });

        assert!(
            handle.stamp.generation == *generation,
            "{operation}({index}) handle is stale, its object was removed by clear() in pool of {}",
            type_name::<T>()
        );
    }

    #[cfg(debug_assertions)]
    fn bump_generation(&mut self, index: usize) {
        let generation = self.generation_mut(index);
        *generation = generation.wrapping_add(1);
    }

    #[cfg(debug_assertions)]
    fn generation_mut(&mut self, index: usize) -> &mut usize {
        self.generations.get_mut(index).unwrap_or_else(|| {
            panic!(
                "entry {index} index out of bounds in pool of {}",
                type_name::<T>()
            )
        })
    }

    fn vacant_index(&self) -> Option<usize> {
        if self.next_free_index < CAPACITY {
            Some(self.next_free_index)
        } else if self.initialized_count < CAPACITY {
            Some(self.initialized_count)
        } else {
            None
        }
    }

    /// Stores `value` at `index`, which must have come from `vacant_index()`.
    fn occupy(&mut self, index: usize, value: T) {
        let initialized_count = self.initialized_count;

        let previous_entry = mem::replace(self.entry_mut(index), Entry::Occupied { value });

        match previous_entry {
            Entry::Vacant { next_free_index } => {
                if index == initialized_count {
                    // A never-used slot. The free list is empty and stays that way.
                    self.initialized_count = initialized_count
                        .checked_add(1)
                        .expect("guarded by capacity < usize::MAX in pool ctor");
                } else {
                    // Pop the entry off the free stack.
                    self.next_free_index = next_free_index;
                }
            }
            Entry::Occupied { .. } => panic!(
                "entry {index} was not vacant when we inserted into it in pool of {}",
                type_name::<T>()
            ),
        }

        self.count = self
            .count
            .checked_add(1)
            .expect("guarded by capacity < usize::MAX in pool ctor");
    }

    fn entry(&self, index: usize) -> &Entry<T> {
        self.entries.get(index).unwrap_or_else(|| {
            panic!(
                "entry {index} index out of bounds in pool of {}",
                type_name::<T>()
            )
        })
    }

    fn entry_mut(&mut self, index: usize) -> &mut Entry<T> {
        self.entries.get_mut(index).unwrap_or_else(|| {
            panic!(
                "entry {index} index out of bounds in pool of {}",
                type_name::<T>()
            )
        })
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let observed_occupied_count = self
            .entries
            .iter()
            .take(self.initialized_count)
            .filter(|entry| matches!(entry, Entry::Occupied { .. }))
            .count();

        assert!(
            self.count == observed_occupied_count,
            "self.count {} does not match the observed occupied count {} in pool of {}",
            self.count,
            observed_occupied_count,
            type_name::<T>()
        );

        assert!(
            self.entries
                .iter()
                .skip(self.initialized_count)
                .all(|entry| matches!(entry, Entry::Vacant { .. })),
            "entry beyond initialized count {} is occupied in pool of {}",
            self.initialized_count,
            type_name::<T>()
        );

        // Every vacant slot below the initialized count must be on the free list exactly once.
        let expected_free_list_len = self
            .initialized_count
            .checked_sub(observed_occupied_count)
            .expect("occupied entries are all below the initialized count");

        let mut free_list_len: usize = 0;
        let mut index = self.next_free_index;

        while index != CAPACITY {
            assert!(
                index < self.initialized_count,
                "free list entry {index} is beyond initialized count {} in pool of {}",
                self.initialized_count,
                type_name::<T>()
            );

            free_list_len = free_list_len
                .checked_add(1)
                .expect("guarded by capacity < usize::MAX in pool ctor");

            assert!(
                free_list_len <= expected_free_list_len,
                "free list is longer than the {expected_free_list_len} vacant entries in pool of {}",
                type_name::<T>()
            );

            index = match self.entry(index) {
                Entry::Vacant { next_free_index } => *next_free_index,
                Entry::Occupied { .. } => panic!(
                    "free list entry {index} points to an occupied slot in pool of {}",
                    type_name::<T>()
                ),
            };
        }

        assert!(
            free_list_len == expected_free_list_len,
            "free list has {free_list_len} entries but {expected_free_list_len} slots are vacant in pool of {}",
            type_name::<T>()
        );
    }
}

/// A process-wide unique identity for a pool, never zero.
///
/// Targets without atomic read-modify-write share one identity between all pools, so only stale
/// handles are caught there.
#[cfg(debug_assertions)]
fn next_pool_id() -> usize {
    #[cfg(target_has_atomic = "ptr")]
    {
        static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

        NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed).max(1)
    }

    #[cfg(not(target_has_atomic = "ptr"))]
    {
        1
    }
}

impl<T, const CAPACITY: usize> Default for FixedPool<T, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize> fmt::Debug for FixedPool<T, CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &CAPACITY)
            .field("len", &self.count)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T, const CAPACITY: usize> Drop for FixedPool<T, CAPACITY> {
    fn drop(&mut self) {
        let was_empty = self.is_empty();

        self.clear();

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread_is_panicking() {
            assert!(
                was_empty,
                "dropped a non-empty pool of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}
