use core::any::type_name;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{Consumer, CriticalSection, Exhausted, Producer};

/// A bounded single-producer single-consumer queue that can be shared between an interrupt
/// handler and an ordinary thread without allocating or blocking.
///
/// The queue stores up to `CAPACITY` values of type `T` inline in a circular buffer. Use
/// [`split()`][1] to obtain the one [`Producer`] and the one [`Consumer`]; neither handle can be
/// cloned, so the single-producer single-consumer restriction holds by construction.
///
/// # Two call families
///
/// Every operation exists in two variants with identical observable behavior:
///
/// * Plain entry points (e.g. [`Producer::push()`]) may be called from a context that can be
///   preempted by the opposing role. They wrap the shared state access in exactly one
///   [`lock()`][2]/[`unlock()`][3] pair of the critical section `C` given to [`new()`][4].
/// * `*_from_isr` entry points (e.g. [`Producer::push_from_isr()`]) never touch the critical
///   section. The caller guarantees that the opposing role cannot run right now, for example
///   because the caller *is* the interrupt handler, or because it has already masked the
///   interrupt. The queue does not verify this, which is why the mutating ones are `unsafe`.
///
/// # Shared state
///
/// The write index belongs to the producer and the read index to the consumer. The number of
/// occupied slots is the only state both roles modify and the only state the critical section
/// protects. It is only ever loaded and stored, never read-modify-written, so the queue works on
/// targets without compare-and-swap instructions.
///
/// # Examples
///
/// ```
/// use fixed_primitives::{GlobalCriticalSection, IsrQueue};
///
/// let mut queue = IsrQueue::<i32, 4, _>::new(GlobalCriticalSection::new());
/// let (mut producer, mut consumer) = queue.split();
///
/// for value in 1..=4 {
///     producer.push(value).unwrap();
/// }
///
/// // Full - the value is handed back.
/// assert_eq!(producer.push(5).unwrap_err().into_inner(), 5);
///
/// assert_eq!(consumer.pop(), Some(1));
/// producer.push(5).unwrap();
///
/// assert_eq!(consumer.pop(), Some(2));
/// assert_eq!(consumer.pop(), Some(3));
/// assert_eq!(consumer.pop(), Some(4));
/// assert_eq!(consumer.pop(), Some(5));
/// assert_eq!(consumer.pop(), None);
/// ```
///
/// [1]: Self::split
/// [2]: CriticalSection::lock
/// [3]: CriticalSection::unlock
/// [4]: Self::new
pub struct IsrQueue<T, const CAPACITY: usize, C: CriticalSection> {
    slots: [UnsafeCell<MaybeUninit<T>>; CAPACITY],

    /// Where the next value will be written. Only accessed by the producer.
    write_index: UnsafeCell<usize>,

    /// Where the oldest value will be read from. Only accessed by the consumer.
    read_index: UnsafeCell<usize>,

    /// Number of occupied slots. Loaded and stored by both roles, under the critical section on
    /// the plain entry points.
    count: AtomicUsize,

    critical_section: C,
}

/// Holds the critical section for as long as it lives. Releasing on drop keeps the lock/unlock
/// pair matched even if a constructor panics while we hold it.
pub(crate) struct Locked<'c, C: CriticalSection> {
    critical_section: &'c C,

    // Always `Some` until dropped.
    token: Option<C::Token>,
}

impl<'c, C: CriticalSection> Locked<'c, C> {
    fn new(critical_section: &'c C) -> Self {
        // SAFETY: The token is handed back in `drop()`, exactly once. Guards are only ever
        // scoped locals, so nested guards are dropped in reverse order of creation.
        let token = unsafe { critical_section.lock() };

        Self {
            critical_section,
            token: Some(token),
        }
    }
}

impl<C: CriticalSection> Drop for Locked<'_, C> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            // SAFETY: The token came from `lock()` on the same strategy in `new()`.
            unsafe {
                self.critical_section.unlock(token);
            }
        }
    }
}

/// Hands the slots released by [`IsrQueue::drain()`] back to the producer when dropped, which
/// also happens if a destructor panics halfway through.
struct Released<'q, T, const CAPACITY: usize, C: CriticalSection> {
    queue: &'q IsrQueue<T, CAPACITY, C>,
    count: usize,
    publish_locked: bool,
}

impl<T, const CAPACITY: usize, C: CriticalSection> Drop for Released<'_, T, CAPACITY, C> {
    fn drop(&mut self) {
        let _locked = self.publish_locked.then(|| self.queue.lock());

        let remaining = self
            .queue
            .count()
            .checked_sub(self.count)
            .expect("only values that were present when the drain started are released");

        self.queue.count.store(remaining, Ordering::Release);
    }
}

impl<T, const CAPACITY: usize, C: CriticalSection> IsrQueue<T, CAPACITY, C> {
    /// Creates an empty queue that uses `critical_section` on its plain entry points.
    ///
    /// This is a `const fn`, so the queue can be placed in a `static` shared with an interrupt
    /// handler. Fails to compile if `CAPACITY` is zero.
    #[must_use]
    pub const fn new(critical_section: C) -> Self {
        const {
            assert!(CAPACITY > 0, "IsrQueue must have non-zero capacity");
        }

        Self {
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; CAPACITY],
            write_index: UnsafeCell::new(0),
            read_index: UnsafeCell::new(0),
            count: AtomicUsize::new(0),
            critical_section,
        }
    }

    /// Splits the queue into its producer and consumer halves.
    ///
    /// The handles borrow the queue, so it can be split again once both are dropped. Values
    /// already in the queue stay there.
    pub fn split(&mut self) -> (Producer<'_, T, CAPACITY, C>, Consumer<'_, T, CAPACITY, C>) {
        let queue: &Self = self;

        (Producer::new(queue), Consumer::new(queue))
    }

    /// Creates the producer half without borrowing the queue exclusively.
    ///
    /// This is meant for queues in a `static`, where the interrupt handler and the thread each
    /// obtain their own half.
    ///
    /// # Safety
    ///
    /// The caller must ensure that at most one [`Producer`] for this queue exists at any time,
    /// including the one returned by [`split()`][Self::split].
    pub unsafe fn producer_unchecked(&self) -> Producer<'_, T, CAPACITY, C> {
        Producer::new(self)
    }

    /// Creates the consumer half without borrowing the queue exclusively.
    ///
    /// This is meant for queues in a `static`, where the interrupt handler and the thread each
    /// obtain their own half.
    ///
    /// # Safety
    ///
    /// The caller must ensure that at most one [`Consumer`] for this queue exists at any time,
    /// including the one returned by [`split()`][Self::split].
    pub unsafe fn consumer_unchecked(&self) -> Consumer<'_, T, CAPACITY, C> {
        Consumer::new(self)
    }

    /// The critical section used by the plain entry points.
    #[must_use]
    pub fn critical_section(&self) -> &C {
        &self.critical_section
    }

    /// The maximum number of values the queue can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// The number of values in the queue. Enters the critical section.
    #[must_use]
    pub fn len(&self) -> usize {
        let _locked = self.lock();
        self.count()
    }

    /// The number of values in the queue, without entering the critical section.
    #[must_use]
    pub fn len_from_isr(&self) -> usize {
        self.count()
    }

    /// How many more values fit into the queue. Enters the critical section.
    #[must_use]
    pub fn available(&self) -> usize {
        let _locked = self.lock();
        Self::available_for(self.count())
    }

    /// How many more values fit into the queue, without entering the critical section.
    #[must_use]
    pub fn available_from_isr(&self) -> usize {
        Self::available_for(self.count())
    }

    /// Whether the queue holds no values. Enters the critical section.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let _locked = self.lock();
        self.count() == 0
    }

    /// Whether the queue holds no values, without entering the critical section.
    #[must_use]
    pub fn is_empty_from_isr(&self) -> bool {
        self.count() == 0
    }

    /// Whether the queue holds `CAPACITY` values. Enters the critical section.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let _locked = self.lock();
        self.count() == CAPACITY
    }

    /// Whether the queue holds `CAPACITY` values, without entering the critical section.
    #[must_use]
    pub fn is_full_from_isr(&self) -> bool {
        self.count() == CAPACITY
    }

    pub(crate) fn lock(&self) -> Locked<'_, C> {
        Locked::new(&self.critical_section)
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn available_for(count: usize) -> usize {
        CAPACITY
            .checked_sub(count)
            .expect("count never exceeds capacity")
    }

    /// Stores the value produced by `make_value` at the write index, unless the queue is full.
    ///
    /// # Safety
    ///
    /// The caller must be the producer and the consumer must not run until this returns.
    pub(crate) unsafe fn push_with<F>(&self, make_value: F) -> Result<(), Exhausted<F>>
    where
        F: FnOnce() -> T,
    {
        let count = self.count();

        if count == CAPACITY {
            return Err(Exhausted::new(make_value));
        }

        // Constructed before we touch any state, so a panic here leaves the queue unchanged.
        let value = make_value();

        // SAFETY: Only the producer accesses the write index and the caller is the producer.
        let write_index = unsafe { &mut *self.write_index.get() };

        let slot = self.slot(*write_index);

        // SAFETY: count < CAPACITY, so the slot at the write index is vacant and the consumer
        // does not look at it until we publish it by storing the new count below.
        unsafe {
            (*slot.get()).write(value);
        }

        *write_index = next_index::<CAPACITY>(*write_index);

        self.count.store(
            count
                .checked_add(1)
                .expect("guarded by count < CAPACITY above"),
            Ordering::Release,
        );

        Ok(())
    }

    /// Moves the oldest value out of the queue, if there is one.
    ///
    /// # Safety
    ///
    /// The caller must be the consumer and the producer must not run until this returns.
    pub(crate) unsafe fn pop_oldest(&self) -> Option<T> {
        let count = self.count();

        if count == 0 {
            return None;
        }

        // SAFETY: Only the consumer accesses the read index and the caller is the consumer.
        let read_index = unsafe { &mut *self.read_index.get() };

        let slot = self.slot(*read_index);

        // SAFETY: count > 0, so the slot at the read index holds a value published by the
        // producer (the Acquire load above synchronizes with its Release store). We move it out
        // and the slot is considered vacant once we store the new count below.
        let value = unsafe { (*slot.get()).assume_init_read() };

        *read_index = next_index::<CAPACITY>(*read_index);

        self.count.store(
            count
                .checked_sub(1)
                .expect("guarded by count > 0 above"),
            Ordering::Release,
        );

        Some(value)
    }

    /// Drops every value that was in the queue when the call started.
    ///
    /// The destructors run without excluding the producer, which never touches occupied slots.
    /// The released slots are handed back to the producer at the end, inside the critical
    /// section if `publish_locked` is set.
    ///
    /// # Safety
    ///
    /// The caller must be the consumer. Unless `publish_locked` is set, the producer must not
    /// run until this returns.
    pub(crate) unsafe fn drain(&self, publish_locked: bool) {
        let present = self.count();

        let mut released = Released {
            queue: self,
            count: 0,
            publish_locked,
        };

        while released.count < present {
            // SAFETY: Only the consumer accesses the read index and the caller is the consumer.
            let read_index = unsafe { &mut *self.read_index.get() };

            let slot = self.slot(*read_index);
            *read_index = next_index::<CAPACITY>(*read_index);

            released.count = released
                .count
                .checked_add(1)
                .expect("guarded by count < present above");

            // SAFETY: The slot is one of the `present` occupied ones, which the producer leaves
            // alone until `released` publishes the new count. We moved past it and counted it
            // first, so a panicking destructor cannot cause it to be dropped twice.
            unsafe {
                (*slot.get()).assume_init_drop();
            }
        }
    }

    /// Pointer to the oldest value, if there is one.
    ///
    /// The pointer stays valid until the consumer removes the value. Only the consumer may call
    /// this. Calling it without excluding the producer is fine because the producer can only
    /// make the count grow, never invalidate the oldest value.
    pub(crate) fn oldest(&self) -> Option<*mut T> {
        if self.count() == 0 {
            return None;
        }

        // SAFETY: Only the consumer accesses the read index and only the consumer calls this.
        let read_index = unsafe { *self.read_index.get() };

        Some(self.slot(read_index).get().cast::<T>())
    }

    fn slot(&self, index: usize) -> &UnsafeCell<MaybeUninit<T>> {
        self.slots.get(index).unwrap_or_else(|| {
            panic!(
                "slot {index} index out of bounds in queue of {}",
                type_name::<T>()
            )
        })
    }
}

/// Advances a ring buffer index by one, wrapping to zero at `CAPACITY`.
///
/// Works for any capacity, not only powers of two, and never overflows.
fn next_index<const CAPACITY: usize>(index: usize) -> usize {
    let next = index
        .checked_add(1)
        .expect("index is always below CAPACITY, which fits in usize");

    if next == CAPACITY { 0 } else { next }
}

impl<T, const CAPACITY: usize, C: CriticalSection> fmt::Debug for IsrQueue<T, CAPACITY, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsrQueue")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &CAPACITY)
            .field("len", &self.count())
            .finish_non_exhaustive()
    }
}

impl<T, const CAPACITY: usize, C: CriticalSection> Drop for IsrQueue<T, CAPACITY, C> {
    fn drop(&mut self) {
        // SAFETY: We have exclusive access, so no producer or consumer can be running.
        unsafe {
            self.drain(false);
        }
    }
}

// SAFETY: Values move from the producer's context to the consumer's context, hence `T: Send`.
// The indexes are each only accessed by the single producer or the single consumer, which is
// enforced by `split()` handing out exactly one of each (or promised by the caller of the
// `*_unchecked()` constructors). The count is atomic. The critical
// section is shared by both roles, hence `C: Sync`.
unsafe impl<T: Send, const CAPACITY: usize, C: CriticalSection + Sync> Sync
    for IsrQueue<T, CAPACITY, C>
{
}
