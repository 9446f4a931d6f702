use core::any::type_name;
use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

use crate::{CriticalSection, Exhausted, IsrQueue};

/// The writing half of an [`IsrQueue`].
///
/// There is at most one producer per queue. Every operation comes in two variants: the plain
/// one enters the queue's critical section, the `*_from_isr` one does not and may only be used
/// when the consumer cannot preempt the caller.
///
/// The producer can be moved to another thread or into an interrupt handler's state, but not
/// shared between them.
pub struct Producer<'q, T, const CAPACITY: usize, C: CriticalSection> {
    queue: &'q IsrQueue<T, CAPACITY, C>,

    _not_sync: PhantomData<Cell<()>>,
}

impl<'q, T, const CAPACITY: usize, C: CriticalSection> Producer<'q, T, CAPACITY, C> {
    pub(crate) fn new(queue: &'q IsrQueue<T, CAPACITY, C>) -> Self {
        Self {
            queue,
            _not_sync: PhantomData,
        }
    }

    /// Appends `value` to the back of the queue.
    ///
    /// Enters the critical section once.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying `value` if the queue is full.
    pub fn push(&mut self, value: T) -> Result<(), Exhausted<T>> {
        let _locked = self.queue.lock();

        // SAFETY: We are the only producer and the critical section excludes the consumer.
        let result = unsafe { self.queue.push_with(|| value) };

        result.map_err(|rejected| Exhausted::new(rejected.into_inner()()))
    }

    /// Appends `value` to the back of the queue without entering the critical section.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying `value` if the queue is full.
    ///
    /// # Safety
    ///
    /// The consumer must not be able to run until this call returns, e.g. because the caller is
    /// the interrupt handler that the consumer masks in its critical section.
    pub unsafe fn push_from_isr(&mut self, value: T) -> Result<(), Exhausted<T>> {
        // SAFETY: We are the only producer and the caller excludes the consumer.
        let result = unsafe { self.queue.push_with(|| value) };

        result.map_err(|rejected| Exhausted::new(rejected.into_inner()()))
    }

    /// Constructs a value at the back of the queue by calling `constructor`.
    ///
    /// The constructor is only called if there is room and runs inside the critical section,
    /// so keep it short. A panicking constructor leaves the queue unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying the uncalled `constructor` if the queue is full.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::{GlobalCriticalSection, IsrQueue};
    ///
    /// let mut queue = IsrQueue::<[u8; 16], 2, _>::new(GlobalCriticalSection::new());
    /// let (mut producer, mut consumer) = queue.split();
    ///
    /// producer.emplace(|| [0xFF; 16]).unwrap();
    ///
    /// assert_eq!(consumer.pop(), Some([0xFF; 16]));
    /// ```
    pub fn emplace<F>(&mut self, constructor: F) -> Result<(), Exhausted<F>>
    where
        F: FnOnce() -> T,
    {
        let _locked = self.queue.lock();

        // SAFETY: We are the only producer and the critical section excludes the consumer.
        unsafe { self.queue.push_with(constructor) }
    }

    /// Constructs a value at the back of the queue by calling `constructor`, without entering
    /// the critical section.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying the uncalled `constructor` if the queue is full.
    ///
    /// # Safety
    ///
    /// The consumer must not be able to run until this call returns.
    pub unsafe fn emplace_from_isr<F>(&mut self, constructor: F) -> Result<(), Exhausted<F>>
    where
        F: FnOnce() -> T,
    {
        // SAFETY: We are the only producer and the caller excludes the consumer.
        unsafe { self.queue.push_with(constructor) }
    }

    /// The maximum number of values the queue can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// The number of values in the queue. Enters the critical section.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The number of values in the queue, without entering the critical section.
    #[must_use]
    pub fn len_from_isr(&self) -> usize {
        self.queue.len_from_isr()
    }

    /// How many more values can be pushed before the queue is full. Enters the critical section.
    #[must_use]
    pub fn available(&self) -> usize {
        self.queue.available()
    }

    /// How many more values can be pushed before the queue is full, without entering the
    /// critical section.
    ///
    /// The consumer may free up more room at any time, so this is a lower bound.
    #[must_use]
    pub fn available_from_isr(&self) -> usize {
        self.queue.available_from_isr()
    }

    /// Whether a push would fail right now. Enters the critical section.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Whether a push would fail right now, without entering the critical section.
    #[must_use]
    pub fn is_full_from_isr(&self) -> bool {
        self.queue.is_full_from_isr()
    }
}

impl<T, const CAPACITY: usize, C: CriticalSection> fmt::Debug for Producer<'_, T, CAPACITY, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &CAPACITY)
            .finish_non_exhaustive()
    }
}
