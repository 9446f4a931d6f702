use core::any::type_name;
use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

use crate::{CriticalSection, IsrQueue};

/// The reading half of an [`IsrQueue`].
///
/// There is at most one consumer per queue. Every operation comes in two variants: the plain
/// one enters the queue's critical section, the `*_from_isr` one does not and may only be used
/// when the producer cannot preempt the caller.
///
/// Values come out in the order they were pushed.
pub struct Consumer<'q, T, const CAPACITY: usize, C: CriticalSection> {
    queue: &'q IsrQueue<T, CAPACITY, C>,

    // References handed out by `front()` must not be shared across threads unless `T: Sync`,
    // which the queue does not require.
    _not_sync: PhantomData<Cell<()>>,
}

impl<'q, T, const CAPACITY: usize, C: CriticalSection> Consumer<'q, T, CAPACITY, C> {
    pub(crate) fn new(queue: &'q IsrQueue<T, CAPACITY, C>) -> Self {
        Self {
            queue,
            _not_sync: PhantomData,
        }
    }

    /// Removes and returns the value at the front of the queue, or [`None`] if it is empty.
    ///
    /// Enters the critical section once.
    #[must_use]
    pub fn pop(&mut self) -> Option<T> {
        let _locked = self.queue.lock();

        // SAFETY: We are the only consumer and the critical section excludes the producer.
        unsafe { self.queue.pop_oldest() }
    }

    /// Removes and returns the value at the front of the queue, or [`None`] if it is empty,
    /// without entering the critical section.
    ///
    /// # Safety
    ///
    /// The producer must not be able to run until this call returns, e.g. because the caller is
    /// the interrupt handler that the producer masks in its critical section.
    #[must_use]
    pub unsafe fn pop_from_isr(&mut self) -> Option<T> {
        // SAFETY: We are the only consumer and the caller excludes the producer.
        unsafe { self.queue.pop_oldest() }
    }

    /// Removes and drops the value at the front of the queue.
    ///
    /// Returns `false` if the queue was empty. Enters the critical section once. The value is
    /// dropped after the critical section has been left.
    pub fn discard(&mut self) -> bool {
        let removed = {
            let _locked = self.queue.lock();

            // SAFETY: We are the only consumer and the critical section excludes the producer.
            unsafe { self.queue.pop_oldest() }
        };

        removed.is_some()
    }

    /// Removes and drops the value at the front of the queue, without entering the critical
    /// section.
    ///
    /// Returns `false` if the queue was empty.
    ///
    /// # Safety
    ///
    /// The producer must not be able to run until this call returns.
    pub unsafe fn discard_from_isr(&mut self) -> bool {
        // SAFETY: We are the only consumer and the caller excludes the producer.
        unsafe { self.queue.pop_oldest() }.is_some()
    }

    /// The value that the next [`pop()`][Self::pop] would return, or [`None`] if the queue is
    /// empty.
    ///
    /// Enters the critical section once.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::{GlobalCriticalSection, IsrQueue};
    ///
    /// let mut queue = IsrQueue::<&str, 2, _>::new(GlobalCriticalSection::new());
    /// let (mut producer, mut consumer) = queue.split();
    ///
    /// assert_eq!(consumer.front(), None);
    ///
    /// producer.push("first").unwrap();
    /// producer.push("second").unwrap();
    ///
    /// assert_eq!(consumer.front(), Some(&"first"));
    /// assert_eq!(consumer.len(), 2);
    /// ```
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        let _locked = self.queue.lock();

        // SAFETY: The value stays put until the consumer removes it, which requires `&mut self`
        // and therefore cannot happen while the returned reference is alive. The producer never
        // touches occupied slots.
        self.queue.oldest().map(|value| unsafe { &*value })
    }

    /// The value that the next [`pop()`][Self::pop] would return, or [`None`] if the queue is
    /// empty, without entering the critical section.
    ///
    /// This only reads state that the producer cannot invalidate, so it is safe to call from
    /// any context.
    #[must_use]
    pub fn front_from_isr(&self) -> Option<&T> {
        // SAFETY: See `front()`.
        self.queue.oldest().map(|value| unsafe { &*value })
    }

    /// Exclusive access to the value that the next [`pop()`][Self::pop] would return, or
    /// [`None`] if the queue is empty.
    ///
    /// Enters the critical section once.
    #[must_use]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        let _locked = self.queue.lock();

        // SAFETY: As in `front()`, and `&mut self` guarantees that no other reference to the
        // value handed out by this consumer is alive.
        self.queue.oldest().map(|value| unsafe { &mut *value })
    }

    /// Exclusive access to the value that the next [`pop()`][Self::pop] would return, or
    /// [`None`] if the queue is empty, without entering the critical section.
    #[must_use]
    pub fn front_mut_from_isr(&mut self) -> Option<&mut T> {
        // SAFETY: See `front_mut()`.
        self.queue.oldest().map(|value| unsafe { &mut *value })
    }

    /// Drops every value that is in the queue when the call starts.
    ///
    /// The values are dropped outside the critical section. The freed slots are then handed back
    /// to the producer inside a single critical section.
    pub fn clear(&mut self) {
        // SAFETY: We are the only consumer. The producer is excluded while the freed slots are
        // published and never touches the occupied slots we drop before that.
        unsafe {
            self.queue.drain(true);
        }
    }

    /// Drops every value in the queue, without entering the critical section.
    ///
    /// # Safety
    ///
    /// The producer must not be able to run until this call returns.
    pub unsafe fn clear_from_isr(&mut self) {
        // SAFETY: We are the only consumer and the caller excludes the producer.
        unsafe {
            self.queue.drain(false);
        }
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
    ///
    /// The producer may add more values at any time, so this is a lower bound.
    #[must_use]
    pub fn len_from_isr(&self) -> usize {
        self.queue.len_from_isr()
    }

    /// Whether a pop would fail right now. Enters the critical section.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether a pop would fail right now, without entering the critical section.
    #[must_use]
    pub fn is_empty_from_isr(&self) -> bool {
        self.queue.is_empty_from_isr()
    }
}

impl<T, const CAPACITY: usize, C: CriticalSection> fmt::Debug for Consumer<'_, T, CAPACITY, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &CAPACITY)
            .finish_non_exhaustive()
    }
}
