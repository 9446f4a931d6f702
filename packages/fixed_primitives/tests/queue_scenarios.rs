//! Integration tests for `IsrQueue` on a single thread.
//!
//! These cover ordering, wraparound and capacity behavior of both call families, as well as
//! how each entry point uses the critical section.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use fixed_primitives::{CriticalSection, FnCriticalSection, IsrQueue};

fn no_op() {}

fn unguarded() -> FnCriticalSection {
    // SAFETY: Single-threaded test code, there is never an opposing role to exclude.
    unsafe { FnCriticalSection::new(no_op, no_op) }
}

/// Records calls and verifies that they come in matched pairs.
#[derive(Debug, Default)]
struct CountingSection {
    locks: Cell<usize>,
    unlocks: Cell<usize>,
}

impl CountingSection {
    fn calls(&self) -> (usize, usize) {
        (self.locks.get(), self.unlocks.get())
    }

    fn is_held(&self) -> bool {
        self.locks.get() != self.unlocks.get()
    }
}

// SAFETY: Single-threaded test code, there is never an opposing role to exclude.
unsafe impl CriticalSection for CountingSection {
    type Token = usize;

    unsafe fn lock(&self) -> usize {
        assert_eq!(self.locks.get(), self.unlocks.get(), "nested lock");
        self.locks.set(self.locks.get() + 1);
        self.locks.get()
    }

    unsafe fn unlock(&self, token: usize) {
        assert_eq!(token, self.locks.get(), "token from a different lock");
        assert_eq!(self.locks.get(), self.unlocks.get() + 1, "unmatched unlock");
        self.unlocks.set(self.unlocks.get() + 1);
    }
}

#[test]
fn rollover_with_plain_entry_points() {
    let mut queue = IsrQueue::<i32, 4, _>::new(unguarded());
    let (mut producer, mut consumer) = queue.split();

    for value in 1..=4 {
        producer.push(value).unwrap();
    }

    assert!(producer.is_full());
    assert!(producer.push(5).is_err());

    assert_eq!(consumer.pop(), Some(1));

    // The slot freed at the start of the buffer is reused.
    producer.push(5).unwrap();

    assert_eq!(consumer.pop(), Some(2));
    assert_eq!(consumer.pop(), Some(3));
    assert_eq!(consumer.pop(), Some(4));
    assert_eq!(consumer.pop(), Some(5));
    assert_eq!(consumer.pop(), None);
}

#[test]
fn rollover_with_isr_entry_points() {
    let mut queue = IsrQueue::<i32, 4, _>::new(unguarded());
    let (mut producer, mut consumer) = queue.split();

    // SAFETY: Single-threaded test code, neither role can preempt the other.
    unsafe {
        for value in 1..=4 {
            producer.push_from_isr(value).unwrap();
        }

        assert!(producer.is_full_from_isr());
        assert!(producer.push_from_isr(5).is_err());

        assert_eq!(consumer.pop_from_isr(), Some(1));

        producer.push_from_isr(5).unwrap();

        assert_eq!(consumer.pop_from_isr(), Some(2));
        assert_eq!(consumer.pop_from_isr(), Some(3));
        assert_eq!(consumer.pop_from_isr(), Some(4));
        assert_eq!(consumer.pop_from_isr(), Some(5));
        assert_eq!(consumer.pop_from_isr(), None);
    }
}

#[test]
fn fifo_order_is_preserved() {
    let mut queue = IsrQueue::<u64, 16, _>::new(unguarded());
    let (mut producer, mut consumer) = queue.split();

    let values = [9, 3, 27, 1, 1, 0, 512, 7];

    for value in values {
        producer.push(value).unwrap();
    }

    let popped = std::iter::from_fn(|| consumer.pop()).collect::<Vec<_>>();
    assert_eq!(popped, values);
}

#[test]
fn wraparound_with_capacity_not_power_of_two() {
    let mut queue = IsrQueue::<usize, 3, _>::new(unguarded());
    let (mut producer, mut consumer) = queue.split();

    // Walk the indexes around the buffer many times.
    for round in 0..10 {
        for offset in 0..3 {
            producer.push(round * 10 + offset).unwrap();
        }

        assert!(producer.push(usize::MAX).is_err());

        assert_eq!(consumer.pop(), Some(round * 10));
        producer.push(round * 10 + 3).unwrap();

        for offset in 1..4 {
            assert_eq!(consumer.pop(), Some(round * 10 + offset));
        }

        assert!(consumer.is_empty());
    }
}

#[test]
fn matches_reference_model() {
    const CAPACITY: usize = 5;

    let mut queue = IsrQueue::<u32, CAPACITY, _>::new(unguarded());
    let (mut producer, mut consumer) = queue.split();
    let mut model = VecDeque::new();

    // A fixed pseudo-random walk over push/pop decisions.
    let mut state: u32 = 0xDEAD_BEEF;

    for step in 0..2000 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;

        if state % 2 == 0 {
            let pushed = producer.push(step).is_ok();
            assert_eq!(pushed, model.len() < CAPACITY);

            if pushed {
                model.push_back(step);
            }
        } else {
            assert_eq!(consumer.front().copied(), model.front().copied());
            assert_eq!(consumer.pop(), model.pop_front());
        }

        let len = consumer.len();
        assert_eq!(len, model.len());
        assert!(len <= CAPACITY);
        assert_eq!(producer.is_full(), len == CAPACITY);
        assert_eq!(consumer.is_empty(), len == 0);
        assert_eq!(producer.available(), CAPACITY - len);
    }
}

#[test]
fn plain_entry_points_lock_exactly_once() {
    let section = CountingSection::default();
    let mut queue = IsrQueue::<u32, 4, _>::new(&section);
    let (mut producer, mut consumer) = queue.split();

    let mut expected = 0;
    let mut check = |section: &CountingSection| {
        expected += 1;
        assert_eq!(section.calls(), (expected, expected));
    };

    producer.push(1).unwrap();
    check(&section);

    producer.emplace(|| 2).unwrap();
    check(&section);

    _ = producer.len();
    check(&section);

    _ = producer.available();
    check(&section);

    _ = producer.is_full();
    check(&section);

    _ = consumer.front();
    check(&section);

    _ = consumer.front_mut();
    check(&section);

    assert_eq!(consumer.pop(), Some(1));
    check(&section);

    assert!(consumer.discard());
    check(&section);

    // Failing operations lock too.
    assert_eq!(consumer.pop(), None);
    check(&section);

    _ = consumer.len();
    check(&section);

    _ = consumer.is_empty();
    check(&section);

    producer.push(3).unwrap();
    check(&section);

    producer.push(4).unwrap();
    check(&section);

    consumer.clear();
    check(&section);
}

#[test]
fn isr_entry_points_never_lock() {
    let section = CountingSection::default();
    let mut queue = IsrQueue::<u32, 2, _>::new(&section);
    let (mut producer, mut consumer) = queue.split();

    // SAFETY: Single-threaded test code, neither role can preempt the other.
    unsafe {
        producer.push_from_isr(1).unwrap();
        producer.emplace_from_isr(|| 2).unwrap();
        assert!(producer.push_from_isr(3).is_err());
        assert!(producer.emplace_from_isr(|| 3).is_err());

        _ = producer.len_from_isr();
        _ = producer.available_from_isr();
        _ = producer.is_full_from_isr();

        _ = consumer.front_from_isr();
        _ = consumer.front_mut_from_isr();
        _ = consumer.len_from_isr();
        _ = consumer.is_empty_from_isr();

        assert_eq!(consumer.pop_from_isr(), Some(1));
        assert!(consumer.discard_from_isr());
        assert_eq!(consumer.pop_from_isr(), None);

        producer.push_from_isr(5).unwrap();
        consumer.clear_from_isr();
    }

    assert_eq!(section.calls(), (0, 0));
}

#[test]
fn panicking_destructor_still_unlocks() {
    struct Grenade;

    impl Drop for Grenade {
        fn drop(&mut self) {
            panic!("boom");
        }
    }

    let section = CountingSection::default();
    let mut queue = IsrQueue::<Grenade, 2, _>::new(&section);

    {
        let (mut producer, mut consumer) = queue.split();
        assert!(producer.push(Grenade).is_ok());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            consumer.discard();
        }));
        assert!(result.is_err());
    }

    assert_eq!(section.calls(), (2, 2));
    assert!(queue.is_empty_from_isr());
}

/// Records whether it was dropped while the critical section was held.
struct Watched<'s> {
    section: &'s CountingSection,
    dropped_while_held: &'s Cell<usize>,
}

impl Drop for Watched<'_> {
    fn drop(&mut self) {
        if self.section.is_held() {
            self.dropped_while_held
                .set(self.dropped_while_held.get() + 1);
        }
    }
}

#[test]
fn destructors_run_outside_critical_section() {
    let section = CountingSection::default();
    let dropped_while_held = Cell::new(0);

    let watched = || Watched {
        section: &section,
        dropped_while_held: &dropped_while_held,
    };

    let mut queue = IsrQueue::<Watched<'_>, 4, _>::new(&section);
    let (mut producer, mut consumer) = queue.split();

    for _ in 0..4 {
        assert!(producer.push(watched()).is_ok());
    }

    assert!(consumer.discard());
    drop(consumer.pop());

    let locks_before_clear = section.calls().0;
    consumer.clear();

    // All the values go in one critical section, even though they are dropped outside of it.
    assert_eq!(section.calls().0, locks_before_clear + 1);
    assert!(consumer.is_empty());
    assert_eq!(producer.available(), 4);

    assert_eq!(dropped_while_held.get(), 0);
}

#[test]
fn panicking_destructor_during_clear_keeps_queue_consistent() {
    struct Fragile {
        explode: bool,
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Fragile {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);

            assert!(!self.explode, "boom");
        }
    }

    let drops = Rc::new(Cell::new(0));
    let fragile = |explode| Fragile {
        explode,
        drops: Rc::clone(&drops),
    };

    let section = CountingSection::default();
    let mut queue = IsrQueue::<Fragile, 4, _>::new(&section);
    let (mut producer, mut consumer) = queue.split();

    assert!(producer.push(fragile(false)).is_ok());
    assert!(producer.push(fragile(true)).is_ok());
    assert!(producer.push(fragile(false)).is_ok());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| consumer.clear()));
    assert!(result.is_err());

    // The values before and including the one that panicked are gone, the rest stays queued.
    assert_eq!(drops.get(), 2);
    assert!(!section.is_held());
    assert_eq!(consumer.len(), 1);
    assert_eq!(producer.available(), 3);

    consumer.clear();
    assert_eq!(drops.get(), 3);
    assert!(consumer.is_empty());
}
