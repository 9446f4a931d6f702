//! Integration tests for `IsrQueue` with the producer and consumer on different threads.
//!
//! On a hosted target, the `std` implementation of `critical-section` is a process-wide lock.
//! A thread that calls the `*_from_isr` entry points while holding that lock behaves like an
//! interrupt handler: the other role cannot run until it is done.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fixed_primitives::{GlobalCriticalSection, IsrQueue};

const ITEM_COUNT: u64 = 10_000;

#[test]
fn plain_entry_points_across_threads() {
    let mut queue = IsrQueue::<u64, 7, _>::new(GlobalCriticalSection::new());
    let (mut producer, mut consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(move || {
            for value in 0..ITEM_COUNT {
                let mut pending = value;

                loop {
                    match producer.push(pending) {
                        Ok(()) => break,
                        Err(rejected) => {
                            pending = rejected.into_inner();
                            thread::yield_now();
                        }
                    }
                }
            }
        });

        let mut expected = 0;

        while expected < ITEM_COUNT {
            match consumer.pop() {
                Some(value) => {
                    assert_eq!(value, expected);
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }

        assert_eq!(consumer.pop(), None);
    });
}

#[test]
fn interrupt_style_producer_with_plain_consumer() {
    let mut queue = IsrQueue::<u64, 5, _>::new(GlobalCriticalSection::new());
    let (mut producer, mut consumer) = queue.split();

    thread::scope(|s| {
        // The "interrupt handler" runs with the critical section already held, like an ISR
        // that the consumer masks while it touches the queue.
        s.spawn(move || {
            let mut next = 0;

            while next < ITEM_COUNT {
                let pushed = critical_section::with(|_| {
                    // SAFETY: We hold the global critical section, so the consumer cannot run.
                    unsafe { producer.emplace_from_isr(|| next) }.is_ok()
                });

                if pushed {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut expected = 0;

        while expected < ITEM_COUNT {
            if let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            } else {
                thread::yield_now();
            }
        }
    });
}

#[test]
fn plain_producer_with_interrupt_style_consumer() {
    let mut queue = IsrQueue::<u64, 3, _>::new(GlobalCriticalSection::new());
    let (mut producer, mut consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(move || {
            let mut expected = 0;

            while expected < ITEM_COUNT {
                let popped = critical_section::with(|_| {
                    // SAFETY: We hold the global critical section, so the producer cannot run.
                    unsafe { consumer.pop_from_isr() }
                });

                match popped {
                    Some(value) => {
                        assert_eq!(value, expected);
                        expected += 1;
                    }
                    None => thread::yield_now(),
                }
            }
        });

        for value in 0..ITEM_COUNT {
            while producer.push(value).is_err() {
                thread::yield_now();
            }
        }
    });
}

static SHARED: IsrQueue<u32, 4, GlobalCriticalSection> =
    IsrQueue::new(GlobalCriticalSection::new());

#[test]
fn static_queue_with_unchecked_halves() {
    thread::scope(|s| {
        s.spawn(|| {
            // SAFETY: This is the only producer of SHARED in the whole test binary.
            let mut producer = unsafe { SHARED.producer_unchecked() };

            for value in 0..1000 {
                while producer.push(value).is_err() {
                    thread::yield_now();
                }
            }
        });

        // SAFETY: This is the only consumer of SHARED in the whole test binary.
        let mut consumer = unsafe { SHARED.consumer_unchecked() };

        let mut expected = 0;
        while expected < 1000 {
            if let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            }
        }
    });

    assert!(SHARED.is_empty());
}

static SECTION: GlobalCriticalSection = GlobalCriticalSection::new();

// Shares its critical section with the work queue in `shared_section_is_released_after_nested_use`.
static NOTIFICATIONS: IsrQueue<u32, 8, &GlobalCriticalSection> = IsrQueue::new(&SECTION);

/// Whether another thread manages to enter the global critical section.
fn another_thread_can_enter() -> bool {
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        critical_section::with(|_| ());
        _ = sender.send(());
    });

    receiver.recv_timeout(Duration::from_secs(10)).is_ok()
}

fn notify(value: u32) {
    // SAFETY: Only `shared_section_is_released_after_nested_use` produces into NOTIFICATIONS and
    // it never holds two producers at the same time.
    let mut producer = unsafe { NOTIFICATIONS.producer_unchecked() };

    assert!(producer.push(value).is_ok());
}

struct Message(u32);

impl Drop for Message {
    fn drop(&mut self) {
        notify(self.0);
    }
}

#[test]
fn shared_section_is_released_after_nested_use() {
    let mut work = IsrQueue::<Message, 2, _>::new(&SECTION);
    let (mut producer, mut consumer) = work.split();

    assert!(producer.push(Message(1)).is_ok());
    assert!(another_thread_can_enter());

    // The constructor runs inside the work queue's critical section and enters it again through
    // the other queue.
    let emplaced = producer.emplace(|| {
        notify(2);
        Message(3)
    });
    assert!(emplaced.is_ok());
    assert!(another_thread_can_enter());

    // Dropping the message pushes into the other queue.
    assert!(consumer.discard());
    assert!(another_thread_can_enter());

    consumer.clear();
    assert!(another_thread_can_enter());

    // SAFETY: This is the only consumer of NOTIFICATIONS.
    let mut notifications = unsafe { NOTIFICATIONS.consumer_unchecked() };

    assert_eq!(notifications.pop(), Some(2));
    assert_eq!(notifications.pop(), Some(1));
    assert_eq!(notifications.pop(), Some(3));
    assert_eq!(notifications.pop(), None);
}
