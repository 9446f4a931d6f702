//! Fixed-capacity building blocks that never allocate on the heap.
//!
//! This crate provides two primitives that higher level containers can be built upon:
//!
//! * [`FixedPool`] - an object pool with a compile-time capacity. Creating an object takes a
//!   free slot and returns an exclusive [`Handle`]; destroying the object through that handle
//!   puts the slot back on a free list. Both operations are O(1) and there is no fragmentation
//!   because every slot has the same size.
//! * [`IsrQueue`] - a bounded single-producer single-consumer ring buffer that may be shared
//!   between an interrupt handler and an ordinary thread. The queue is split into a
//!   [`Producer`] and a [`Consumer`], each offering two call families: plain entry points that
//!   wrap the shared state access in a caller-supplied [`CriticalSection`], and `*_from_isr`
//!   entry points for callers that already cannot be preempted by the opposing role.
//!
//! Neither primitive blocks, allocates or logs. Every operation either succeeds immediately or
//! reports failure synchronously: operations that reject an input hand it back inside
//! [`Exhausted`], operations that have nothing to return yield [`None`].
//!
//! # Example: object pool
//!
//! ```
//! use fixed_primitives::FixedPool;
//!
//! let mut pool = FixedPool::<String, 2>::new();
//!
//! let alice = pool.create("Alice".to_string()).unwrap();
//! let bob = pool.create("Bob".to_string()).unwrap();
//!
//! // The pool is full, so the value is handed back to us.
//! let rejected = pool.create("Charlie".to_string()).unwrap_err();
//! assert_eq!(rejected.into_inner(), "Charlie");
//!
//! assert_eq!(pool.get(&alice), "Alice");
//!
//! pool.destroy(bob);
//! assert_eq!(pool.available(), 1);
//! # pool.destroy(alice);
//! ```
//!
//! # Example: interrupt-safe queue
//!
//! ```
//! use fixed_primitives::{GlobalCriticalSection, IsrQueue};
//!
//! let mut queue = IsrQueue::<u32, 4, _>::new(GlobalCriticalSection::new());
//! let (mut producer, mut consumer) = queue.split();
//!
//! std::thread::scope(|s| {
//!     s.spawn(move || {
//!         for value in 0..100 {
//!             // Retrying is the caller's business, the queue never waits.
//!             while producer.push(value).is_err() {
//!                 std::thread::yield_now();
//!             }
//!         }
//!     });
//!
//!     let mut expected = 0;
//!     while expected < 100 {
//!         if let Some(value) = consumer.pop() {
//!             assert_eq!(value, expected);
//!             expected += 1;
//!         }
//!     }
//! });
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

mod builder;
mod consumer;
mod drop_policy;
mod exhausted;
mod fixed_pool;
mod isr_queue;
mod producer;
mod section;

pub use builder::*;
pub use consumer::*;
pub use drop_policy::*;
pub use exhausted::*;
pub use fixed_pool::*;
pub use isr_queue::*;
pub use producer::*;
pub use section::*;

/// Whether the current thread is unwinding. Without `std` we cannot know, so we assume not.
#[cfg_attr(test, mutants::skip)] // Only affects whether a second panic obscures the first.
pub(crate) fn thread_is_panicking() -> bool {
    #[cfg(feature = "std")]
    {
        std::thread::panicking()
    }

    #[cfg(not(feature = "std"))]
    {
        false
    }
}
