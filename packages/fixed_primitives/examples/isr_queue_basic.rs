//! Emulates an interrupt handler feeding samples to a worker through an `IsrQueue`.
//!
//! On a hosted target the `critical-section` crate is backed by a process-wide lock. The
//! "interrupt handler" thread holds that lock while it runs, which is what masking an interrupt
//! looks like from the point of view of the worker.

use std::thread;
use std::time::Duration;

use fixed_primitives::{GlobalCriticalSection, IsrQueue};
use tracing::{debug, info};

const SAMPLE_COUNT: u16 = 64;

static SAMPLES: IsrQueue<u16, 8, GlobalCriticalSection> =
    IsrQueue::new(GlobalCriticalSection::new());

fn main() {
    tracing_subscriber::fmt().init();

    let interrupt_handler = thread::spawn(|| {
        // SAFETY: This thread is the only producer of SAMPLES.
        let mut producer = unsafe { SAMPLES.producer_unchecked() };
        let mut dropped = 0_u32;

        for sample in 0..SAMPLE_COUNT {
            critical_section::with(|_| {
                // SAFETY: We hold the global critical section, so the worker cannot touch the
                // queue until we return.
                if unsafe { producer.push_from_isr(sample) }.is_err() {
                    dropped = dropped.saturating_add(1);
                }
            });

            thread::sleep(Duration::from_micros(200));
        }

        dropped
    });

    // SAFETY: The main thread is the only consumer of SAMPLES.
    let mut consumer = unsafe { SAMPLES.consumer_unchecked() };

    let mut received = 0_u32;
    let mut sum = 0_u64;

    while !interrupt_handler.is_finished() || !consumer.is_empty() {
        match consumer.pop() {
            Some(sample) => {
                debug!(sample, backlog = consumer.len(), "received sample");
                received = received.saturating_add(1);
                sum = sum.saturating_add(u64::from(sample));
            }
            None => thread::yield_now(),
        }
    }

    let dropped = interrupt_handler
        .join()
        .expect("interrupt handler thread panicked");

    info!(received, dropped, sum, "all samples processed");
}
