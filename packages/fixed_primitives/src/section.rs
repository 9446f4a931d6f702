use core::fmt;

/// A caller-supplied mechanism that prevents the opposing role of an [`IsrQueue`][1] from
/// running, for example by masking an interrupt source or by acquiring a lock that the
/// opposing role also takes.
///
/// The plain entry points of [`Producer`][2] and [`Consumer`][3] call [`lock()`][4] exactly once
/// before touching state shared with the opposing role and [`unlock()`][5] exactly once
/// afterwards, handing back the token that [`lock()`][4] returned. The `*_from_isr` entry points
/// never call either.
///
/// Whatever [`lock()`][4] needs to undo on exit (e.g. the previous interrupt mask) belongs in
/// the [`Token`][6], not in the strategy itself. The same strategy may be shared by several
/// queues, and an `emplace` constructor that uses another of those queues enters the strategy
/// again before the outer section is left. Implementations must support such nesting.
///
/// # Safety
///
/// Implementations must guarantee that between a call to [`lock()`][4] and the matching call to
/// [`unlock()`][5], no code of the opposing role executes, on any core. This includes
/// establishing whatever memory ordering is required for the opposing role to observe writes
/// made under the lock once it runs again.
///
/// [1]: crate::IsrQueue
/// [2]: crate::Producer
/// [3]: crate::Consumer
/// [4]: Self::lock
/// [5]: Self::unlock
/// [6]: Self::Token
pub unsafe trait CriticalSection {
    /// State returned by [`lock()`][Self::lock] that the matching [`unlock()`][Self::unlock]
    /// consumes.
    type Token;

    /// Enters the critical section.
    ///
    /// # Safety
    ///
    /// The caller must pass the returned token to [`unlock()`][Self::unlock] on the same
    /// strategy exactly once. Nested sections must be left in the reverse order of entry.
    unsafe fn lock(&self) -> Self::Token;

    /// Leaves the critical section entered by the [`lock()`][Self::lock] that returned `token`.
    ///
    /// # Safety
    ///
    /// `token` must come from a [`lock()`][Self::lock] on the same strategy, and it must be the
    /// most recently entered section that has not been left yet.
    unsafe fn unlock(&self, token: Self::Token);
}

// SAFETY: Forwards to the referenced strategy, which upholds the contract.
unsafe impl<C: CriticalSection + ?Sized> CriticalSection for &C {
    type Token = C::Token;

    unsafe fn lock(&self) -> Self::Token {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { (**self).lock() }
    }

    unsafe fn unlock(&self, token: Self::Token) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { (**self).unlock(token) }
    }
}

/// A critical section made from a pair of plain functions, such as the ones that disable and
/// re-enable a particular interrupt source.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use fixed_primitives::{FnCriticalSection, IsrQueue};
///
/// static TIMER_IRQ_ENABLED: AtomicBool = AtomicBool::new(true);
///
/// fn disable_timer_irq() {
///     TIMER_IRQ_ENABLED.store(false, Ordering::SeqCst);
/// }
///
/// fn enable_timer_irq() {
///     TIMER_IRQ_ENABLED.store(true, Ordering::SeqCst);
/// }
///
/// // SAFETY: In this example the "interrupt" never fires, so masking it is trivially enough.
/// let section = unsafe { FnCriticalSection::new(disable_timer_irq, enable_timer_irq) };
///
/// let mut queue = IsrQueue::<u8, 8, _>::new(section);
/// let (mut producer, _consumer) = queue.split();
///
/// producer.push(1).unwrap();
/// assert!(TIMER_IRQ_ENABLED.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Copy)]
pub struct FnCriticalSection {
    lock: fn(),
    unlock: fn(),
}

impl FnCriticalSection {
    /// Creates a critical section that calls `lock` on entry and `unlock` on exit.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that after `lock` returns and until `unlock` is called, the
    /// opposing role of any queue using this critical section cannot execute.
    #[must_use]
    pub const unsafe fn new(lock: fn(), unlock: fn()) -> Self {
        Self { lock, unlock }
    }
}

impl fmt::Debug for FnCriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCriticalSection").finish_non_exhaustive()
    }
}

// SAFETY: The creator of the instance vouched for the functions in `new()`.
unsafe impl CriticalSection for FnCriticalSection {
    type Token = ();

    unsafe fn lock(&self) {
        (self.lock)();
    }

    unsafe fn unlock(&self, _token: ()) {
        (self.unlock)();
    }
}

#[cfg(feature = "critical-section")]
mod global {
    use core::fmt;

    use critical_section::RestoreState;

    use super::CriticalSection;

    /// A critical section that delegates to the [`critical-section`][1] crate.
    ///
    /// On embedded targets the HAL or runtime provides the implementation, typically by
    /// disabling interrupts globally. On hosted targets the `std` feature of `critical-section`
    /// provides a process-wide lock. Either way, no other code that uses the same mechanism can
    /// run between [`lock()`][2] and [`unlock()`][3], which makes this strategy correct for any
    /// queue whose opposing roles both go through `critical-section`.
    ///
    /// The state to restore on exit travels in the token, so one instance can be shared by any
    /// number of queues and entered again while already held.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::{GlobalCriticalSection, IsrQueue};
    ///
    /// static SECTION: GlobalCriticalSection = GlobalCriticalSection::new();
    ///
    /// static COMMANDS: IsrQueue<u16, 4, &GlobalCriticalSection> = IsrQueue::new(&SECTION);
    /// static REPLIES: IsrQueue<u16, 4, &GlobalCriticalSection> = IsrQueue::new(&SECTION);
    ///
    /// assert!(COMMANDS.is_empty());
    /// assert!(REPLIES.is_empty());
    /// ```
    ///
    /// [1]: https://docs.rs/critical-section
    /// [2]: CriticalSection::lock
    /// [3]: CriticalSection::unlock
    #[derive(Clone, Copy)]
    pub struct GlobalCriticalSection {
        _private: (),
    }

    impl GlobalCriticalSection {
        /// Creates the strategy. This is a `const fn` so queues using it can live in a `static`.
        #[must_use]
        pub const fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Default for GlobalCriticalSection {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Debug for GlobalCriticalSection {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("GlobalCriticalSection")
                .finish_non_exhaustive()
        }
    }

    // SAFETY: `critical-section` guarantees global mutual exclusion between acquire and release,
    // which is stronger than excluding only the opposing role.
    unsafe impl CriticalSection for GlobalCriticalSection {
        type Token = RestoreState;

        unsafe fn lock(&self) -> RestoreState {
            // SAFETY: Our caller releases the returned state exactly once, in LIFO order, which
            // is what `acquire()` requires.
            unsafe { critical_section::acquire() }
        }

        unsafe fn unlock(&self, token: RestoreState) {
            // SAFETY: Our caller hands us the state from the matching acquire, in LIFO order.
            unsafe {
                critical_section::release(token);
            }
        }
    }
}

#[cfg(feature = "critical-section")]
pub use global::GlobalCriticalSection;
