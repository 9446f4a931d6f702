use core::any::type_name;
use core::fmt;

use thiserror::Error;

/// A fixed-capacity container had no room for another item.
///
/// Returned by [`FixedPool::create()`][crate::FixedPool::create] on a full pool and by
/// [`Producer::push()`][crate::Producer::push] on a full queue. The rejected input is handed
/// back to the caller, so nothing is ever silently dropped.
///
/// # Examples
///
/// ```
/// use fixed_primitives::FixedPool;
///
/// let mut pool = FixedPool::<u64, 1>::new();
/// let _first = pool.create(1).unwrap();
///
/// let error = pool.create(2).unwrap_err();
/// assert_eq!(*error.rejected(), 2);
/// assert_eq!(error.into_inner(), 2);
/// ```
#[derive(Error)]
#[error("no free slot is left in the fixed-capacity container")]
pub struct Exhausted<T> {
    rejected: T,
}

impl<T> Exhausted<T> {
    pub(crate) const fn new(rejected: T) -> Self {
        Self { rejected }
    }

    /// The input that could not be stored.
    #[must_use]
    pub fn rejected(&self) -> &T {
        &self.rejected
    }

    /// Takes back the input that could not be stored.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.rejected
    }
}

// The rejected value is often a closure or some other type without `Debug`,
// so we only name its type instead of requiring `T: Debug`.
impl<T> fmt::Debug for Exhausted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exhausted")
            .field("rejected", &format_args!("{}", type_name::<T>()))
            .finish()
    }
}
