use core::any::type_name;
use core::fmt;
use core::marker::PhantomData;

use crate::{DropPolicy, FixedPool};

/// Builder for creating an instance of [`FixedPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`FixedPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use fixed_primitives::{DropPolicy, FixedPool};
///
/// let pool = FixedPool::<u32, 16>::builder()
///     .drop_policy(DropPolicy::MayDropItems)
///     .build();
/// ```
///
/// [1]: FixedPool::new
#[must_use]
pub struct FixedPoolBuilder<T, const CAPACITY: usize> {
    drop_policy: DropPolicy,

    _item: PhantomData<fn() -> T>,
}

impl<T, const CAPACITY: usize> fmt::Debug for FixedPoolBuilder<T, CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &CAPACITY)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T, const CAPACITY: usize> FixedPoolBuilder<T, CAPACITY> {
    pub(crate) const fn new() -> Self {
        Self {
            drop_policy: DropPolicy::MayDropItems,
            _item: PhantomData,
        }
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining objects in the pool when the pool is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u32, 16>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    /// ```
    pub const fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// This is a `const fn`, so the pool can be built in a `static` initializer.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_primitives::FixedPool;
    ///
    /// let pool = FixedPool::<u32, 16>::builder().build();
    /// assert_eq!(pool.capacity(), 16);
    /// ```
    #[must_use]
    pub const fn build(self) -> FixedPool<T, CAPACITY> {
        FixedPool::with_drop_policy(self.drop_policy)
    }
}
