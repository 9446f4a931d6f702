/// Determines what a [`FixedPool`][crate::FixedPool] does with objects that are still alive when
/// the pool itself is dropped.
///
/// By default, the pool drops its remaining objects.
///
/// # Examples
///
/// ```
/// use fixed_primitives::{DropPolicy, FixedPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = FixedPool::<u32, 8>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(pool.drop_policy(), DropPolicy::MustNotDropItems);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool will drop any remaining objects when the pool is dropped. This is the default.
    #[default]
    MayDropItems,

    /// The pool will panic if it still contains objects when it is dropped.
    ///
    /// This may be valuable if objects must be handed back in an orderly fashion, for example
    /// because each one represents a hardware resource that needs explicit shutdown.
    MustNotDropItems,
}
