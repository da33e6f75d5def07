use thiserror::Error;

/// Failure modes that can be returned to a caller.
///
/// Guard-region corruption is deliberately not represented here: per
/// [`crate::slab::Slab::validate_guard`], a corrupted guard detected during
/// `acquire` is treated as memory already silently overrun and is fatal —
/// the process aborts rather than returning an error a caller could swallow.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `acquire` (or `acquire_typed`) was called for a type key that has
    /// never been registered on the calling thread.
    #[error("type {0:#x} is not registered with this thread's pool")]
    UnknownType(u64),

    /// The slab for this type was full and the overflow allocation used to
    /// service the request failed (the global allocator returned null).
    #[error("overflow allocation failed while servicing an exhausted slab")]
    AllocationFailed,
}
