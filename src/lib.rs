//! A per-thread, type-segregated object pool.
//!
//! Each thread owns its own set of fixed-size slabs, one per registered
//! type, and serves `acquire`/`release` entirely out of thread-local state
//! on the common path. An object released by a thread other than the one
//! that allocated it is queued on a shared cross-thread buffer and reclaimed
//! by its owner the next time that owner's pool runs housekeeping.
//!
//! ```
//! use threadpool_alloc::{acquire_typed, release};
//!
//! let ptr = acquire_typed::<u64>().unwrap();
//! unsafe { ptr.as_ptr().write(7) };
//! release(ptr.cast());
//! ```
//!
//! Most callers will prefer the RAII wrappers in [`handle`] over the raw
//! `acquire`/`release` pair.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod pool;
pub mod registry;
pub mod slab;
pub mod thread_info;
mod return_buffer;
mod utils;

pub use error::PoolError;
pub use handle::{make_owning, make_shared, OwningHandle, SharedHandle};
pub use pool::{
    acquire, acquire_typed, is_registered, is_registered_type, register_new_object, register_type,
    release, set_per_object_count, stats, validate_pools,
};
pub use thread_info::{set_occupancy, ThreadInfo};

use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Derives a stable `u64` key for `T`, used to index a thread's
/// [`registry::TypeRegistry`] without requiring callers to pick their own
/// identifiers.
pub fn type_key_of<T: 'static>() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    TypeId::of::<T>().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_key_is_stable_and_distinguishes_types() {
        assert_eq!(type_key_of::<u32>(), type_key_of::<u32>());
        assert_ne!(type_key_of::<u32>(), type_key_of::<u64>());
    }
}
