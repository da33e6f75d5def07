//! Tunables governing slab sizing and the housekeeping sweep thresholds.
//!
//! These mirror the fixed limits of the system this crate's design is based
//! on: a fresh type defaults to a six-figure slot count, housekeeping is
//! forced once a thread's slab is almost full, and is attempted
//! opportunistically once it is more than half full and the thread itself
//! isn't busy.

/// Default slot count for a newly registered type when the caller does not
/// request a specific capacity.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Occupied-fraction of a slab's capacity at or above which housekeeping is
/// mandatory: `acquire` blocks on the housekeeping lock rather than skipping it.
pub const HIGH_THRESHOLD: f64 = 0.95;

/// Occupied-fraction of a slab's capacity at or above which housekeeping is
/// attempted opportunistically (best-effort, skipped under contention).
pub const LOW_THRESHOLD: f64 = 0.60;

/// Thread occupancy (percent, 0-100) below which opportunistic housekeeping
/// is allowed to run at all; a thread busier than this is left alone.
pub const OCCUPANCY_CEILING: u8 = 88;

/// Width, in bytes, of the trailing all-zero guard region appended after the
/// last slot of every slab.
pub const GUARD_BYTES: usize = 5;

/// Alignment, in bytes, that every slot is padded up to.
pub const CACHE_LINE: usize = 64;

/// How many housekeeping sweeps a pointer is allowed to circulate through
/// the cross-thread return buffer, unclaimed, before it's logged as
/// probably-garbage and dropped rather than requeued forever.
pub const MAX_FOREIGN_RETRIES: u32 = 8;
