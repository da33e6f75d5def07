//! Per-thread identity and load sampling.
//!
//! Only [`ThreadInfo::tid`] and [`ThreadInfo::occupancy`] feed the
//! housekeeping decision in [`crate::pool`]; `system_time_ms`/`user_time_ms`
//! exist purely for [`crate::pool::stats`] output and carry no correctness
//! weight.

use std::cell::Cell;
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Abstraction over "what do we know about the calling thread right now".
///
/// [`StdThreadInfo`] is the only implementation shipped, backed by a
/// thread-local instance; the trait exists so tests can drive occupancy
/// without waiting on real scheduler load.
pub trait ThreadInfo {
    fn tid(&self) -> ThreadId;
    /// Percentage of a sampling window this thread was observed runnable, 0-100.
    fn occupancy(&self) -> u8;
    fn system_time_ms(&self) -> u64;
    fn user_time_ms(&self) -> u64;
}

/// Default [`ThreadInfo`], one instance per thread via thread-local storage.
pub struct StdThreadInfo {
    tid: ThreadId,
    occupancy: Cell<u8>,
    created_at: Instant,
}

impl StdThreadInfo {
    fn new() -> Self {
        Self { tid: thread::current().id(), occupancy: Cell::new(0), created_at: Instant::now() }
    }
}

impl ThreadInfo for StdThreadInfo {
    fn tid(&self) -> ThreadId {
        self.tid
    }

    fn occupancy(&self) -> u8 {
        self.occupancy.get()
    }

    fn system_time_ms(&self) -> u64 {
        0
    }

    fn user_time_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }
}

thread_local! {
    static THREAD_INFO: StdThreadInfo = StdThreadInfo::new();
}

/// Overrides the calling thread's reported occupancy. Exercised by tests
/// and by callers who sample their own run queue length externally and want
/// housekeeping to respect it; the pool never calls this itself.
pub fn set_occupancy(percent: u8) {
    THREAD_INFO.with(|info| info.occupancy.set(percent.min(100)));
}

pub(crate) fn current_tid() -> ThreadId {
    THREAD_INFO.with(|info| info.tid())
}

pub(crate) fn current_occupancy() -> u8 {
    THREAD_INFO.with(|info| info.occupancy())
}

pub(crate) fn current_user_time_ms() -> u64 {
    THREAD_INFO.with(|info| info.user_time_ms())
}
