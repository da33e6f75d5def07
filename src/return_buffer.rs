//! The cross-thread return path: a process-wide multi-producer queue that
//! any thread can push a foreign pointer into, and the housekeeping sweep
//! (run only by the pointer's owning thread) drains.

use crossbeam_queue::SegQueue;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::AtomicBool;

use crate::utils::Backoff;

/// Pointers (as raw addresses) handed off by a thread that isn't their
/// owner, each tagged with how many sweeps it has already survived
/// unclaimed. Lock-free MPMC: any number of releasing threads can push
/// concurrently with a single owner thread draining during housekeeping.
static RETURN_BUFFER: SegQueue<(usize, u32)> = SegQueue::new();

/// Serializes housekeeping sweeps process-wide. A thread's sweep only ever
/// touches its own slabs and dispatch map, but the shared queue itself needs
/// one drainer at a time so a pointer isn't popped by two sweeps at once.
static HOUSEKEEPING_LOCK: Mutex<()> = Mutex::new(());

/// Set for the duration of any thread's sweep. Read by opportunistic
/// housekeeping to back off rather than contend; ignored by mandatory
/// housekeeping, which acquires `HOUSEKEEPING_LOCK` regardless.
pub(crate) static SWEEP_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// Queues a pointer this thread could not reclaim locally, as a first-time
/// foreign return (zero prior sweep attempts).
pub fn push(addr: usize) {
    RETURN_BUFFER.push((addr, 0));
}

pub(crate) fn push_with_attempts(addr: usize, attempts: u32) {
    RETURN_BUFFER.push((addr, attempts));
}

pub(crate) fn pop() -> Option<(usize, u32)> {
    RETURN_BUFFER.pop()
}

pub(crate) fn len() -> usize {
    RETURN_BUFFER.len()
}

pub(crate) fn try_lock_sweep() -> Option<MutexGuard<'static, ()>> {
    HOUSEKEEPING_LOCK.try_lock()
}

/// Blocks until the housekeeping lock is held, spinning with a growing
/// backoff rather than parking outright — mandatory housekeeping is
/// expected to win quickly, so this favors the same short-hold-time retry
/// shape the slab's free-list CAS loop would use under contention.
pub(crate) fn lock_sweep_blocking() -> MutexGuard<'static, ()> {
    let backoff = Backoff::new();
    loop {
        if let Some(guard) = HOUSEKEEPING_LOCK.try_lock() {
            return guard;
        }
        backoff.spin_or_yield();
    }
}
