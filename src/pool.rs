//! The per-thread pool itself: registration, acquire/release, and the
//! housekeeping sweep that reclaims objects returned from other threads.

use std::alloc::{alloc_zeroed, dealloc};
use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::thread::ThreadId;

use crate::config::{DEFAULT_CAPACITY, HIGH_THRESHOLD, LOW_THRESHOLD, MAX_FOREIGN_RETRIES, OCCUPANCY_CEILING};
use crate::dispatch::{DispatchMap, SlotLocation};
use crate::error::PoolError;
use crate::registry::TypeRegistry;
use crate::return_buffer::{self, SWEEP_IN_PROGRESS};
use crate::thread_info;
use crate::type_key_of;

#[derive(Default)]
struct Counters {
    get_count: u64,
    return_count: u64,
    overflow_count: u64,
    overflow_returned_count: u64,
    housekeeping_count: u64,
    mandatory_housekeeping_count: u64,
    housekeeping_defer_count: u64,
    abandoned_foreign_count: u64,
}

struct Pool {
    tid: ThreadId,
    volume: usize,
    registry: TypeRegistry,
    dispatch: DispatchMap,
    counters: Counters,
}

impl Pool {
    fn new() -> Self {
        Self {
            tid: thread_info::current_tid(),
            volume: DEFAULT_CAPACITY,
            registry: TypeRegistry::new(),
            dispatch: DispatchMap::new(),
            counters: Counters::default(),
        }
    }
}

thread_local! {
    static POOL: RefCell<Pool> = RefCell::new(Pool::new());
}

/// Sets the slot count applied to types registered on this thread from now
/// on. Does not affect slabs already registered.
pub fn set_per_object_count(capacity: usize) {
    POOL.with(|cell| cell.borrow_mut().volume = capacity);
}

/// Registers a slab for `key` sized for `element_size`-byte elements, using
/// this thread's current per-object count (see [`set_per_object_count`]).
/// Returns `false` and leaves the existing slab untouched if `key` is
/// already registered.
pub fn register_new_object(key: u64, element_size: usize) -> bool {
    POOL.with(|cell| {
        let mut pool = cell.borrow_mut();
        let volume = pool.volume;
        pool.registry.register(key, element_size, volume)
    })
}

/// Registers a slab for `T`, sized for this thread's current per-object count.
pub fn register_type<T: 'static>() -> bool {
    register_new_object(type_key_of::<T>(), std::mem::size_of::<T>())
}

pub fn is_registered(key: u64) -> bool {
    POOL.with(|cell| cell.borrow().registry.is_registered(key))
}

pub fn is_registered_type<T: 'static>() -> bool {
    is_registered(type_key_of::<T>())
}

/// Obtains a zeroed slot for `key` from the calling thread's pool, running
/// housekeeping first if occupancy warrants it. Falls back to a one-off
/// allocator request if the slab is full.
pub fn acquire(key: u64) -> Result<NonNull<u8>, PoolError> {
    POOL.with(|cell| {
        let mut pool = cell.borrow_mut();
        pool.counters.get_count += 1;

        let (capacity, in_use) = {
            let slab = pool.registry.get(key).ok_or(PoolError::UnknownType(key))?;
            (slab.capacity(), slab.in_use_count())
        };

        let occupancy = thread_info::current_occupancy();
        if (in_use as f64) >= capacity as f64 * LOW_THRESHOLD && occupancy < OCCUPANCY_CEILING {
            do_housekeeping_if_allowed(&mut pool, in_use, capacity);
        }

        let slab = pool.registry.get_mut(key).ok_or(PoolError::UnknownType(key))?;
        if let Some((ptr, index)) = slab.try_acquire_slot() {
            pool.dispatch.insert(ptr as usize, SlotLocation::Slab { key, index });
            if !slab.validate_guard() {
                tracing::error!(type_key = key, "guard region corrupted, aborting process");
                std::process::abort();
            }
            return Ok(NonNull::new(ptr).expect("slab slot pointer is never null"));
        }

        let layout = slab.overflow_layout();
        pool.counters.overflow_count += 1;
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(PoolError::AllocationFailed)?;
        pool.dispatch.insert(ptr.as_ptr() as usize, SlotLocation::Overflow { layout });
        tracing::debug!(type_key = key, "slab exhausted, servicing via overflow allocation");
        Ok(ptr)
    })
}

/// Auto-registering typed convenience over [`acquire`]: registers `T` with
/// this thread's current per-object count on first use, then acquires a
/// slot sized for `T`.
pub fn acquire_typed<T: 'static>() -> Result<NonNull<T>, PoolError> {
    let key = type_key_of::<T>();
    if !is_registered(key) {
        register_type::<T>();
    }
    acquire(key).map(NonNull::cast)
}

/// Returns a previously acquired slot. If the calling thread is the owner,
/// the slot is cleaned up (or the overflow allocation freed) immediately.
/// Otherwise the pointer is queued on the shared return buffer for its
/// owner to reclaim during its next housekeeping sweep.
pub fn release(ptr: NonNull<u8>) {
    let addr = ptr.as_ptr() as usize;

    let owned = POOL
        .try_with(|cell| {
            let mut pool = cell.borrow_mut();
            match pool.dispatch.remove(addr) {
                Some(SlotLocation::Slab { key, index }) => {
                    pool.counters.return_count += 1;
                    let slab = pool.registry.get_mut(key).expect("dispatched slab key always exists");
                    slab.cleanup(index);
                    true
                }
                Some(SlotLocation::Overflow { layout }) => {
                    pool.counters.return_count += 1;
                    pool.counters.overflow_returned_count += 1;
                    unsafe { dealloc(ptr.as_ptr(), layout) };
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false);

    if !owned {
        tracing::debug!(addr, "pointer not owned by this thread's pool, queueing as a foreign/unknown return");
        return_buffer::push(addr);
    }
}

/// Runs the housekeeping state machine. Mandatory housekeeping (occupancy at
/// or above `HIGH_THRESHOLD`) always waits for the sweep lock. Opportunistic
/// housekeeping backs off if another thread's sweep is in progress or the
/// lock is contended, recording a deferral instead.
fn do_housekeeping_if_allowed(pool: &mut Pool, in_use: usize, capacity: usize) -> bool {
    if (in_use as f64) >= capacity as f64 * HIGH_THRESHOLD {
        let _guard = return_buffer::lock_sweep_blocking();
        SWEEP_IN_PROGRESS.store(true, Ordering::Release);
        sweep(pool);
        pool.counters.mandatory_housekeeping_count += 1;
        pool.counters.housekeeping_count += 1;
        SWEEP_IN_PROGRESS.store(false, Ordering::Release);
        return true;
    }

    if SWEEP_IN_PROGRESS.load(Ordering::Acquire) {
        pool.counters.housekeeping_defer_count += 1;
        return false;
    }

    match return_buffer::try_lock_sweep() {
        Some(_guard) => {
            SWEEP_IN_PROGRESS.store(true, Ordering::Release);
            sweep(pool);
            pool.counters.housekeeping_count += 1;
            SWEEP_IN_PROGRESS.store(false, Ordering::Release);
            true
        }
        None => {
            pool.counters.housekeeping_defer_count += 1;
            false
        }
    }
}

/// Drains up to the buffer's current length, reclaiming anything that
/// belongs to this thread's own dispatch map. Anything not recognized is
/// requeued with its attempt count bumped, up to `MAX_FOREIGN_RETRIES`
/// sweeps — past that it's logged as probably-garbage (never dispatched by
/// any pool, rather than just owned by a thread that hasn't swept yet) and
/// dropped instead of circulating forever. The length snapshot bounds one
/// sweep to roughly one pass over what was pending when it started, rather
/// than racing producers forever.
fn sweep(pool: &mut Pool) {
    let mut remaining = return_buffer::len();
    while remaining > 0 {
        remaining -= 1;
        let Some((addr, attempts)) = return_buffer::pop() else { break };
        match pool.dispatch.remove(addr) {
            Some(SlotLocation::Slab { key, index }) => {
                pool.counters.return_count += 1;
                if let Some(slab) = pool.registry.get_mut(key) {
                    slab.cleanup(index);
                }
            }
            Some(SlotLocation::Overflow { layout }) => {
                pool.counters.return_count += 1;
                pool.counters.overflow_returned_count += 1;
                unsafe { dealloc(addr as *mut u8, layout) };
            }
            None if attempts + 1 >= MAX_FOREIGN_RETRIES => {
                pool.counters.abandoned_foreign_count += 1;
                tracing::warn!(
                    addr,
                    attempts = attempts + 1,
                    "pointer unclaimed after repeated sweeps, treating as a caller bug and dropping"
                );
            }
            None => return_buffer::push_with_attempts(addr, attempts + 1),
        }
    }
}

/// Checks every registered slab's guard region and logs any mismatch. Unlike
/// the inline check `acquire` performs, this never aborts — it is a
/// diagnostic the caller can poll.
pub fn validate_pools() -> bool {
    POOL.with(|cell| cell.borrow().registry.validate_all())
}

/// Renders a human-readable snapshot of this thread's pool. With `detailed`
/// set, includes a line per registered type.
pub fn stats(detailed: bool) -> String {
    POOL.with(|cell| {
        let pool = cell.borrow();
        let c = &pool.counters;
        let mut out = format!(
            "pool[tid={:?}] slabs={} in_use={} gets={} returns={} overflow={} overflow_returned={} \
             housekeeping={} (mandatory={}, deferred={}) return_buffer_len={} occupancy={}% user_time_ms={}",
            pool.tid,
            pool.registry.iter().count(),
            pool.dispatch.len(),
            c.get_count,
            c.return_count,
            c.overflow_count,
            c.overflow_returned_count,
            c.housekeeping_count,
            c.mandatory_housekeeping_count,
            c.housekeeping_defer_count,
            return_buffer::len(),
            thread_info::current_occupancy(),
            thread_info::current_user_time_ms(),
        );
        if detailed {
            for (key, slab) in pool.registry.iter() {
                out.push_str(&format!(
                    "\n  type {:#x}: {}/{} slots in use, slot_size={}",
                    key,
                    slab.in_use_count(),
                    slab.capacity(),
                    slab.slot_size(),
                ));
            }
            if c.abandoned_foreign_count > 0 {
                out.push_str(&format!("\n  abandoned_foreign={}", c.abandoned_foreign_count));
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_without_registration_fails() {
        let result = acquire(0xdead_beef);
        assert!(matches!(result, Err(PoolError::UnknownType(_))));
    }

    #[test]
    fn register_then_acquire_then_release_round_trips() {
        let key = 0x1234;
        set_per_object_count(4);
        assert!(register_new_object(key, 16));
        let ptr = acquire(key).unwrap();
        release(ptr);
        assert!(stats(false).contains("returns=1"));
    }

    #[test]
    fn overflow_path_triggers_once_slab_is_full() {
        let key = 0x5678;
        set_per_object_count(1);
        assert!(register_new_object(key, 8));
        let first = acquire(key).unwrap();
        let second = acquire(key).unwrap();
        assert_ne!(first.as_ptr(), second.as_ptr());
        release(first);
        release(second);
    }

    #[test]
    fn typed_acquire_auto_registers() {
        assert!(!is_registered_type::<u64>());
        let ptr = acquire_typed::<u64>().unwrap();
        assert!(is_registered_type::<u64>());
        release(ptr.cast());
    }

    #[test]
    fn set_per_object_count_affects_subsequent_registrations_only() {
        let key_a = 0xaaaa;
        let key_b = 0xbbbb;
        assert!(register_new_object(key_a, 8));
        set_per_object_count(2);
        assert!(register_new_object(key_b, 8));

        // key_a kept the default capacity, key_b got the newly set one.
        let a1 = acquire(key_a).unwrap();
        let b1 = acquire(key_b).unwrap();
        let b2 = acquire(key_b).unwrap();
        // key_b's slab (capacity 2) is now full; a third acquire overflows.
        assert!(stats(false).contains("overflow=0"));
        let b3 = acquire(key_b).unwrap();
        assert!(stats(false).contains("overflow=1"));
        release(a1);
        release(b1);
        release(b2);
        release(b3);
    }
}
