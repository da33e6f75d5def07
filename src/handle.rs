//! RAII ownership over pool-backed memory.
//!
//! [`OwningHandle`] is a unique owner; [`SharedHandle`] is a reference
//! counted owner with the count allocated separately from the pooled value
//! itself, so the slab's slot holds exactly `sizeof(T)` and nothing else.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::PoolError;
use crate::pool;

/// Uniquely owns a `T` constructed in a slot obtained from the calling
/// thread's pool. Dropping it runs `T`'s destructor and returns the slot.
pub struct OwningHandle<T> {
    ptr: NonNull<T>,
}

unsafe impl<T: Send> Send for OwningHandle<T> {}

impl<T> OwningHandle<T> {
    /// Releases ownership without running `T`'s destructor or returning the
    /// slot, handing the caller a raw pointer they're now responsible for.
    pub fn detach(self) -> NonNull<T> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl<T> Deref for OwningHandle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for OwningHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for OwningHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for OwningHandle<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
        }
        pool::release(self.ptr.cast());
    }
}

/// Constructs `value` in a slot from the calling thread's pool for `T`,
/// registering the type on first use, and returns a unique handle to it.
pub fn make_owning<T: 'static>(value: T) -> Result<OwningHandle<T>, PoolError> {
    let ptr = pool::acquire_typed::<T>()?;
    unsafe {
        ptr.as_ptr().write(value);
    }
    Ok(OwningHandle { ptr })
}

struct Shared<T> {
    ptr: NonNull<T>,
    count: NonNull<AtomicUsize>,
}

/// Reference-counted ownership over a pool-backed `T`. The refcount is a
/// separate heap allocation (not colocated with `T`, unlike `Arc<T>`) so the
/// slab's slot stays exactly `sizeof(T)`.
pub struct SharedHandle<T> {
    inner: Shared<T>,
}

unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}
unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        unsafe {
            self.inner.count.as_ref().fetch_add(1, Ordering::Relaxed);
        }
        SharedHandle { inner: Shared { ptr: self.inner.ptr, count: self.inner.count } }
    }
}

impl<T> Deref for SharedHandle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { self.inner.ptr.as_ref() }
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        let remaining = unsafe { self.inner.count.as_ref().fetch_sub(1, Ordering::AcqRel) };
        if remaining != 1 {
            return;
        }
        unsafe {
            ptr::drop_in_place(self.inner.ptr.as_ptr());
            drop(Box::from_raw(self.inner.count.as_ptr()));
        }
        pool::release(self.inner.ptr.cast());
    }
}

/// Constructs `value` in a slot from the calling thread's pool for `T`, with
/// a freshly allocated refcount of one.
pub fn make_shared<T: 'static>(value: T) -> Result<SharedHandle<T>, PoolError> {
    let ptr = pool::acquire_typed::<T>()?;
    unsafe {
        ptr.as_ptr().write(value);
    }
    let count = NonNull::new(Box::into_raw(Box::new(AtomicUsize::new(1)))).expect("box is never null");
    Ok(SharedHandle { inner: Shared { ptr, count } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owning_handle_derefs_and_drops() {
        let handle = make_owning(42u64).unwrap();
        assert_eq!(*handle, 42);
        drop(handle);
    }

    #[test]
    fn shared_handle_clone_keeps_value_alive_until_last_drop() {
        let a = make_shared(String::from("hi")).unwrap();
        let b = a.clone();
        drop(a);
        assert_eq!(&*b, "hi");
        drop(b);
    }

    #[test]
    fn detach_skips_destructor_and_release() {
        let handle = make_owning(7u64).unwrap();
        let raw = handle.detach();
        unsafe {
            assert_eq!(*raw.as_ptr(), 7);
            pool::release(raw.cast());
        }
    }
}
