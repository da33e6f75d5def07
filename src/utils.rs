//! Small helpers shared across the pool implementation: alignment math and
//! a spin/yield backoff used by the free-list and housekeeping retry loops.

use std::sync::atomic::{AtomicU32, Ordering};

/// Rounds `value` up to the next multiple of `align`. `align` must be a power of two.
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Exponential spin/yield backoff, doubling the spin count on each call up to `max`.
///
/// Used while contending for the housekeeping lock and while retrying the
/// lock-free free-list CAS in the slab allocator.
pub struct Backoff {
    current: AtomicU32,
    max: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self::with_max(64)
    }

    pub fn with_max(max: u32) -> Self {
        Self { current: AtomicU32::new(1), max }
    }

    /// Spins the CPU a number of times proportional to how many times this
    /// backoff has already been asked to spin, then grows the step.
    pub fn spin(&self) {
        let step = self.current.load(Ordering::Relaxed);
        for _ in 0..step {
            std::hint::spin_loop();
        }
        let next = (step * 2).min(self.max);
        self.current.store(next, Ordering::Relaxed);
    }

    /// Like [`Backoff::spin`] but yields the thread once the step has grown
    /// past the max, instead of spinning indefinitely.
    pub fn spin_or_yield(&self) {
        let step = self.current.load(Ordering::Relaxed);
        if step >= self.max {
            std::thread::yield_now();
        } else {
            self.spin();
        }
    }

    pub fn reset(&self) {
        self.current.store(1, Ordering::Relaxed);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let b = Backoff::with_max(4);
        assert_eq!(b.current.load(Ordering::Relaxed), 1);
        b.spin();
        assert_eq!(b.current.load(Ordering::Relaxed), 2);
        b.spin();
        assert_eq!(b.current.load(Ordering::Relaxed), 4);
        b.spin();
        assert_eq!(b.current.load(Ordering::Relaxed), 4);
    }

    proptest::proptest! {
        #[test]
        fn align_up_never_undershoots_and_lands_on_a_multiple(value in 0usize..1_000_000, shift in 0u32..12) {
            let align = 1usize << shift;
            let rounded = align_up(value, align);
            proptest::prop_assert!(rounded >= value);
            proptest::prop_assert_eq!(rounded % align, 0);
            proptest::prop_assert!(rounded - value < align);
        }
    }
}
