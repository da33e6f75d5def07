//! Maps a type key to the thread's slab for that type.

use std::collections::HashMap;

use crate::slab::Slab;

/// One thread's collection of per-type slabs, keyed by a stable hash of the
/// element type ([`crate::type_key_of`]).
#[derive(Default)]
pub struct TypeRegistry {
    slabs: HashMap<u64, Slab>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new slab for `key` if one doesn't already exist.
    /// Returns `false` without modifying anything if `key` is already registered.
    pub fn register(&mut self, key: u64, element_size: usize, capacity: usize) -> bool {
        if self.slabs.contains_key(&key) {
            return false;
        }
        self.slabs.insert(key, Slab::new(capacity, element_size));
        true
    }

    pub fn is_registered(&self, key: u64) -> bool {
        self.slabs.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&Slab> {
        self.slabs.get(&key)
    }

    pub fn get_mut(&mut self, key: u64) -> Option<&mut Slab> {
        self.slabs.get_mut(&key)
    }

    /// Validates every registered slab's guard region, logging each failure
    /// but never aborting — this is the diagnostic counterpart to the fatal
    /// check `Pool::acquire` runs inline after every allocation.
    pub fn validate_all(&self) -> bool {
        let mut all_sane = true;
        for (key, slab) in &self.slabs {
            if !slab.validate_guard() {
                tracing::error!(type_key = key, "guard region corrupted");
                all_sane = false;
            }
        }
        all_sane
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Slab)> {
        self.slabs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_duplicate_key() {
        let mut reg = TypeRegistry::new();
        assert!(reg.register(1, 16, 10));
        assert!(!reg.register(1, 16, 10));
    }

    #[test]
    fn validate_all_true_when_untouched() {
        let mut reg = TypeRegistry::new();
        reg.register(1, 16, 10);
        reg.register(2, 32, 5);
        assert!(reg.validate_all());
    }
}
