//! Two-table incremental-rehash dictionary (spec §4.3).
//!
//! Generalizes the teacher's `storage::memory::Memory`, which stores
//! everything in a single `BTreeMap` with no rehash story at all — this
//! engine's `Entry` values are the unit of ref-counting and LRU/LFU meta,
//! so lookups must stay O(1) amortized the way a real hash dict does, and
//! the spec requires the migration to be incremental and pausable.

use std::collections::HashMap;
use std::hash::Hash;

/// Number of entries migrated from the old table to the new one per
/// `rehash_step` call, bounding the latency any single mutation can incur.
const DEFAULT_REHASH_CHUNK: usize = 16;

/// Resize is considered for triggering once the live table's load factor
/// (len / capacity) crosses this ratio.
const LOAD_FACTOR_TRIGGER: f64 = 1.0;

pub struct IncrementalDict<K, V> {
    primary: HashMap<K, V>,
    /// `Some` while a rehash is in progress: entries move from `primary`
    /// into this table `rehash_chunk` at a time.
    growing: Option<HashMap<K, V>>,
    /// Paused while a snapshot references `primary` directly (spec §4.3);
    /// in this engine that only happens for the instant between a
    /// snapshot's table hand-off and the live table's reallocation, but the
    /// flag is kept so callers can assert the invariant explicitly.
    paused: bool,
    rehash_chunk: usize,
}

impl<K: Eq + Hash + Clone, V> Default for IncrementalDict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V> IncrementalDict<K, V> {
    pub fn new() -> Self {
        Self {
            primary: HashMap::new(),
            growing: None,
            paused: false,
            rehash_chunk: DEFAULT_REHASH_CHUNK,
        }
    }

    pub fn pause_rehash(&mut self) {
        self.paused = true;
    }

    pub fn resume_rehash(&mut self) {
        self.paused = false;
    }

    pub fn is_rehashing(&self) -> bool {
        self.growing.is_some()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.growing.as_ref().map_or(0, |g| g.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.growing
            .as_ref()
            .and_then(|g| g.get(key))
            .or_else(|| self.primary.get(key))
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if let Some(g) = self.growing.as_mut() {
            if g.contains_key(key) {
                return g.get_mut(key);
            }
        }
        self.primary.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.growing.as_ref().is_some_and(|g| g.contains_key(key)) || self.primary.contains_key(key)
    }

    /// Inserts, migrating the key into the growing table if a rehash is
    /// underway, and runs one bounded migration step as a side effect of
    /// every mutation (spec §4.3: "each mutation migrates a small, bounded
    /// number of entries").
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.maybe_start_rehash();
        let old = self.primary.remove(&key);
        let old = match (old, self.growing.as_mut().and_then(|g| g.remove(&key))) {
            (_, Some(from_growing)) => Some(from_growing),
            (Some(from_primary), None) => Some(from_primary),
            (None, None) => None,
        };
        if let Some(growing) = self.growing.as_mut() {
            growing.insert(key, value);
        } else {
            self.primary.insert(key, value);
        }
        self.rehash_step();
        old
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = if let Some(g) = self.growing.as_mut() {
            g.remove(key).or_else(|| self.primary.remove(key))
        } else {
            self.primary.remove(key)
        };
        self.rehash_step();
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.primary.iter().chain(self.growing.iter().flatten())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    fn maybe_start_rehash(&mut self) {
        if self.paused || self.growing.is_some() {
            return;
        }
        let cap = self.primary.capacity().max(1);
        if self.primary.len() as f64 / cap as f64 >= LOAD_FACTOR_TRIGGER {
            self.growing = Some(HashMap::with_capacity(self.primary.len() * 2));
        }
    }

    /// Migrates up to `rehash_chunk` entries from `primary` into `growing`.
    fn rehash_step(&mut self) {
        if self.paused {
            return;
        }
        let Some(growing) = self.growing.as_mut() else { return };
        let keys: Vec<K> = self.primary.keys().take(self.rehash_chunk).cloned().collect();
        for k in keys {
            if let Some(v) = self.primary.remove(&k) {
                growing.insert(k, v);
            }
        }
        if self.primary.is_empty() {
            self.primary = self.growing.take().unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let mut d: IncrementalDict<String, i32> = IncrementalDict::new();
        d.insert("a".into(), 1);
        assert_eq!(d.get(&"a".to_string()), Some(&1));
    }

    #[test]
    fn rehash_completes_under_repeated_mutation() {
        let mut d: IncrementalDict<String, i32> = IncrementalDict::new();
        for i in 0..500 {
            d.insert(format!("k{i}"), i);
        }
        for i in 0..500 {
            assert_eq!(d.get(&format!("k{i}")), Some(&i));
        }
        assert_eq!(d.len(), 500);
    }

    #[test]
    fn pause_rehash_prevents_migration() {
        let mut d: IncrementalDict<String, i32> = IncrementalDict::new();
        d.pause_rehash();
        for i in 0..500 {
            d.insert(format!("k{i}"), i);
        }
        assert!(!d.is_rehashing());
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let mut d: IncrementalDict<String, i32> = IncrementalDict::new();
        assert_eq!(d.remove(&"missing".to_string()), None);
    }
}
