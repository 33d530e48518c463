//! Cache implementation
//!
//! HashMap of live entries plus a set of pending removals.

use std::collections::hash_map::{self, HashMap};
use std::collections::HashSet;

use super::CacheEntry;

/// In-memory key -> value table
#[derive(Debug)]
pub struct Cache<V> {
    /// Live entries
    entries: HashMap<String, CacheEntry<V>>,

    /// Keys removed from `entries` whose files have not been deleted yet
    pending_removals: HashSet<String>,
}

impl<V> Cache<V> {
    /// Create a new empty Cache
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            pending_removals: HashSet::new(),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Get the full entry (value + dirty flag)
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a value, returning the previous one
    ///
    /// A pending removal for the same key is cancelled: the next write of
    /// the entry replaces the file anyway.
    pub fn insert(&mut self, key: String, value: V, dirty: bool) -> Option<V> {
        self.pending_removals.remove(&key);
        self.entries
            .insert(key, CacheEntry { value, dirty })
            .map(|old| old.value)
    }

    /// Remove a key, returning its value
    ///
    /// When the key was present it is recorded as a pending removal until
    /// `clear_removal` is called for it.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let old = self.entries.remove(key)?;
        self.pending_removals.insert(key.to_string());
        Some(old.value)
    }

    /// Drop every entry and pending removal, returning all keys that may
    /// still have a file on disk
    pub fn clear(&mut self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.drain().map(|(key, _)| key).collect();
        keys.extend(self.pending_removals.drain());
        keys
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys (arbitrary order)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over values (arbitrary order)
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    /// Iterate over key/value pairs (arbitrary order)
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    // =========================================================================
    // Dirty Tracking
    // =========================================================================

    /// Keys changed in memory but not yet written
    pub fn dirty_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of dirty entries plus pending removals
    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.dirty).count() + self.pending_removals.len()
    }

    /// Mark an entry as dirty again (e.g. after a failed write)
    pub fn mark_dirty(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.dirty = true;
        }
    }

    /// Mark an entry as written
    pub fn mark_clean(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.dirty = false;
        }
    }

    /// Keys removed in memory whose files still need deleting
    pub fn pending_removals(&self) -> Vec<String> {
        self.pending_removals.iter().cloned().collect()
    }

    pub fn is_removal_pending(&self, key: &str) -> bool {
        self.pending_removals.contains(key)
    }

    /// Record that the file for `key` is gone
    pub fn clear_removal(&mut self, key: &str) {
        self.pending_removals.remove(key);
    }

    /// Re-record a removal (e.g. after a failed delete)
    ///
    /// Ignored when the key has been set again in the meantime.
    pub fn mark_removal_pending(&mut self, key: &str) {
        if !self.entries.contains_key(key) {
            self.pending_removals.insert(key.to_string());
        }
    }
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over Cache key/value pairs
pub struct Iter<'a, V> {
    inner: hash_map::Iter<'a, String, CacheEntry<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, entry)| (key.as_str(), &entry.value))
    }
}
