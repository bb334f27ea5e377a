//! Memory Store Module
//!
//! Bounded in-process map with LRU tracking. This is the fast path for every
//! read and write. It applies no expiry or validity policy of its own; the
//! service decides what is live.

use std::collections::HashMap;

use crate::cache::{CacheCounters, CacheEntry, LruTracker};

// == Memory Store ==
/// In-memory entry map with LRU eviction.
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Read/eviction counters
    counters: CacheCounters,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store holding at most `max_entries` entries.
    ///
    /// A capacity of 0 is raised to 1: the entry being written is always
    /// installed, so a smaller store could not honour its bound.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            counters: CacheCounters::default(),
            max_entries: max_entries.max(1),
        }
    }

    // == Get ==
    /// Returns the entry under `key` without touching LRU order.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Set ==
    /// Stores `entry` under `key`, replacing any previous entry, and marks
    /// the key most recently used.
    pub fn set(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);
    }

    /// Marks an existing key most recently used.
    pub fn touch(&mut self, key: &str) {
        if self.entries.contains_key(key) {
            self.lru.touch(key);
        }
    }

    // == Evict ==
    /// Removes the least recently used entry when the store is at capacity.
    ///
    /// A key that is about to be overwritten does not count as a new entry,
    /// so `incoming` is never evicted to make room for itself.
    pub fn evict_one_if_full(&mut self, incoming: &str) -> Option<String> {
        if self.entries.contains_key(incoming) || self.entries.len() < self.max_entries {
            return None;
        }

        let evicted = self.lru.evict_oldest()?;
        self.entries.remove(&evicted);
        self.counters.record_eviction();
        Some(evicted)
    }

    // == Remove ==
    /// Removes an entry by key. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }

    /// Drops every entry and the LRU index.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Remove Expired ==
    /// Removes all entries stale at `now_ms`, returning how many were removed.
    pub fn remove_expired(&mut self, now_ms: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove(key);
        }
        expired_keys.len()
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut CacheCounters {
        &mut self.counters
    }

    /// Cumulative LRU touches since construction.
    pub fn access_counter(&self) -> u64 {
        self.lru.access_counter()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn entry(value: i64) -> CacheEntry {
        CacheEntry::new(json!(value), Duration::from_secs(300), false, "1.0")
    }

    fn insert(store: &mut MemoryStore, key: &str, value: i64) {
        store.evict_one_if_full(key);
        store.set(key, entry(value));
    }

    #[test]
    fn test_store_new() {
        let store = MemoryStore::new(10);
        assert!(store.is_empty());
        assert_eq!(store.max_entries(), 10);
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let mut store = MemoryStore::new(0);
        insert(&mut store, "a", 1);
        insert(&mut store, "b", 2);

        assert_eq!(store.max_entries(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_get_does_not_touch() {
        let mut store = MemoryStore::new(10);
        insert(&mut store, "a", 1);
        let before = store.access_counter();

        assert_eq!(store.get("a").map(|e| e.data.clone()), Some(json!(1)));
        assert_eq!(store.access_counter(), before);
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let mut store = MemoryStore::new(10);
        insert(&mut store, "a", 1);
        insert(&mut store, "a", 2);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").map(|e| e.data.clone()), Some(json!(2)));
    }

    #[test]
    fn test_eviction_removes_least_recent() {
        let mut store = MemoryStore::new(2);
        insert(&mut store, "a", 1);
        insert(&mut store, "b", 2);
        store.touch("a");
        insert(&mut store, "c", 3);

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert_eq!(store.counters().evictions, 1);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut store = MemoryStore::new(2);
        insert(&mut store, "a", 1);
        insert(&mut store, "b", 2);

        assert_eq!(store.evict_one_if_full("a"), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_touch_unknown_key_is_ignored() {
        let mut store = MemoryStore::new(2);
        store.touch("ghost");
        assert_eq!(store.access_counter(), 0);
    }

    #[test]
    fn test_remove_expired() {
        let mut store = MemoryStore::new(10);
        let mut short = entry(1);
        short.ttl = 10;
        store.set("short", short.clone());
        insert(&mut store, "long", 2);

        let removed = store.remove_expired(short.timestamp + 11);
        assert_eq!(removed, 1);
        assert!(!store.contains("short"));
        assert!(store.contains("long"));
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new(10);
        insert(&mut store, "a", 1);
        insert(&mut store, "b", 2);
        store.clear();

        assert!(store.is_empty());
        assert!(!store.remove("a"));
    }
}
