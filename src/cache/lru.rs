//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::HashMap;

// == LRU Tracker ==
/// Tracks access order with a monotonically increasing access counter.
///
/// Every touch stamps the key with the next counter value, so no two keys
/// ever share a stamp and the least recently used key is the one with the
/// smallest stamp. Keys inserted and never read again are therefore evicted
/// in insertion order.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Last access stamp per key
    order: HashMap<String, u64>,
    /// Total number of touches so far
    counter: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.counter += 1;
        match self.order.get_mut(key) {
            Some(stamp) => *stamp = self.counter,
            None => {
                self.order.insert(key.to_string(), self.counter);
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.remove(key);
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order
            .iter()
            .min_by_key(|(_, stamp)| **stamp)
            .map(|(key, _)| key.as_str())
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let key = self.peek_oldest()?.to_string();
        self.order.remove(&key);
        Some(key)
    }

    /// Forgets every key. The access counter keeps running.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Cumulative number of touches.
    pub fn access_counter(&self) -> u64 {
        self.counter
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.contains_key(key)
    }
}
