//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the memory store, the LRU tracker and the durable
//! adapter against their invariants over arbitrary operation sequences.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheEntry, DurableStore, LruTracker, MemoryStore};
use crate::storage::{MemoryBackend, StorageBackend};

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:_]{1,24}"
}

/// Generates JSON payloads
fn payload_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z ]{0,64}".prop_map(|s| json!(s)),
        ("[a-zA-Z]{1,16}", any::<u32>()).prop_map(|(name, score)| json!({
            "name": name,
            "score": score,
        })),
    ]
}

#[derive(Debug, Clone)]
enum MemoryOp {
    Set(String),
    Touch(String),
    Remove(String),
}

fn memory_op_strategy() -> impl Strategy<Value = MemoryOp> {
    prop_oneof![
        3 => key_strategy().prop_map(MemoryOp::Set),
        2 => key_strategy().prop_map(MemoryOp::Touch),
        1 => key_strategy().prop_map(MemoryOp::Remove),
    ]
}

fn entry(data: Value) -> CacheEntry {
    CacheEntry::new(data, TEST_TTL, false, "1.0")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, the memory store never holds more than
    // its capacity after an insert.
    #[test]
    fn prop_capacity_enforcement(
        ops in prop::collection::vec(memory_op_strategy(), 1..200),
        max_entries in 1usize..20,
    ) {
        let mut store = MemoryStore::new(max_entries);

        for op in ops {
            match op {
                MemoryOp::Set(key) => {
                    store.evict_one_if_full(&key);
                    store.set(&key, entry(json!(1)));
                }
                MemoryOp::Touch(key) => store.touch(&key),
                MemoryOp::Remove(key) => {
                    store.remove(&key);
                }
            }
            prop_assert!(
                store.len() <= max_entries,
                "Store size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // Filling the store and inserting one more key evicts exactly the key
    // with the oldest access, and nothing else.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::hash_set(key_strategy(), 2..10),
        protected_index in any::<prop::sample::Index>(),
        new_key in key_strategy(),
    ) {
        prop_assume!(!initial_keys.contains(&new_key));
        let keys: Vec<String> = initial_keys.into_iter().collect();
        let mut store = MemoryStore::new(keys.len());

        for key in &keys {
            store.evict_one_if_full(key);
            store.set(key, entry(json!(key)));
        }

        let protected = protected_index.get(&keys).clone();
        store.touch(&protected);
        let expected_victim = if protected == keys[0] { keys[1].clone() } else { keys[0].clone() };

        let evicted = store.evict_one_if_full(&new_key);
        store.set(&new_key, entry(json!(0)));

        prop_assert_eq!(evicted.as_ref(), Some(&expected_victim));
        prop_assert!(store.contains(&protected));
        prop_assert!(store.contains(&new_key));
        prop_assert_eq!(store.len(), keys.len());
    }

    // The tracker evicts keys in ascending order of last touch.
    #[test]
    fn prop_lru_tracker_drains_in_access_order(
        touches in prop::collection::vec(key_strategy(), 1..60),
    ) {
        let mut lru = LruTracker::new();
        for key in &touches {
            lru.touch(key);
        }

        // Expected order: distinct keys sorted by their last position.
        let mut seen = HashSet::new();
        let mut expected: Vec<String> = touches
            .iter()
            .rev()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();
        expected.reverse();

        let mut drained = Vec::new();
        while let Some(key) = lru.evict_oldest() {
            drained.push(key);
        }
        prop_assert_eq!(drained, expected);
    }

    // Overwriting a key keeps one entry holding the latest payload.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        first in payload_strategy(),
        second in payload_strategy(),
    ) {
        let mut store = MemoryStore::new(4);
        store.set(&key, entry(first));
        store.set(&key, entry(second.clone()));

        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.get(&key).map(|e| e.data.clone()), Some(second));
    }

    // Any change inside the checksummed prefix of a durable record makes the
    // record read as absent and removes it.
    #[test]
    fn prop_durable_corruption_is_a_miss(
        key in key_strategy(),
        name in "[a-z]{1,16}",
        tampered in "[A-Z]{1,16}",
    ) {
        let backend = MemoryBackend::unbounded();
        let store = DurableStore::new(Arc::new(backend.clone()), "edu_cache", "1.0");
        let data = json!({ "name": name });
        prop_assert!(store.save(&key, &entry(data)));

        let storage_key = store.storage_key(&key);
        let raw = backend.get_item(&storage_key).unwrap().unwrap();
        let mut record: Value = serde_json::from_str(&raw).unwrap();
        record["data"]["name"] = json!(tampered);
        backend.set_item(&storage_key, &record.to_string()).unwrap();

        prop_assert!(store.load(&key).is_none());
        prop_assert!(backend.get_item(&storage_key).unwrap().is_none());
    }

    // A store under another version never yields records written by this one.
    #[test]
    fn prop_version_isolation(
        key in key_strategy(),
        payload in payload_strategy(),
        other_version in "[0-9]\\.[0-9]",
    ) {
        prop_assume!(other_version != "1.0");
        let backend = MemoryBackend::unbounded();
        let v1 = DurableStore::new(Arc::new(backend.clone()), "edu_cache", "1.0");
        let v2 = DurableStore::new(Arc::new(backend), "edu_cache", other_version);

        v1.save(&key, &entry(payload));
        prop_assert!(v2.load(&key).is_none());
        prop_assert!(v1.load(&key).is_none());
    }
}
