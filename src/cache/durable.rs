//! Durable Store Adapter
//!
//! Best-effort persistence of cache entries into a [`StorageBackend`].
//! Every record lives under `"{prefix}_{key}"`. Backend failures never
//! escape this adapter: they are logged and reported as `false`/`None`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::storage::StorageBackend;

// == Durable Store ==
/// Prefix- and version-aware view of a durable backend.
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    version: String,
}

impl DurableStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        prefix: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    /// Backend key of a cache key.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    fn owns(&self, storage_key: &str) -> bool {
        storage_key
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    // == Save ==
    /// Persists `entry` under `key`.
    ///
    /// On failure, sweeps expired records under the prefix and retries once.
    /// Returns false if the entry could not be persisted; it then lives in
    /// memory only.
    pub fn save(&self, key: &str, entry: &CacheEntry) -> bool {
        let serialized = match serde_json::to_string(entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Durable save of '{}' skipped, serialization failed: {}", key, e);
                return false;
            }
        };

        let storage_key = self.storage_key(key);
        let first_error = match self.backend.set_item(&storage_key, &serialized) {
            Ok(()) => return true,
            Err(e) => e,
        };

        let swept = self.sweep_expired();
        debug!(
            "Durable save of '{}' failed ({}), swept {} expired records before retry",
            key, first_error, swept
        );

        match self.backend.set_item(&storage_key, &serialized) {
            Ok(()) => true,
            Err(e) => {
                warn!("Durable save of '{}' failed, keeping it in memory only: {}", key, e);
                false
            }
        }
    }

    // == Load ==
    /// Reads the entry under `key`.
    ///
    /// Corrupt, version-mismatched, checksum-mismatched and expired records
    /// are deleted and reported as absent.
    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        let storage_key = self.storage_key(key);
        let raw = match self.backend.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Durable load of '{}' failed: {}", key, e);
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable durable record '{}': {}", key, e);
                self.remove_storage_key(&storage_key);
                return None;
            }
        };

        let rejection = if entry.version != self.version {
            Some("version mismatch")
        } else if !entry.has_valid_checksum() {
            Some("checksum mismatch")
        } else if entry.is_expired() {
            Some("expired")
        } else {
            None
        };

        match rejection {
            Some(reason) => {
                debug!("Discarding durable record '{}': {}", key, reason);
                self.remove_storage_key(&storage_key);
                None
            }
            None => Some(entry),
        }
    }

    // == Remove ==
    /// Deletes the record under `key`, if any.
    pub fn remove(&self, key: &str) {
        self.remove_storage_key(&self.storage_key(key));
    }

    fn remove_storage_key(&self, storage_key: &str) {
        if let Err(e) = self.backend.remove_item(storage_key) {
            warn!("Durable remove of '{}' failed: {}", storage_key, e);
        }
    }

    fn owned_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| self.owns(k)).collect(),
            Err(e) => {
                warn!("Listing durable keys failed: {}", e);
                Vec::new()
            }
        }
    }

    // == Sweep Expired ==
    /// Deletes every record under the prefix that is expired, unreadable or
    /// written under another version. Returns the number of records deleted.
    pub fn sweep_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;

        for storage_key in self.owned_keys() {
            let raw = match self.backend.get_item(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Durable sweep could not read '{}': {}", storage_key, e);
                    continue;
                }
            };

            let stale = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entry.is_expired_at(now) || entry.version != self.version,
                Err(_) => true,
            };

            if stale {
                self.remove_storage_key(&storage_key);
                removed += 1;
            }
        }

        removed
    }

    // == Clear ==
    /// Deletes every record under the prefix. Returns the number deleted.
    pub fn clear(&self) -> usize {
        let keys = self.owned_keys();
        for storage_key in &keys {
            self.remove_storage_key(storage_key);
        }
        keys.len()
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("prefix", &self.prefix)
            .field("version", &self.version)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    fn store_on(backend: &MemoryBackend) -> DurableStore {
        DurableStore::new(Arc::new(backend.clone()), "edu_cache", "1.0")
    }

    fn entry(data: serde_json::Value, ttl_ms: u64) -> CacheEntry {
        CacheEntry::new(data, Duration::from_millis(ttl_ms), false, "1.0")
    }

    #[test]
    fn test_save_and_load() {
        let backend = MemoryBackend::unbounded();
        let store = store_on(&backend);

        assert!(store.save("user:42", &entry(json!({"name": "Aylin"}), 60_000)));
        assert!(backend.get_item("edu_cache_user:42").unwrap().is_some());

        let loaded = store.load("user:42").unwrap();
        assert_eq!(loaded.data, json!({"name": "Aylin"}));
    }

    #[test]
    fn test_load_missing() {
        let backend = MemoryBackend::unbounded();
        assert!(store_on(&backend).load("nothing").is_none());
    }

    #[test]
    fn test_load_expired_deletes_record() {
        let backend = MemoryBackend::unbounded();
        let store = store_on(&backend);

        let mut stale = entry(json!(1), 10);
        stale.timestamp -= 1_000;
        store.save("old", &stale);

        assert!(store.load("old").is_none());
        assert!(backend.get_item("edu_cache_old").unwrap().is_none());
    }

    #[test]
    fn test_load_version_mismatch_deletes_record() {
        let backend = MemoryBackend::unbounded();
        store_on(&backend).save("k", &entry(json!(1), 60_000));

        let bumped = DurableStore::new(Arc::new(backend.clone()), "edu_cache", "2.0");
        assert!(bumped.load("k").is_none());
        assert!(backend.get_item("edu_cache_k").unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_payload_deletes_record() {
        let backend = MemoryBackend::unbounded();
        let store = store_on(&backend);
        store.save("k", &entry(json!({"score": 10}), 60_000));

        let raw = backend.get_item("edu_cache_k").unwrap().unwrap();
        let mut record: serde_json::Value = serde_json::from_str(&raw).unwrap();
        record["data"] = json!({"score": 99});
        backend.set_item("edu_cache_k", &record.to_string()).unwrap();

        assert!(store.load("k").is_none());
        assert!(backend.get_item("edu_cache_k").unwrap().is_none());
    }

    #[test]
    fn test_load_unparseable_deletes_record() {
        let backend = MemoryBackend::unbounded();
        backend.set_item("edu_cache_junk", "{not json").unwrap();

        assert!(store_on(&backend).load("junk").is_none());
        assert!(backend.get_item("edu_cache_junk").unwrap().is_none());
    }

    #[test]
    fn test_sweep_expired_only_touches_own_prefix() {
        let backend = MemoryBackend::unbounded();
        let store = store_on(&backend);

        let mut stale = entry(json!(1), 10);
        stale.timestamp -= 1_000;
        store.save("stale", &stale);
        store.save("fresh", &entry(json!(2), 60_000));
        backend.set_item("edu_cache_corrupt", "garbage").unwrap();
        backend.set_item("edu_cachex_other", "garbage").unwrap();
        backend.set_item("unrelated", "garbage").unwrap();

        assert_eq!(store.sweep_expired(), 2);
        assert!(backend.get_item("edu_cache_fresh").unwrap().is_some());
        assert!(backend.get_item("edu_cachex_other").unwrap().is_some());
        assert!(backend.get_item("unrelated").unwrap().is_some());
    }

    #[test]
    fn test_save_sweeps_then_retries_on_quota() {
        let probe = entry(json!("payload"), 60_000);
        let record_len = "edu_cache_a".len() + serde_json::to_string(&probe).unwrap().len();
        let backend = MemoryBackend::new(record_len + 8);
        let store = store_on(&backend);

        let mut stale = probe.clone();
        stale.timestamp -= 120_000;
        assert!(store.save("a", &stale));

        // Only fits once the expired record is swept.
        assert!(store.save("b", &probe));
        assert!(backend.get_item("edu_cache_a").unwrap().is_none());
        assert!(store.load("b").is_some());
    }

    #[test]
    fn test_save_fails_softly_when_quota_is_too_small() {
        let backend = MemoryBackend::new(16);
        let store = store_on(&backend);

        assert!(!store.save("big", &entry(json!("x".repeat(64)), 60_000)));
        assert!(store.load("big").is_none());
    }

    #[test]
    fn test_clear_removes_only_prefixed_keys() {
        let backend = MemoryBackend::unbounded();
        let store = store_on(&backend);
        store.save("a", &entry(json!(1), 60_000));
        store.save("b", &entry(json!(2), 60_000));
        backend.set_item("session_token", "keep").unwrap();

        assert_eq!(store.clear(), 2);
        assert_eq!(backend.keys().unwrap(), vec!["session_token".to_string()]);
    }
}
