//! Cache Entry Module
//!
//! Defines the versioned, checksummed, TTL-stamped unit of cached data.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of leading characters of the serialized payload covered by the checksum
pub const CHECKSUM_PREFIX_CHARS: usize = 100;

/// Length of the hex-encoded checksum kept on the entry
const CHECKSUM_LEN: usize = 16;

// == Cache Entry ==
/// A single cache entry. Serialized as-is into the durable store and into
/// cross-context messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored payload
    pub data: Value,
    /// Write timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time-to-live in milliseconds, counted from `timestamp`
    pub ttl: u64,
    /// Digest of the payload prefix, used to detect storage corruption
    #[serde(default)]
    pub checksum: Option<String>,
    /// Written with the priority TTL class
    #[serde(default)]
    pub priority: bool,
    /// Format version the entry was written under
    pub version: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time and a fresh checksum.
    pub fn new(data: Value, ttl: Duration, priority: bool, version: impl Into<String>) -> Self {
        let checksum = Some(checksum(&data));
        Self {
            data,
            timestamp: current_timestamp_ms(),
            ttl: ttl.as_millis() as u64,
            checksum,
            priority,
            version: version.into(),
        }
    }

    // == Is Expired ==
    /// An entry is stale once strictly more than `ttl` has passed since `timestamp`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) > self.ttl
    }

    /// Checks expiry against the current wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Returns true when the entry carries no checksum or its checksum matches
    /// the payload.
    pub fn has_valid_checksum(&self) -> bool {
        match &self.checksum {
            Some(stored) => *stored == checksum(&self.data),
            None => true,
        }
    }
}

// == Checksum ==
/// Short digest of the first [`CHECKSUM_PREFIX_CHARS`] characters of the
/// serialized payload. Corruption past that prefix goes undetected.
pub fn checksum(data: &Value) -> String {
    let serialized = data.to_string();
    let prefix: String = serialized.chars().take(CHECKSUM_PREFIX_CHARS).collect();

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(CHECKSUM_LEN);
    digest
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with_ttl(ttl_ms: u64) -> CacheEntry {
        CacheEntry::new(json!({"name": "Aylin"}), Duration::from_millis(ttl_ms), false, "1.0")
    }

    #[test]
    fn test_entry_creation() {
        let entry = entry_with_ttl(60_000);

        assert_eq!(entry.data, json!({"name": "Aylin"}));
        assert_eq!(entry.ttl, 60_000);
        assert_eq!(entry.version, "1.0");
        assert!(!entry.priority);
        assert!(entry.checksum.is_some());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiry_is_strict() {
        let entry = entry_with_ttl(1_000);
        let ts = entry.timestamp;

        assert!(!entry.is_expired_at(ts));
        assert!(!entry.is_expired_at(ts + 1_000), "exactly ttl is still live");
        assert!(entry.is_expired_at(ts + 1_001));
    }

    #[test]
    fn test_expiry_tolerates_clock_behind_timestamp() {
        let entry = entry_with_ttl(10);
        assert!(!entry.is_expired_at(entry.timestamp - 5));
    }

    #[test]
    fn test_checksum_detects_payload_change() {
        let mut entry = entry_with_ttl(60_000);
        assert!(entry.has_valid_checksum());

        entry.data = json!({"name": "Mallory"});
        assert!(!entry.has_valid_checksum());
    }

    #[test]
    fn test_missing_checksum_is_accepted() {
        let mut entry = entry_with_ttl(60_000);
        entry.checksum = None;
        assert!(entry.has_valid_checksum());
    }

    #[test]
    fn test_checksum_only_covers_prefix() {
        let head = "x".repeat(CHECKSUM_PREFIX_CHARS);
        let a = json!(format!("{head}tail-one"));
        let b = json!(format!("{head}tail-two"));

        assert_eq!(checksum(&a), checksum(&b));
        assert_eq!(checksum(&a).len(), CHECKSUM_LEN);
    }

    #[test]
    fn test_serialized_field_names() {
        let entry = entry_with_ttl(5_000);
        let json = serde_json::to_value(&entry).unwrap();

        for field in ["data", "timestamp", "ttl", "checksum", "priority", "version"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
