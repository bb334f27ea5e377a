//! Wire schema of cross-context messages.

use serde::{Deserialize, Serialize};

use crate::cache::entry::{current_timestamp_ms, CacheEntry};

/// A message exchanged between cache contexts, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheMessage {
    /// An entry was written under `key`
    #[serde(rename = "cache_update")]
    Update {
        key: String,
        data: CacheEntry,
        timestamp: u64,
    },
    /// `key` was deleted; no key means everything was cleared
    #[serde(rename = "cache_clear")]
    Clear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        timestamp: u64,
    },
    #[serde(rename = "cache_sync")]
    Sync { timestamp: u64 },
}

impl CacheMessage {
    pub fn update(key: impl Into<String>, entry: CacheEntry) -> Self {
        Self::Update {
            key: key.into(),
            data: entry,
            timestamp: current_timestamp_ms(),
        }
    }

    pub fn clear(key: Option<String>) -> Self {
        Self::Clear {
            key,
            timestamp: current_timestamp_ms(),
        }
    }

    pub fn sync() -> Self {
        Self::Sync {
            timestamp: current_timestamp_ms(),
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update { .. } => "cache_update",
            Self::Clear { .. } => "cache_clear",
            Self::Sync { .. } => "cache_sync",
        }
    }
}
