//! Request DTOs for the inspection API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{SetOptions, MAX_KEY_LENGTH};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses the configured TTL class if absent)
/// - `priority`: Store with the priority TTL class
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub priority: bool,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least one second".to_string());
        }
        None
    }

    pub fn options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl.map(Duration::from_secs),
            priority: self.priority,
        }
    }
}

/// Request body for the connectivity override (PUT /network)
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkRequest {
    pub online: bool,
}
