//! Cache Module
//!
//! Two-tier caching: an LRU-bounded memory store in front of a durable
//! store, with TTL expiry, version tagging and checksum validation.

pub mod entry;
mod durable;
mod lru;
mod service;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use durable::DurableStore;
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use service::{
    CacheEvent, CacheService, CacheServiceBuilder, CleanupReport, CriticalLoader, PreloadReport,
    SetOptions,
};
pub use stats::{CacheCounters, CacheStats};
pub use store::MemoryStore;

pub(crate) use service::CacheCore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
