//! Resilient Cache - a two-tier client-side cache
//!
//! Memory + durable tiers with TTL and priority expiry, checksum-based
//! corruption detection, LRU eviction, cross-context synchronization and
//! network-aware resync.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod storage;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEvent, CacheService, SetOptions};
pub use config::{CacheConfig, Config};
pub use tasks::spawn_connectivity_probe;
