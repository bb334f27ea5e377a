//! Storage Module
//!
//! Durable key/value primitives the cache persists into. A backend is
//! synchronous, quota-bounded and may be shared by several cache contexts.
//!
//! # Backends
//! - `MemoryBackend`: process-local, cloneable handle onto shared storage
//! - `FileBackend`: one file per key, survives restarts

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::StorageError;

/// Capability interface of a durable key/value backend.
///
/// Writes are last-write-wins; no locking is provided across contexts.
pub trait StorageBackend: Send + Sync {
    /// Returns the raw value under `key`, or None when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, failing when the quota would be exceeded.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every stored key.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}
