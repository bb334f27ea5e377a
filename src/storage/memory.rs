//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StorageError;
use crate::storage::StorageBackend;

/// Quota-bounded in-memory backend.
///
/// Clones share the same underlying map, which lets several cache contexts
/// in one process see the same durable data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    items: Arc<Mutex<HashMap<String, String>>>,
    /// Byte budget over all keys and values
    quota: usize,
}

impl MemoryBackend {
    /// Creates an empty backend with the given byte quota.
    pub fn new(quota: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
            quota,
        }
    }

    /// Creates an empty backend without a practical quota.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> Result<usize, StorageError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::AccessDenied("storage lock poisoned".to_string()))
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.lock()?;

        let others: usize = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let requested = others.saturating_add(key.len() + value.len());
        if requested > self.quota {
            return Err(StorageError::QuotaExceeded {
                requested,
                quota: self.quota,
            });
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
