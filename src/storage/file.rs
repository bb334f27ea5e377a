//! File-backed storage backend.
//!
//! Each key is stored in its own file named after the hex encoding of the
//! key, so arbitrary keys map to portable file names. Keys whose encoding
//! would exceed file name limits are named by their SHA-256 digest instead,
//! with the original key kept in a `.key` file next to the value.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::StorageError;
use crate::storage::StorageBackend;

const EXTENSION: &str = "json";
const KEY_EXTENSION: &str = "key";

/// Longest hex-encoded key used directly as a file stem.
const MAX_ENCODED_STEM: usize = 128;

/// Stem prefix of digest-named files. Never valid hex.
const DIGEST_PREFIX: &str = "sha256-";

/// Quota-bounded directory backend.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    /// Byte budget over all stored values
    quota: usize,
}

impl FileBackend {
    /// Opens (creating if needed) a backend rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, quota: usize) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("File backend opened at {}", dir.display());
        Ok(Self { dir, quota })
    }

    fn stem_for(key: &str) -> String {
        let encoded = hex::encode(key);
        if encoded.len() <= MAX_ENCODED_STEM {
            encoded
        } else {
            format!("{}{}", DIGEST_PREFIX, hex::encode(Sha256::digest(key.as_bytes())))
        }
    }

    fn value_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, EXTENSION))
    }

    fn key_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, KEY_EXTENSION))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.value_path(&Self::stem_for(key))
    }

    /// Recovers the key stored under `stem`, None for files we did not write.
    fn key_for_stem(&self, stem: &str) -> Option<String> {
        if stem.starts_with(DIGEST_PREFIX) {
            return fs::read_to_string(self.key_path(stem)).ok();
        }
        hex::decode(stem)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Bytes used by every stored value except the one at `skip`.
    fn used_bytes_except(&self, skip: &Path) -> Result<usize, StorageError> {
        let mut used = 0usize;
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            used = used.saturating_add(fs::metadata(&path)?.len() as usize);
        }
        Ok(used)
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(StorageError::AccessDenied(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let stem = Self::stem_for(key);
        let path = self.value_path(&stem);
        let requested = self.used_bytes_except(&path)?.saturating_add(value.len());
        if requested > self.quota {
            return Err(StorageError::QuotaExceeded {
                requested,
                quota: self.quota,
            });
        }

        let write = |path: PathBuf, contents: &str| {
            fs::write(path, contents).map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => StorageError::AccessDenied(e.to_string()),
                _ => StorageError::from(e),
            })
        };
        if stem.starts_with(DIGEST_PREFIX) {
            write(self.key_path(&stem), key)?;
        }
        write(path, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let stem = Self::stem_for(key);
        remove_if_present(&self.value_path(&stem))?;
        if stem.starts_with(DIGEST_PREFIX) {
            remove_if_present(&self.key_path(&stem))?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let key = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| self.key_for_stem(stem));
            if let Some(key) = key {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
