//! Durable key-value storage for client state.
//!
//! The cart and the session identity survive application restarts through a
//! small key-value abstraction. Production uses [`FileStorage`] (one JSON
//! document per key); tests use [`MemoryStorage`].

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// Storage keys for persisted client state.
pub mod keys {
    /// Serialized session identity.
    pub const IDENTITY: &str = "user";

    /// Serialized cart snapshot.
    pub const CART: &str = "cart";

    /// Legacy auth-token key. Retained only so logout can clear it; never
    /// consulted for session validity.
    pub const LEGACY_TOKEN: &str = "token";
}

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable key-value storage.
///
/// Implementations must tolerate concurrent reads; writes happen from the
/// single logical writer that owns each store.
pub trait StateStorage: Send + Sync {
    /// Load the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the underlying read or parse fails.
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the underlying write fails.
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the underlying delete fails.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Load and deserialize a typed value.
///
/// # Errors
///
/// Returns `StorageError` if the read or deserialization fails.
pub fn load_typed<T, S>(storage: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: StateStorage + ?Sized,
{
    match storage.load(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store a typed value.
///
/// # Errors
///
/// Returns `StorageError` if the serialization or write fails.
pub fn save_typed<T, S>(storage: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize,
    S: StateStorage + ?Sized,
{
    storage.save(key, &serde_json::to_value(value)?)
}

// =============================================================================
// File-backed storage
// =============================================================================

/// File-backed storage: one `<key>.json` document per key.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// In-memory storage for tests.
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
