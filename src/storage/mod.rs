//! Key/value persistence for backend records.
//!
//! The [`Storage`] trait abstracts over storage backends. Two implementations
//! ship with the crate:
//!
//! - [`MemoryStorage`]: a `BTreeMap` behind a lock, for tests and ephemeral
//!   deployments.
//! - [`FileStorage`]: one JSON file per key under a base directory, written
//!   atomically via rename.
//!
//! Keys are `/`-separated paths (`config/admin`, `roles/deployer`). Values are
//! opaque bytes; the JSON helpers below are what the backend uses.

pub mod file;
pub mod memory;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result};

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Trait abstracting the record storage backend.
///
/// `put` must replace the whole value in one step: readers see either the
/// previous value or the new one, never a mix.
#[async_trait::async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Read a value. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a value. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Names of the direct children under `prefix`, sorted ascending.
    ///
    /// `list("roles/")` returns `["deployer", "reader"]`, not full keys.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read and decode a JSON record.
pub async fn get_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
    match storage.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::PersistenceFailed(format!("corrupt record at {key}: {e}"))),
        None => Ok(None),
    }
}

/// Encode and write a JSON record.
pub async fn put_json<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    storage.put(key, bytes).await
}

/// Reject keys that could escape a storage root or address nothing.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(Error::InvalidRequest(format!("invalid storage key '{key}'")));
    }
    Ok(())
}
