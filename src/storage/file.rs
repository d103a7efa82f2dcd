//! File-backed storage
//!
//! Persists each record as `<base_dir>/<key>.json`. Writes go to a temporary
//! sibling first and are renamed into place, so a crash mid-write leaves the
//! previous record intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::{Storage, validate_key};
use crate::{Error, Result};

/// Storage rooted at a directory.
pub struct FileStorage {
    /// Base directory for record files
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            std::fs::create_dir_all(&base_dir).map_err(|e| {
                Error::PersistenceFailed(format!(
                    "Failed to create storage dir {}: {e}",
                    base_dir.display()
                ))
            })?;
        }
        Ok(Self { base_dir })
    }

    /// Storage in the default location (`~/.artifactory-secrets`).
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
        Self::new(home.join(".artifactory-secrets"))
    }

    /// Root directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

fn persistence(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::PersistenceFailed(format!("Failed to {action} {}: {e}", path.display()))
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let path = self.record_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence("read", &path, &e)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let path = self.record_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence("create", parent, &e))?;
        }

        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, &value)
            .await
            .map_err(|e| persistence("write", &tmp, &e))?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await;
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(persistence("replace", &path, &e));
        }

        debug!(key = %key, "Persisted record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.record_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("delete", &path, &e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.base_dir.join(prefix.trim_end_matches('/'));
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence("list", &dir, &e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| persistence("list", &dir, &e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(".json") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
