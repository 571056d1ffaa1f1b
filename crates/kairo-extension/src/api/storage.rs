//! Per-extension key/value data storage.
//!
//! Each owner gets `<data_dir>/<owner_id>/`, and every key maps to one
//! `<key>.json` file inside it. Ids and keys are validated before any path
//! is built, so a key can never name a file outside the owner's directory.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use kairo_core::{AppError, AppResult};

use crate::fs::{validate_data_key, validate_extension_id};

/// Data storage scoped to one owner.
#[derive(Debug, Clone)]
pub struct ExtensionStorage {
    owner_id: String,
    dir: PathBuf,
    max_size: usize,
}

impl ExtensionStorage {
    /// Creates storage for `owner_id` under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, owner_id: &str, max_size: usize) -> AppResult<Self> {
        validate_extension_id(owner_id).map_err(AppError::validation)?;
        Ok(Self {
            owner_id: owner_id.to_string(),
            dir: data_dir.into().join(owner_id),
            max_size,
        })
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        validate_data_key(key).map_err(AppError::validation)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Returns the stored text, or `None` if the key was never written.
    pub async fn read(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                kairo_core::error::ErrorKind::Storage,
                format!("Failed to read '{}'", path.display()),
                e,
            )),
        }
    }

    /// Writes `data` under `key`, creating the owner directory if needed.
    pub async fn write(&self, key: &str, data: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        if data.len() > self.max_size {
            return Err(AppError::validation(format!(
                "Data too large: {} bytes (max {})",
                data.len(),
                self.max_size
            )));
        }

        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, data).await?;

        debug!(owner = %self.owner_id, key = %key, bytes = data.len(), "Extension data written");
        Ok(())
    }

    /// Deletes `key`. Returns `false` if it did not exist.
    pub async fn delete(&self, key: &str) -> AppResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every stored key, sorted.
    pub async fn list(&self) -> AppResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ExtensionStorage::new(tmp.path(), "daily", 1024).unwrap();

        assert_eq!(storage.read("settings").await.unwrap(), None);
        storage.write("settings", r#"{"format":"YYYY-MM-DD"}"#).await.unwrap();
        storage.write("cache.v2", "[]").await.unwrap();

        assert_eq!(
            storage.read("settings").await.unwrap().as_deref(),
            Some(r#"{"format":"YYYY-MM-DD"}"#)
        );
        assert_eq!(storage.list().await.unwrap(), vec!["cache.v2", "settings"]);
        assert!(tmp.path().join("daily").join("settings.json").is_file());

        assert!(storage.delete("settings").await.unwrap());
        assert!(!storage.delete("settings").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_bad_keys_and_large_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ExtensionStorage::new(tmp.path(), "daily", 4).unwrap();

        assert!(storage.read("../escape").await.is_err());
        assert!(storage.write(".hidden", "x").await.is_err());
        assert!(storage.write("big", "12345").await.is_err());
        assert!(ExtensionStorage::new(tmp.path(), "../x", 4).is_err());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ExtensionStorage::new(tmp.path(), "fresh", 16).unwrap();
        assert!(storage.list().await.unwrap().is_empty());
    }
}
