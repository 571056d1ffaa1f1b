//! Persisted per-vault extension settings.
//!
//! Stored as `{ "<id>": { "enabled": bool } }`. A missing or unreadable
//! file yields empty settings so that a corrupt file never prevents the
//! host from starting.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use kairo_core::AppResult;

/// Settings for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSetting {
    pub enabled: bool,
}

/// All extension settings of a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionSettings {
    entries: BTreeMap<String, ExtensionSetting>,
}

impl ExtensionSettings {
    /// Reads settings from `path`.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read extension settings, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Corrupt extension settings, using defaults");
            Self::default()
        })
    }

    /// Writes settings to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Returns the persisted state, or `default` when none is stored.
    pub fn is_enabled(&self, id: &str, default: bool) -> bool {
        self.entries.get(id).map(|s| s.enabled).unwrap_or(default)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        self.entries.insert(id.to_string(), ExtensionSetting { enabled });
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<ExtensionSetting> {
        self.entries.get(id).copied()
    }
}
