//! Contributor manifests.
//!
//! A manifest identifies a contributor on both the built-in and the
//! file-based path. File-based extensions carry it as `manifest.json` next
//! to their entry module.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExtensionError;
use crate::fs::{validate_entry_path, validate_extension_id};

/// File name of an extension manifest inside its folder.
pub const MANIFEST_FILE: &str = "manifest.json";

/// `main` value used by compiled-in plugins that have no entry file.
pub const BUILTIN_ENTRY: &str = "<builtin>";

const REQUIRED_FIELDS: [&str; 4] = ["id", "name", "version", "main"];

/// Static descriptor of a contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique, stable id. Used as owner id for every contribution.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Entry module path, relative to the extension folder.
    pub main: String,
}

impl Manifest {
    /// Creates a manifest for a compiled-in plugin.
    pub fn builtin(id: &str, name: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: None,
            author: None,
            main: BUILTIN_ENTRY.to_string(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Parses and validates manifest JSON.
    ///
    /// Required string fields are checked before deserialization so that the
    /// error names the missing field instead of a serde position.
    pub fn parse(json: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("malformed JSON: {e}"))?;

        let object = value
            .as_object()
            .ok_or_else(|| "manifest must be a JSON object".to_string())?;

        for field in REQUIRED_FIELDS {
            match object.get(field) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {}
                Some(serde_json::Value::String(_)) => {
                    return Err(format!("required field '{field}' is empty"));
                }
                Some(_) => return Err(format!("required field '{field}' must be a string")),
                None => return Err(format!("missing required field '{field}'")),
            }
        }

        let manifest: Manifest =
            serde_json::from_value(value).map_err(|e| format!("invalid manifest: {e}"))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates the id and the entry path.
    pub fn validate(&self) -> Result<(), String> {
        validate_extension_id(&self.id)?;
        validate_entry_path(&self.main)
    }

    /// Reads `manifest.json` from an extension folder.
    pub async fn read_from_dir(dir: &Path) -> Result<Self, ExtensionError> {
        let path = dir.join(MANIFEST_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ExtensionError::manifest(&path, format!("cannot read: {e}")))?;

        Self::parse(&content).map_err(|reason| ExtensionError::manifest(&path, reason))
    }

    /// Returns the entry module path inside `dir`.
    pub fn entry_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.main)
    }
}
