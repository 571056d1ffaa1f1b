//! Filesystem helpers: identifier validation and recursive folder copies.

use std::path::{Component, Path, PathBuf};

use kairo_core::error::AppError;
use kairo_core::result::AppResult;

/// Validates an extension or plugin id so it can double as a folder name.
///
/// Only ASCII alphanumerics, `-`, and `_` are allowed, 1–64 characters.
/// `core` is reserved for first-party contributions.
pub fn validate_extension_id(id: &str) -> Result<(), String> {
    if id.is_empty() || id.len() > 64 {
        return Err("invalid id length (1-64 characters)".to_string());
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!(
            "invalid id '{id}': only alphanumeric, hyphens, and underscores allowed"
        ));
    }

    if id == crate::contribution::CORE_OWNER {
        return Err("the id 'core' is reserved".to_string());
    }

    Ok(())
}

/// Validates a data key used as a file stem in extension storage.
pub fn validate_data_key(key: &str) -> Result<(), String> {
    if key.is_empty() || key.len() > 128 {
        return Err("invalid key length (1-128 characters)".to_string());
    }

    if key.starts_with('.') {
        return Err("invalid key: cannot start with a dot".to_string());
    }

    if key.contains("..") {
        return Err("invalid key: path traversal detected".to_string());
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(format!(
            "invalid key '{key}': only alphanumeric, hyphens, underscores, and dots allowed"
        ));
    }

    Ok(())
}

/// Validates that a manifest `main` entry is a relative path inside the
/// extension folder.
pub fn validate_entry_path(main: &str) -> Result<(), String> {
    if main.trim().is_empty() {
        return Err("'main' must not be empty".to_string());
    }

    let path = Path::new(main);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(format!("'main' must stay inside the extension folder: {main}")),
        }
    }

    Ok(())
}

/// Recursively copies `source` into `target`, creating `target`.
///
/// Symlinks are skipped.
pub async fn copy_dir_all(source: &Path, target: &Path) -> AppResult<()> {
    let mut dirs_to_visit: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = dirs_to_visit.pop() {
        tokio::fs::create_dir_all(&to).await.map_err(|e| {
            AppError::storage(format!("Failed to create '{}': {e}", to.display()))
        })?;

        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let dest = to.join(entry.file_name());

            if file_type.is_dir() {
                dirs_to_visit.push((entry.path(), dest));
            } else if file_type.is_file() {
                tokio::fs::copy(entry.path(), &dest).await.map_err(|e| {
                    AppError::storage(format!(
                        "Failed to copy '{}': {e}",
                        entry.path().display()
                    ))
                })?;
            }
        }
    }

    Ok(())
}
