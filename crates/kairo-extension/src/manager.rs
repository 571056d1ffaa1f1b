//! Extension manager: discovery and lifecycle of folder-based extensions.
//!
//! An extension is a folder under the vault's extensions directory holding
//! a `manifest.json` and the entry module it names. The manager reads the
//! manifest, asks its [`ModuleLoader`] for the module, and runs the
//! module's `initialize` against an owner-bound [`HostApi`]. Every failure
//! along the way is caught and stored on the [`Extension`] record; it never
//! stops the remaining extensions from loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use kairo_core::{AppError, AppResult};

use crate::api::HostApi;
use crate::error::ExtensionError;
use crate::fs::copy_dir_all;
use crate::guard::guarded;
use crate::loader::{ExtensionModule, ModuleLoader};
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::runtime::ExtensionRuntime;
use crate::settings::ExtensionSettings;

/// Per-vault configuration directory.
pub const KAIRO_DIR: &str = ".kairo";
/// Extensions directory inside [`KAIRO_DIR`].
pub const EXTENSIONS_DIR: &str = "extensions";
/// Settings file inside [`KAIRO_DIR`].
pub const SETTINGS_FILE: &str = "extension-settings.json";
/// Extension data directory inside [`KAIRO_DIR`].
pub const DATA_DIR: &str = "plugins";

/// Returns `<vault>/.kairo/extensions`.
pub fn vault_extensions_dir(vault: &Path) -> PathBuf {
    vault.join(KAIRO_DIR).join(EXTENSIONS_DIR)
}

/// Returns `<vault>/.kairo/extension-settings.json`.
pub fn vault_settings_path(vault: &Path) -> PathBuf {
    vault.join(KAIRO_DIR).join(SETTINGS_FILE)
}

/// Returns `<vault>/.kairo/plugins`.
pub fn vault_data_dir(vault: &Path) -> PathBuf {
    vault.join(KAIRO_DIR).join(DATA_DIR)
}

/// State of one discovered extension.
///
/// `loaded == false` with no `error` means the extension is disabled and
/// was never executed. `loaded == false` with an `error` means discovery,
/// loading, or `initialize` failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extension {
    /// Manifest id, or the folder name when the manifest is unusable.
    pub id: String,
    pub manifest: Option<Manifest>,
    pub path: PathBuf,
    pub loaded: bool,
    pub enabled: bool,
    pub error: Option<String>,
}

/// Result of [`ExtensionManager::import_extension`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// The folder was copied and loaded.
    Imported(Extension),
    /// An extension with this id already exists and `overwrite` was not
    /// set. Nothing was changed.
    Collision {
        id: String,
        existing: Option<Manifest>,
    },
}

struct LoadedExtension {
    record: Extension,
    module: Option<Arc<dyn ExtensionModule>>,
}

/// Discovers and manages folder-based extensions.
pub struct ExtensionManager {
    runtime: Arc<ExtensionRuntime>,
    loader: Arc<dyn ModuleLoader>,
    extensions_dir: PathBuf,
    settings_path: PathBuf,
    /// Loaded from disk on first use and before every folder scan.
    settings: RwLock<Option<ExtensionSettings>>,
    /// Extension ID → record and live module.
    extensions: RwLock<BTreeMap<String, LoadedExtension>>,
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("extensions_dir", &self.extensions_dir)
            .field("settings_path", &self.settings_path)
            .finish_non_exhaustive()
    }
}

impl ExtensionManager {
    /// Creates a manager with explicit paths.
    pub fn new(
        runtime: Arc<ExtensionRuntime>,
        loader: Arc<dyn ModuleLoader>,
        extensions_dir: impl Into<PathBuf>,
        settings_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            loader,
            extensions_dir: extensions_dir.into(),
            settings_path: settings_path.into(),
            settings: RwLock::new(None),
            extensions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a manager using the standard layout of `vault`.
    pub fn for_vault(vault: &Path, runtime: Arc<ExtensionRuntime>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self::new(runtime, loader, vault_extensions_dir(vault), vault_settings_path(vault))
    }

    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    pub fn runtime(&self) -> &Arc<ExtensionRuntime> {
        &self.runtime
    }

    /// Creates the extensions directory if it does not exist.
    pub async fn ensure_extensions_directory(&self) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.extensions_dir).await.map_err(|e| {
            AppError::storage(format!(
                "Failed to create extensions directory '{}': {e}",
                self.extensions_dir.display()
            ))
        })?;
        Ok(self.extensions_dir.clone())
    }

    /// Discovers and loads every extension in the managed directory.
    pub async fn load_extensions(&self) -> AppResult<Vec<Extension>> {
        let dir = self.extensions_dir.clone();
        self.load_extensions_from_folder(&dir).await
    }

    /// Discovers and loads every extension folder in `dir`.
    ///
    /// Only subfolders containing a `manifest.json` are considered, in
    /// folder-name order. A missing `dir` yields no extensions.
    pub async fn load_extensions_from_folder(&self, dir: &Path) -> AppResult<Vec<Extension>> {
        let metadata = match tokio::fs::metadata(dir).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(AppError::validation(format!(
                "Extensions path '{}' is not a directory",
                dir.display()
            )));
        }

        *self.settings.write().await = Some(ExtensionSettings::load(&self.settings_path).await);

        let mut folders = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() && tokio::fs::try_exists(path.join(MANIFEST_FILE)).await? {
                folders.push(path);
            }
        }
        folders.sort();

        let mut records = Vec::with_capacity(folders.len());
        for folder in folders {
            records.push(self.load_extension(&folder).await);
        }

        let loaded = records.iter().filter(|r| r.loaded).count();
        info!(dir = %dir.display(), found = records.len(), loaded, "Extensions discovered");

        Ok(records)
    }

    /// Reads one extension folder and, if enabled, executes it.
    ///
    /// Always returns a record; failures are reported in its `error` field.
    pub async fn load_extension(&self, folder: &Path) -> Extension {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let manifest = match Manifest::read_from_dir(folder).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "Extension manifest rejected");
                let record = Extension {
                    enabled: self.is_enabled_setting(&folder_name).await,
                    id: folder_name,
                    manifest: None,
                    path: folder.to_path_buf(),
                    loaded: false,
                    error: Some(e.to_string()),
                };
                let mut extensions = self.extensions.write().await;
                extensions.entry(record.id.clone()).or_insert_with(|| LoadedExtension {
                    record: record.clone(),
                    module: None,
                });
                return record;
            }
        };

        let id = manifest.id.clone();
        {
            let extensions = self.extensions.read().await;
            if let Some(existing) = extensions.get(&id) {
                if existing.record.path == folder && existing.record.manifest.is_some() {
                    debug!(extension_id = %id, "Extension already known, skipping reload");
                    return existing.record.clone();
                }
            }
            // A record at the same path without a manifest is a previous
            // failed read and gets replaced below.
            if let Some(existing) = extensions.get(&id).filter(|e| e.record.path != folder) {
                warn!(
                    extension_id = %id,
                    existing = %existing.record.path.display(),
                    duplicate = %folder.display(),
                    "Duplicate extension id, ignoring folder"
                );
                return Extension {
                    id,
                    manifest: Some(manifest),
                    path: folder.to_path_buf(),
                    loaded: false,
                    enabled: false,
                    error: Some(format!(
                        "extension id already loaded from '{}'",
                        existing.record.path.display()
                    )),
                };
            }
        }

        let enabled = self.is_enabled_setting(&id).await;
        let record = Extension {
            id: id.clone(),
            manifest: Some(manifest),
            path: folder.to_path_buf(),
            loaded: false,
            enabled,
            error: None,
        };
        self.extensions.write().await.insert(
            id.clone(),
            LoadedExtension {
                record: record.clone(),
                module: None,
            },
        );

        if !enabled {
            info!(extension_id = %id, "Extension disabled, not executing");
            return record;
        }

        self.activate(&id).await.unwrap_or(record)
    }

    /// Runs cleanup, purges the owner, and forgets the extension.
    pub async fn unload_extension(&self, id: &str) -> AppResult<()> {
        self.require(id).await?;
        self.deactivate(id).await;
        self.extensions.write().await.remove(id);

        info!(extension_id = %id, "Extension unloaded");
        Ok(())
    }

    /// Persists `enabled = true` and executes the extension if it is not
    /// already loaded. The manifest is not re-read from disk.
    pub async fn enable_extension(&self, id: &str) -> AppResult<Extension> {
        let record = self.require(id).await?;
        if record.manifest.is_none() {
            return Err(AppError::validation(format!(
                "Extension '{id}' has no valid manifest and cannot be enabled"
            )));
        }

        self.persist_enabled(id, true).await?;
        self.update(id, |r| r.enabled = true).await;

        if record.loaded {
            return self.require(id).await;
        }

        match self.activate(id).await {
            Some(record) => Ok(record),
            None => self.require(id).await,
        }
    }

    /// Persists `enabled = false`, runs cleanup, and purges the owner. The
    /// record is kept so the extension can be enabled again.
    pub async fn disable_extension(&self, id: &str) -> AppResult<Extension> {
        self.require(id).await?;
        self.persist_enabled(id, false).await?;
        self.deactivate(id).await;
        self.update(id, |r| {
            r.enabled = false;
            r.error = None;
        })
        .await;

        info!(extension_id = %id, "Extension disabled");
        self.require(id).await
    }

    /// Copies the extension folder at `source` into the managed directory
    /// and loads it.
    ///
    /// If the id is already taken and `overwrite` is false, returns
    /// [`ImportOutcome::Collision`] without touching anything. With
    /// `overwrite`, the existing extension is unloaded and its files are
    /// replaced.
    pub async fn import_extension(&self, source: &Path, overwrite: bool) -> AppResult<ImportOutcome> {
        let manifest = Manifest::read_from_dir(source).await?;
        let id = manifest.id.clone();
        let target = self.extensions_dir.join(&id);

        let existing = self.get(&id).await;
        let target_exists = tokio::fs::try_exists(&target).await?;

        if (existing.is_some() || target_exists) && !overwrite {
            let existing_manifest = match existing {
                Some(record) => record.manifest,
                None => Manifest::read_from_dir(&target).await.ok(),
            };
            info!(extension_id = %id, "Import collides with an existing extension");
            return Ok(ImportOutcome::Collision {
                id,
                existing: existing_manifest,
            });
        }

        // Folders holding the extension being replaced: the id-named target
        // and, if it differs, the folder the loaded extension came from.
        let mut replaced = Vec::new();
        if target_exists {
            replaced.push(target.clone());
        }
        if let Some(record) = &existing {
            if record.path != target && tokio::fs::try_exists(&record.path).await? {
                replaced.push(record.path.clone());
            }
        }

        let mut doomed = Vec::with_capacity(replaced.len());
        for folder in &replaced {
            if same_path(source, folder).await {
                return Err(AppError::validation(format!(
                    "Cannot import extension '{id}' onto itself"
                )));
            }
            doomed.push(self.managed_folder(folder).await?);
        }

        if existing.is_some() {
            self.unload_extension(&id).await?;
        }
        for folder in &doomed {
            Self::delete_folder(folder).await?;
        }

        self.ensure_extensions_directory().await?;
        copy_dir_all(source, &target).await?;

        info!(extension_id = %id, source = %source.display(), "Extension imported");
        Ok(ImportOutcome::Imported(self.load_extension(&target).await))
    }

    /// Unloads the extension and deletes its folder. Irreversible.
    ///
    /// Only folders inside the managed extensions directory are deleted.
    pub async fn remove_extension(&self, id: &str) -> AppResult<()> {
        let record = self.require(id).await?;

        let path = self.managed_folder(&record.path).await?;

        self.unload_extension(id).await?;
        Self::delete_folder(&path).await?;

        self.update_settings(|settings| settings.remove(id)).await?;

        info!(extension_id = %id, "Extension removed");
        Ok(())
    }

    /// Returns every known extension, sorted by id.
    pub async fn list(&self) -> Vec<Extension> {
        let extensions = self.extensions.read().await;
        extensions.values().map(|e| e.record.clone()).collect()
    }

    pub async fn get(&self, id: &str) -> Option<Extension> {
        let extensions = self.extensions.read().await;
        extensions.get(id).map(|e| e.record.clone())
    }

    /// Unloads every extension. Used at shutdown.
    pub async fn unload_all(&self) {
        let ids: Vec<String> = self.extensions.read().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.unload_extension(&id).await {
                error!(extension_id = %id, error = %e, "Error unloading extension");
            }
        }
        info!("All extensions unloaded");
    }

    fn enabled_by_default(&self) -> bool {
        self.runtime.config().enabled_by_default
    }

    async fn require(&self, id: &str) -> AppResult<Extension> {
        self.get(id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Extension '{id}' not found")))
    }

    async fn update(&self, id: &str, f: impl FnOnce(&mut Extension)) {
        if let Some(entry) = self.extensions.write().await.get_mut(id) {
            f(&mut entry.record);
        }
    }

    async fn persist_enabled(&self, id: &str, enabled: bool) -> AppResult<()> {
        self.update_settings(|settings| {
            settings.set_enabled(id, enabled);
            true
        })
        .await
    }

    /// Applies `f` to the settings and saves them if it returns `true`.
    async fn update_settings(&self, f: impl FnOnce(&mut ExtensionSettings) -> bool) -> AppResult<()> {
        let mut guard = self.settings.write().await;
        if guard.is_none() {
            *guard = Some(ExtensionSettings::load(&self.settings_path).await);
        }
        let Some(settings) = guard.as_mut() else {
            return Ok(());
        };

        if f(settings) {
            settings.save(&self.settings_path).await?;
        }
        Ok(())
    }

    async fn is_enabled_setting(&self, id: &str) -> bool {
        let default = self.enabled_by_default();
        let mut guard = self.settings.write().await;
        if guard.is_none() {
            *guard = Some(ExtensionSettings::load(&self.settings_path).await);
        }
        guard.as_ref().map_or(default, |s| s.is_enabled(id, default))
    }

    fn host_api(&self, id: &str) -> HostApi {
        self.runtime.host_api(id)
    }

    /// Loads the module and runs `initialize`. On any failure the owner is
    /// purged and the error is stored on the record.
    async fn activate(&self, id: &str) -> Option<Extension> {
        let (manifest, path) = {
            let extensions = self.extensions.read().await;
            let record = &extensions.get(id)?.record;
            (record.manifest.clone()?, record.path.clone())
        };

        let timeout = self.runtime.config().callback_timeout();
        let entry = manifest.entry_path(&path);

        let loaded = guarded(timeout, async { Ok(self.loader.load(&manifest, &entry).await) }).await;
        let module = match loaded {
            Ok(Ok(module)) => module,
            Ok(Err(e)) => return self.fail(id, e).await,
            Err(failure) => return self.fail(id, ExtensionError::callback("load", failure)).await,
        };

        let api = self.host_api(id);
        if let Err(failure) = guarded(timeout, module.initialize(&api)).await {
            return self.fail(id, ExtensionError::callback("initialize", failure)).await;
        }

        let mut extensions = self.extensions.write().await;
        let slot = extensions.get_mut(id)?;
        slot.module = Some(module);
        slot.record.loaded = true;
        slot.record.error = None;

        info!(
            extension_id = %id,
            name = %manifest.name,
            version = %manifest.version,
            "Extension loaded"
        );
        Some(slot.record.clone())
    }

    async fn fail(&self, id: &str, err: ExtensionError) -> Option<Extension> {
        let message = err.to_string();
        error!(extension_id = %id, error = %message, "Extension failed to load");
        self.runtime.purge_owner(id).await;

        let mut extensions = self.extensions.write().await;
        let slot = extensions.get_mut(id)?;
        slot.module = None;
        slot.record.loaded = false;
        slot.record.error = Some(message);
        Some(slot.record.clone())
    }

    /// Runs `cleanup` and purges the owner if a module is live.
    ///
    /// Records without a live module own nothing: they were never executed,
    /// or their failed activation was already purged. Their id may be a
    /// folder name that coincides with another owner, so it is never purged.
    async fn deactivate(&self, id: &str) {
        let module = {
            let mut extensions = self.extensions.write().await;
            match extensions.get_mut(id) {
                Some(entry) => {
                    entry.record.loaded = false;
                    entry.module.take()
                }
                None => None,
            }
        };

        let Some(module) = module else {
            debug!(extension_id = %id, "No live module, nothing to purge");
            return;
        };

        let api = self.host_api(id);
        let timeout = self.runtime.config().callback_timeout();
        if let Err(failure) = guarded(timeout, module.cleanup(&api)).await {
            let err = ExtensionError::callback("cleanup", failure);
            warn!(extension_id = %id, error = %err, "Extension cleanup failed");
        }

        self.runtime.purge_owner(id).await;
    }

    /// Resolves `path` and checks it is a folder strictly inside the
    /// managed extensions directory.
    async fn managed_folder(&self, path: &Path) -> AppResult<PathBuf> {
        let root = tokio::fs::canonicalize(&self.extensions_dir).await?;
        let resolved = tokio::fs::canonicalize(path).await?;
        if !resolved.starts_with(&root) || resolved == root {
            return Err(AppError::validation(format!(
                "Refusing to delete '{}': outside the extensions directory",
                path.display()
            )));
        }
        Ok(resolved)
    }

    async fn delete_folder(path: &Path) -> AppResult<()> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to delete '{}': {e}", path.display())))
    }
}

async fn same_path(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
