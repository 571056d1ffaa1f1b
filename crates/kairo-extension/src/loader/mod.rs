//! Module-loading seam.
//!
//! The [`ExtensionManager`](crate::manager::ExtensionManager) never executes
//! extension code directly. It asks a [`ModuleLoader`] to turn a manifest
//! and an entry path into an [`ExtensionModule`], then drives that module's
//! lifecycle through the Host API.

pub mod native;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::api::HostApi;
use crate::error::ExtensionError;
use crate::guard::guarded_sync;
use crate::manifest::Manifest;

pub use native::NativeModuleLoader;

/// The code of one extension.
#[async_trait]
pub trait ExtensionModule: Send + Sync {
    /// Registers the extension's contributions through `api`.
    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()>;

    /// Releases resources the extension holds outside the registries.
    async fn cleanup(&self, _api: &HostApi) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Loads the entry module of an extension.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Loads the module for `manifest`, whose entry file is `entry`.
    async fn load(&self, manifest: &Manifest, entry: &Path) -> Result<Arc<dyn ExtensionModule>, ExtensionError>;
}

/// Factory producing a fresh module instance.
pub type ModuleFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn ExtensionModule>> + Send + Sync>;

/// Resolves entry modules from factories compiled into the host.
///
/// Factories are keyed by the manifest's `main` value. The entry file must
/// still exist on disk, so an extension folder is only loadable when it
/// is complete.
#[derive(Default)]
pub struct StaticModuleLoader {
    factories: HashMap<String, ModuleFactory>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for entry `main`.
    pub fn register<F>(&mut self, main: &str, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn ExtensionModule>> + Send + Sync + 'static,
    {
        self.factories.insert(main.to_string(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_module<F>(mut self, main: &str, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn ExtensionModule>> + Send + Sync + 'static,
    {
        self.register(main, factory);
        self
    }

    /// Returns the registered entry names, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut entries: Vec<_> = self.factories.keys().cloned().collect();
        entries.sort();
        entries
    }
}

impl std::fmt::Debug for StaticModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticModuleLoader")
            .field("entries", &self.entries())
            .finish()
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, manifest: &Manifest, entry: &Path) -> Result<Arc<dyn ExtensionModule>, ExtensionError> {
        let is_file = tokio::fs::metadata(entry)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ExtensionError::load(
                &manifest.id,
                format!("entry module '{}' not found", entry.display()),
            ));
        }

        let factory = self.factories.get(&manifest.main).ok_or_else(|| {
            ExtensionError::load(
                &manifest.id,
                format!("no module registered for entry '{}'", manifest.main),
            )
        })?;

        let module = guarded_sync(|| factory())
            .map_err(|failure| ExtensionError::load(&manifest.id, failure.to_string()))?;

        debug!(extension_id = %manifest.id, entry = %manifest.main, "Static module resolved");
        Ok(module)
    }
}
