//! Boots the extension runtime for one vault.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use kairo_core::AppResult;
use kairo_core::config::AppConfig;
use kairo_extension::loader::ModuleLoader;
use kairo_extension::manager::vault_data_dir;
use kairo_extension::{ExtensionManager, ExtensionRuntime};

/// Runtime and extension manager for an open vault.
pub struct VaultHost {
    pub runtime: Arc<ExtensionRuntime>,
    pub manager: ExtensionManager,
}

impl VaultHost {
    /// Builds the runtime without loading any extension.
    pub fn open(vault: &Path, config: &AppConfig) -> Self {
        let runtime = Arc::new(
            ExtensionRuntime::new(config.extensions.clone()).with_data_dir(vault_data_dir(vault)),
        );
        let manager = ExtensionManager::for_vault(vault, Arc::clone(&runtime), module_loader());
        Self { runtime, manager }
    }

    /// Builds the runtime and loads every extension of the vault.
    pub async fn boot(vault: &Path, config: &AppConfig) -> AppResult<Self> {
        let host = Self::open(vault, config);
        let records = host.manager.load_extensions().await?;
        info!(
            vault = %vault.display(),
            found = records.len(),
            loaded = records.iter().filter(|r| r.loaded).count(),
            "Vault extensions booted"
        );
        Ok(host)
    }

    pub async fn shutdown(&self) {
        self.manager.unload_all().await;
    }
}

#[cfg(feature = "dynamic")]
fn module_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(kairo_extension::loader::NativeModuleLoader::new())
}

#[cfg(not(feature = "dynamic"))]
fn module_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(kairo_extension::StaticModuleLoader::new())
}
