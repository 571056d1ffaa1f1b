//! Plugin registry: lifecycle of compiled-in ("built-in") contributors.
//!
//! State machine per plugin:
//!
//! ```text
//! registered ──enable──▶ enabled (initialize ran)
//!     ▲                     │
//!     └──────disable────────┘ (cleanup ran, owner purged)
//! any ──unregister──▶ gone (cleanup ran if enabled, owner purged)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use kairo_core::{AppError, AppResult};

use crate::api::HostApi;
use crate::error::ExtensionError;
use crate::fs::validate_extension_id;
use crate::guard::guarded;
use crate::manifest::Manifest;
use crate::runtime::ExtensionRuntime;

/// Trait implemented by compiled-in plugins.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns the plugin manifest. The id is the plugin's owner id.
    fn manifest(&self) -> Manifest;

    /// Registers contributions. Runs on every enable.
    async fn initialize(&self, _api: &HostApi) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases resources held outside the registries. Runs on disable
    /// and unregister, before the owner is purged.
    async fn cleanup(&self, _api: &HostApi) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Metadata about a registered plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub manifest: Manifest,
    pub enabled: bool,
    /// Last `initialize` failure, cleared by a successful enable.
    pub error: Option<String>,
}

/// Registry of compiled-in plugins.
pub struct PluginRegistry {
    runtime: Arc<ExtensionRuntime>,
    /// Plugin ID → plugin instance.
    plugins: RwLock<BTreeMap<String, Arc<dyn Plugin>>>,
    /// Plugin ID → metadata.
    metadata: RwLock<BTreeMap<String, PluginInfo>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}

impl PluginRegistry {
    pub fn new(runtime: Arc<ExtensionRuntime>) -> Self {
        Self {
            runtime,
            plugins: RwLock::new(BTreeMap::new()),
            metadata: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores a plugin and, if `enabled`, initializes it.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>, enabled: bool) -> AppResult<()> {
        let manifest = plugin.manifest();
        let id = manifest.id.clone();
        validate_extension_id(&id).map_err(AppError::validation)?;

        {
            let mut plugins = self.plugins.write().await;
            let mut metadata = self.metadata.write().await;

            if plugins.contains_key(&id) {
                return Err(AppError::conflict(format!("Plugin '{id}' is already registered")));
            }

            info!(plugin_id = %id, name = %manifest.name, version = %manifest.version, "Registering plugin");

            plugins.insert(id.clone(), Arc::clone(&plugin));
            metadata.insert(
                id.clone(),
                PluginInfo {
                    manifest,
                    enabled,
                    error: None,
                },
            );
        }

        if enabled {
            self.initialize(&id, plugin).await;
        }

        Ok(())
    }

    /// Marks a plugin enabled and re-runs its `initialize`.
    pub async fn enable_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let plugin = self.require(plugin_id).await?;
        self.set_enabled(plugin_id, true).await;
        self.initialize(plugin_id, plugin).await;
        Ok(())
    }

    /// Runs `cleanup`, purges everything the plugin registered, then marks
    /// it disabled. The purge runs even if `cleanup` fails.
    pub async fn disable_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let plugin = self.require(plugin_id).await?;
        self.cleanup(plugin_id, plugin).await;
        self.runtime.purge_owner(plugin_id).await;
        self.set_enabled(plugin_id, false).await;

        info!(plugin_id = %plugin_id, "Plugin disabled");
        Ok(())
    }

    /// Disables the plugin if needed and forgets it.
    pub async fn unregister_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let plugin = self.require(plugin_id).await?;
        if self.is_enabled(plugin_id).await {
            self.cleanup(plugin_id, plugin).await;
        }
        self.runtime.purge_owner(plugin_id).await;

        self.plugins.write().await.remove(plugin_id);
        self.metadata.write().await.remove(plugin_id);

        info!(plugin_id = %plugin_id, "Plugin unregistered");
        Ok(())
    }

    /// Lists all registered plugins, sorted by id.
    pub async fn list(&self) -> Vec<PluginInfo> {
        let metadata = self.metadata.read().await;
        metadata.values().cloned().collect()
    }

    pub async fn get(&self, plugin_id: &str) -> Option<PluginInfo> {
        let metadata = self.metadata.read().await;
        metadata.get(plugin_id).cloned()
    }

    pub async fn is_enabled(&self, plugin_id: &str) -> bool {
        let metadata = self.metadata.read().await;
        metadata
            .get(plugin_id)
            .map(|info| info.enabled)
            .unwrap_or(false)
    }

    pub async fn count(&self) -> usize {
        self.plugins.read().await.len()
    }

    async fn require(&self, plugin_id: &str) -> AppResult<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().await;
        plugins
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Plugin '{plugin_id}' not found")))
    }

    async fn set_enabled(&self, plugin_id: &str, enabled: bool) {
        if let Some(info) = self.metadata.write().await.get_mut(plugin_id) {
            info.enabled = enabled;
        }
    }

    async fn set_error(&self, plugin_id: &str, error: Option<String>) {
        if let Some(info) = self.metadata.write().await.get_mut(plugin_id) {
            info.error = error;
        }
    }

    async fn initialize(&self, plugin_id: &str, plugin: Arc<dyn Plugin>) {
        let api = self.runtime.host_api(plugin_id);
        let timeout = self.runtime.config().callback_timeout();

        match guarded(timeout, plugin.initialize(&api)).await {
            Ok(()) => {
                self.set_error(plugin_id, None).await;
                info!(plugin_id = %plugin_id, "Plugin initialized");
            }
            Err(failure) => {
                let err = ExtensionError::callback("initialize", failure);
                error!(plugin_id = %plugin_id, error = %err, "Plugin initialize failed");
                self.runtime.purge_owner(plugin_id).await;
                self.set_error(plugin_id, Some(err.to_string())).await;
            }
        }
    }

    async fn cleanup(&self, plugin_id: &str, plugin: Arc<dyn Plugin>) {
        let api = self.runtime.host_api(plugin_id);
        let timeout = self.runtime.config().callback_timeout();

        if let Err(failure) = guarded(timeout, plugin.cleanup(&api)).await {
            let err = ExtensionError::callback("cleanup", failure);
            warn!(plugin_id = %plugin_id, error = %err, "Plugin cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::contribution::{Command, ContributionSpec};
    use crate::handler::action_fn;

    struct Counter {
        inits: AtomicUsize,
        cleanups: AtomicUsize,
        fail_cleanup: bool,
    }

    impl Counter {
        fn new(fail_cleanup: bool) -> Arc<Self> {
            Arc::new(Self {
                inits: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
                fail_cleanup,
            })
        }
    }

    #[async_trait]
    impl Plugin for Counter {
        fn manifest(&self) -> Manifest {
            crate::manifest!(id: "counter", name: "Counter", version: "1.0.0")
        }

        async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            api.register_command(
                None,
                ContributionSpec::new("count", Command::new("Count", action_fn(|_| async { Ok(()) }))),
            )
            .await;
            Ok(())
        }

        async fn cleanup(&self, _api: &HostApi) -> anyhow::Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            if self.fail_cleanup {
                anyhow::bail!("cleanup exploded");
            }
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        fn manifest(&self) -> Manifest {
            crate::manifest!(id: "broken", name: "Broken", version: "0.1.0")
        }

        async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
            api.add_styles(".half-done {}").await;
            anyhow::bail!("initialize failed midway")
        }
    }

    fn registry() -> (Arc<ExtensionRuntime>, PluginRegistry) {
        let runtime = Arc::new(ExtensionRuntime::default());
        (Arc::clone(&runtime), PluginRegistry::new(runtime))
    }

    #[tokio::test]
    async fn test_register_enabled_initializes() {
        let (runtime, reg) = registry();
        let plugin = Counter::new(false);
        reg.register_plugin(plugin.clone(), true).await.unwrap();

        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
        assert!(reg.is_enabled("counter").await);
        assert_eq!(runtime.owned_count("counter").await, 1);
    }

    #[tokio::test]
    async fn test_register_disabled_does_not_initialize() {
        let (runtime, reg) = registry();
        let plugin = Counter::new(false);
        reg.register_plugin(plugin.clone(), false).await.unwrap();

        assert_eq!(plugin.inits.load(Ordering::SeqCst), 0);
        assert!(!reg.is_enabled("counter").await);
        assert_eq!(runtime.owned_count("counter").await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (_, reg) = registry();
        reg.register_plugin(Counter::new(false), false).await.unwrap();
        let err = reg.register_plugin(Counter::new(false), false).await.unwrap_err();
        assert!(err.is(kairo_core::error::ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn test_disable_purges_even_if_cleanup_fails() {
        let (runtime, reg) = registry();
        let plugin = Counter::new(true);
        reg.register_plugin(plugin.clone(), true).await.unwrap();

        reg.disable_plugin("counter").await.unwrap();
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 1);
        assert!(!reg.is_enabled("counter").await);
        assert_eq!(runtime.owned_count("counter").await, 0);
    }

    #[tokio::test]
    async fn test_unregister_removes_record() {
        let (runtime, reg) = registry();
        reg.register_plugin(Counter::new(false), true).await.unwrap();

        reg.unregister_plugin("counter").await.unwrap();
        assert!(reg.get("counter").await.is_none());
        assert_eq!(runtime.owned_count("counter").await, 0);
        assert!(reg.unregister_plugin("counter").await.is_err());
    }

    #[tokio::test]
    async fn test_failed_initialize_is_recorded_and_purged() {
        let (runtime, reg) = registry();
        reg.register_plugin(Arc::new(Broken), true).await.unwrap();

        let info = reg.get("broken").await.unwrap();
        assert!(info.error.unwrap().contains("initialize failed midway"));
        assert_eq!(runtime.owned_count("broken").await, 0);
        assert!(runtime.get_commands(&Value::Null).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_not_found() {
        let (_, reg) = registry();
        let err = reg.enable_plugin("ghost").await.unwrap_err();
        assert!(err.is(kairo_core::error::ErrorKind::NotFound));
    }
}
