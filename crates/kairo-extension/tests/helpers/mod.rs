//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use kairo_core::config::extension::ExtensionConfig;
use kairo_extension::manager::vault_data_dir;
use kairo_extension::prelude::*;
use kairo_extension::{ExtensionManager, ExtensionRuntime, FilterPoint, StaticModuleLoader};

/// Registers one `greet` command.
pub struct Greeter;

#[async_trait]
impl ExtensionModule for Greeter {
    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
        let command = Command::new("Greet", action_fn(|_| async { Ok(()) }));
        api.register_command(None, ContributionSpec::new("greet", command)).await;
        Ok(())
    }
}

/// Appends `"Y"` to every note title.
pub struct TitleSuffix;

#[async_trait]
impl ExtensionModule for TitleSuffix {
    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
        api.register_filter(
            FilterPoint::NoteTitle,
            filter_fn(|value, _| async move {
                let title = value.as_str().unwrap_or_default();
                Ok(json!(format!("{title}Y")))
            }),
        )
        .await;
        Ok(())
    }
}

/// Registers one entry in every owner-scoped registry.
pub struct Everywhere;

#[async_trait]
impl ExtensionModule for Everywhere {
    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
        let noop = || action_fn(|_| async { Ok(()) });

        api.register_command(None, ContributionSpec::new("cmd", Command::new("Cmd", noop())))
            .await;
        api.register_hook(HookPoint::NoteSaved, hook_fn(|_| async { Ok(()) }))
            .await;
        api.register_filter(FilterPoint::NoteContent, filter_fn(|v, _| async move { Ok(v) }))
            .await;
        api.register_context_menu_item(
            ContextMenuSurface::NoteTree,
            ContributionSpec::new("ctx", MenuItem::new("Ctx", noop())),
        )
        .await;
        api.register_menu_item(MenuCategory::View, ContributionSpec::new("view", MenuItem::new("View", noop())))
            .await;
        api.register_slot_component(SlotPoint::Sidebar, ContributionSpec::new("panel", SlotComponent::new("Panel")))
            .await;
        api.add_styles(".everywhere {}").await;
        api.subscribe("notes", |_| Ok(())).await;
        Ok(())
    }
}

/// Test vault with an extension manager over a fresh runtime.
pub struct TestVault {
    /// Keeps the temporary vault alive
    pub dir: TempDir,
    pub runtime: Arc<ExtensionRuntime>,
    pub manager: ExtensionManager,
}

impl TestVault {
    /// Create a new empty vault
    pub fn new() -> Self {
        Self::with_config(ExtensionConfig::default())
    }

    pub fn with_config(config: ExtensionConfig) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp vault");
        let runtime = Arc::new(ExtensionRuntime::new(config).with_data_dir(vault_data_dir(dir.path())));
        let manager = ExtensionManager::for_vault(dir.path(), Arc::clone(&runtime), Arc::new(loader()));
        Self { dir, runtime, manager }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an extension folder into the vault's extensions directory.
    pub fn install(&self, folder: &str, id: &str, main: &str) -> PathBuf {
        write_extension(self.manager.extensions_dir(), folder, id, main)
    }
}

/// Loader resolving `greeter.js`, `suffix.js`, and `everywhere.js`.
pub fn loader() -> StaticModuleLoader {
    StaticModuleLoader::new()
        .with_module("greeter.js", || Ok(Arc::new(Greeter) as Arc<dyn ExtensionModule>))
        .with_module("suffix.js", || Ok(Arc::new(TitleSuffix) as Arc<dyn ExtensionModule>))
        .with_module("everywhere.js", || Ok(Arc::new(Everywhere) as Arc<dyn ExtensionModule>))
}

/// Writes a complete extension folder (manifest plus entry file).
pub fn write_extension(root: &Path, folder: &str, id: &str, main: &str) -> PathBuf {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).expect("Failed to create extension folder");
    let manifest = json!({
        "id": id,
        "name": format!("{id} extension"),
        "version": "1.0.0",
        "main": main,
    });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).expect("Failed to write manifest");
    std::fs::write(dir.join(main), "// entry").expect("Failed to write entry");
    dir
}

/// Writes an extension folder whose manifest is not valid JSON.
pub fn write_broken_extension(root: &Path, folder: &str) -> PathBuf {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).expect("Failed to create extension folder");
    std::fs::write(dir.join("manifest.json"), "{ not json").expect("Failed to write manifest");
    dir
}
