//! The explicit runtime context owning every registry.
//!
//! One [`ExtensionRuntime`] is built at startup and shared behind an `Arc`.
//! Tests build their own instance, so no state leaks between them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use kairo_core::AppResult;
use kairo_core::config::extension::ExtensionConfig;

use crate::api::{HostApi, StateStore, StyleRegistry};
use crate::contribution::{
    Command, CommandOutcome, CommandRegistry, Contribution, ContextMenuRegistry, ContextMenuSurface,
    MenuBarRegistry, MenuCategory, MenuItem, SlotComponent, SlotPoint, SlotRegistry,
};
use crate::hooks::{FilterBus, HookBus};

/// A registry whose entries are tagged with an owner id.
///
/// Every registry reachable from [`ExtensionRuntime`] implements this, and
/// [`ExtensionRuntime::purge_owner`] walks all of them.
#[async_trait]
pub trait OwnerScoped: Send + Sync {
    /// Name used in logs and [`PurgeReport`].
    fn registry_name(&self) -> &'static str;

    /// Removes every entry owned by `owner_id`. Idempotent.
    async fn unregister_owner(&self, owner_id: &str) -> usize;

    /// Returns the number of entries owned by `owner_id`.
    async fn owned_count(&self, owner_id: &str) -> usize;
}

/// Entries removed by one cascade purge, per registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub owner_id: String,
    pub removed: BTreeMap<&'static str, usize>,
}

impl PurgeReport {
    /// Total number of entries removed.
    pub fn total(&self) -> usize {
        self.removed.values().sum()
    }
}

/// Runtime context shared by the host, the plugin registry, and the
/// extension manager.
pub struct ExtensionRuntime {
    config: ExtensionConfig,
    commands: CommandRegistry,
    context_menus: ContextMenuRegistry,
    menu_bar: MenuBarRegistry,
    slots: SlotRegistry,
    hooks: HookBus,
    filters: FilterBus,
    styles: StyleRegistry,
    state: StateStore,
    /// Root of per-extension data storage (`<vault>/.kairo/plugins`).
    data_dir: Option<PathBuf>,
}

impl ExtensionRuntime {
    /// Creates a runtime with empty registries.
    pub fn new(config: ExtensionConfig) -> Self {
        let timeout = config.callback_timeout();
        let priority = config.default_priority;
        let hook_priority = config.default_hook_priority;

        Self {
            commands: CommandRegistry::new(timeout, priority),
            context_menus: ContextMenuRegistry::new("context-menu", priority),
            menu_bar: MenuBarRegistry::new(priority),
            slots: SlotRegistry::new("slots", priority),
            hooks: HookBus::new(timeout, hook_priority),
            filters: FilterBus::new(timeout, hook_priority),
            styles: StyleRegistry::new(),
            state: StateStore::new(),
            data_dir: None,
            config,
        }
    }

    /// Enables [`ExtensionStorage`](crate::api::ExtensionStorage) rooted at `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn context_menus(&self) -> &ContextMenuRegistry {
        &self.context_menus
    }

    pub fn menu_bar(&self) -> &MenuBarRegistry {
        &self.menu_bar
    }

    pub fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn filters(&self) -> &FilterBus {
        &self.filters
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Builds the capability object handed to contributor `owner_id`.
    pub fn host_api(self: &Arc<Self>, owner_id: &str) -> HostApi {
        HostApi::new(Arc::clone(self), owner_id)
    }

    fn scoped(&self) -> [&dyn OwnerScoped; 8] {
        [
            &self.hooks,
            &self.filters,
            &self.commands,
            &self.context_menus,
            &self.menu_bar,
            &self.slots,
            &self.styles,
            &self.state,
        ]
    }

    /// Removes everything `owner_id` registered, in every registry.
    pub async fn purge_owner(&self, owner_id: &str) -> PurgeReport {
        let mut report = PurgeReport {
            owner_id: owner_id.to_string(),
            ..PurgeReport::default()
        };

        for registry in self.scoped() {
            let removed = registry.unregister_owner(owner_id).await;
            report.removed.insert(registry.registry_name(), removed);
        }

        info!(owner = %owner_id, removed = report.total(), "Owner purged from all registries");
        report
    }

    /// Returns how many entries `owner_id` still holds across all registries.
    pub async fn owned_count(&self, owner_id: &str) -> usize {
        let mut total = 0;
        for registry in self.scoped() {
            total += registry.owned_count(owner_id).await;
        }
        total
    }

    // ── Rendering-side queries ──

    pub async fn get_commands(&self, context: &Value) -> Vec<Contribution<Command>> {
        self.commands.get_commands(context).await
    }

    pub async fn search_commands(&self, query: &str, context: &Value) -> Vec<Contribution<Command>> {
        self.commands.search_commands(query, context).await
    }

    pub async fn execute_command(&self, id: &str, context: &Value) -> AppResult<CommandOutcome> {
        self.commands.execute_command(id, context).await
    }

    pub async fn get_context_menu_items(
        &self,
        surface: &ContextMenuSurface,
        context: &Value,
    ) -> Vec<Contribution<MenuItem>> {
        self.context_menus.query(surface, context).await
    }

    pub async fn get_menu_items(&self, category: &MenuCategory, context: &Value) -> Vec<Contribution<MenuItem>> {
        self.menu_bar.get_menu_items(category, context).await
    }

    pub async fn invoke_context_menu_item(
        &self,
        surface: &ContextMenuSurface,
        id: &str,
        context: &Value,
    ) -> AppResult<CommandOutcome> {
        self.context_menus
            .invoke(surface, id, context, self.config.callback_timeout())
            .await
    }

    pub async fn invoke_menu_item(
        &self,
        category: &MenuCategory,
        id: &str,
        context: &Value,
    ) -> AppResult<CommandOutcome> {
        self.menu_bar
            .invoke(category, id, context, self.config.callback_timeout())
            .await
    }

    pub async fn get_slot_components(&self, slot: &SlotPoint, context: &Value) -> Vec<Contribution<SlotComponent>> {
        self.slots.query(slot, context).await
    }
}

impl Default for ExtensionRuntime {
    fn default() -> Self {
        Self::new(ExtensionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::ContributionSpec;
    use crate::handler::{action_fn, hook_fn};
    use crate::hooks::HookPoint;

    #[tokio::test]
    async fn test_purge_report_counts_per_registry() {
        let runtime = ExtensionRuntime::default();

        runtime
            .hooks()
            .register_hook(HookPoint::AppReady, hook_fn(|_| async { Ok(()) }), "ext", None)
            .await;
        runtime
            .commands()
            .register(
                None,
                ContributionSpec::new("go", Command::new("Go", action_fn(|_| async { Ok(()) }))),
                "ext",
            )
            .await;
        runtime
            .slots()
            .register(SlotPoint::Sidebar, ContributionSpec::new("panel", SlotComponent::new("Panel")), "ext")
            .await;

        assert_eq!(runtime.owned_count("ext").await, 3);

        let report = runtime.purge_owner("ext").await;
        assert_eq!(report.total(), 3);
        assert_eq!(report.removed["hooks"], 1);
        assert_eq!(report.removed["commands"], 1);
        assert_eq!(report.removed["slots"], 1);
        assert_eq!(report.removed["filters"], 0);

        assert_eq!(runtime.owned_count("ext").await, 0);
        assert_eq!(runtime.purge_owner("ext").await.total(), 0);
    }

    #[tokio::test]
    async fn test_purge_leaves_other_owners() {
        let runtime = ExtensionRuntime::default();
        runtime.styles().add("a", ".a {}").await;
        runtime.styles().add("b", ".b {}").await;

        runtime.purge_owner("a").await;
        assert_eq!(runtime.owned_count("b").await, 1);
        assert_eq!(runtime.styles().stylesheet().await, ".b {}");
    }

    #[tokio::test]
    async fn test_slot_components_respect_predicates() {
        let runtime = ExtensionRuntime::default();
        runtime
            .slots()
            .register(
                SlotPoint::Sidebar,
                ContributionSpec::new("hidden", SlotComponent::new("Hidden")).when(|_| Ok(false)),
                "ext",
            )
            .await;
        runtime
            .slots()
            .register(
                SlotPoint::Sidebar,
                ContributionSpec::new("outline", SlotComponent::new("Outline"))
                    .when(|ctx| Ok(ctx["view"] == "note")),
                "ext",
            )
            .await;

        assert!(runtime.get_slot_components(&SlotPoint::Sidebar, &Value::Null).await.is_empty());

        let visible = runtime
            .get_slot_components(&SlotPoint::Sidebar, &serde_json::json!({"view": "note"}))
            .await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "ext.outline");
    }
}
