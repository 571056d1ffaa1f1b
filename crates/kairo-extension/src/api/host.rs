//! The capability object handed to contributors.

use std::sync::Arc;

use serde_json::Value;

use kairo_core::{AppError, AppResult};

use super::logger::ExtensionLogger;
use super::state::{StateCallback, SubscriptionId};
use super::storage::ExtensionStorage;
use crate::contribution::{
    Command, ContextMenuSurface, ContributionSpec, MenuCategory, MenuItem, SlotComponent, SlotPoint,
};
use crate::handler::{FilterHandler, HookHandler};
use crate::hooks::{FilterPoint, HookPoint, RegistrationId};
use crate::runtime::ExtensionRuntime;

/// Registration surface pre-bound to one owner id.
///
/// Everything registered through a `HostApi` is tagged with its owner, so
/// a later [`ExtensionRuntime::purge_owner`] removes it again.
#[derive(Clone)]
pub struct HostApi {
    runtime: Arc<ExtensionRuntime>,
    owner_id: String,
    log: ExtensionLogger,
}

impl std::fmt::Debug for HostApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostApi")
            .field("owner_id", &self.owner_id)
            .finish_non_exhaustive()
    }
}

impl HostApi {
    pub(crate) fn new(runtime: Arc<ExtensionRuntime>, owner_id: &str) -> Self {
        Self {
            runtime,
            owner_id: owner_id.to_string(),
            log: ExtensionLogger::new(owner_id),
        }
    }

    /// The owner every registration is tagged with.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Direct access to the runtime, for host-side callers.
    pub fn runtime(&self) -> &Arc<ExtensionRuntime> {
        &self.runtime
    }

    // ── Commands ──

    /// Registers a palette command. `category` defaults to `"general"`.
    pub async fn register_command(&self, category: Option<&str>, spec: ContributionSpec<Command>) -> String {
        self.runtime
            .commands()
            .register(category, spec, &self.owner_id)
            .await
    }

    // ── Hooks and filters ──

    pub async fn register_hook(&self, hook: HookPoint, handler: Arc<dyn HookHandler>) -> RegistrationId {
        self.runtime
            .hooks()
            .register_hook(hook, handler, &self.owner_id, None)
            .await
    }

    pub async fn register_hook_with_priority(
        &self,
        hook: HookPoint,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) -> RegistrationId {
        self.runtime
            .hooks()
            .register_hook(hook, handler, &self.owner_id, Some(priority))
            .await
    }

    pub async fn unregister_hook(&self, hook: &HookPoint, id: RegistrationId) -> bool {
        self.runtime.hooks().unregister_hook(hook, id).await
    }

    pub async fn register_filter(&self, filter: FilterPoint, handler: Arc<dyn FilterHandler>) -> RegistrationId {
        self.runtime
            .filters()
            .register_filter(filter, handler, &self.owner_id, None)
            .await
    }

    pub async fn register_filter_with_priority(
        &self,
        filter: FilterPoint,
        handler: Arc<dyn FilterHandler>,
        priority: i32,
    ) -> RegistrationId {
        self.runtime
            .filters()
            .register_filter(filter, handler, &self.owner_id, Some(priority))
            .await
    }

    pub async fn unregister_filter(&self, filter: &FilterPoint, id: RegistrationId) -> bool {
        self.runtime.filters().unregister_filter(filter, id).await
    }

    // ── Menus and slots ──

    pub async fn register_context_menu_item(
        &self,
        surface: ContextMenuSurface,
        spec: ContributionSpec<MenuItem>,
    ) -> String {
        self.runtime
            .context_menus()
            .register(surface, spec, &self.owner_id)
            .await
    }

    pub async fn register_menu_item(&self, category: MenuCategory, spec: ContributionSpec<MenuItem>) -> String {
        self.runtime
            .menu_bar()
            .register_item(category, spec, &self.owner_id)
            .await
    }

    /// Registers a top-level menu category and returns its qualified key.
    pub async fn register_menu_category(&self, id: &str, label: &str, priority: i32) -> MenuCategory {
        self.runtime
            .menu_bar()
            .register_category(id, label, priority, &self.owner_id)
            .await
    }

    /// Registers an item under a category this owner registered.
    pub async fn register_custom_menu_item(&self, category_id: &str, spec: ContributionSpec<MenuItem>) -> String {
        self.runtime
            .menu_bar()
            .register_custom_item(category_id, spec, &self.owner_id)
            .await
    }

    pub async fn register_slot_component(&self, slot: SlotPoint, spec: ContributionSpec<SlotComponent>) -> String {
        self.runtime
            .slots()
            .register(slot, spec, &self.owner_id)
            .await
    }

    // ── Styles ──

    pub async fn add_styles(&self, css: &str) {
        self.runtime.styles().add(&self.owner_id, css).await;
    }

    pub async fn remove_styles(&self) -> bool {
        self.runtime.styles().remove(&self.owner_id).await
    }

    // ── Host services ──

    /// Owner-tagged logger.
    pub fn log(&self) -> &ExtensionLogger {
        &self.log
    }

    /// Read-only snapshot of host application state.
    pub async fn get_state(&self) -> Value {
        self.runtime.state().snapshot().await
    }

    /// Subscribes to changes of one host state store.
    pub async fn subscribe<F>(&self, store: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: StateCallback = Arc::new(callback);
        self.runtime
            .state()
            .subscribe(&self.owner_id, store, callback)
            .await
    }

    /// Key/value data storage scoped to this owner.
    pub fn storage(&self) -> AppResult<ExtensionStorage> {
        let dir = self
            .runtime
            .data_dir()
            .ok_or_else(|| AppError::configuration("No data directory configured for extension storage"))?;
        ExtensionStorage::new(dir, &self.owner_id, self.runtime.config().max_data_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handler::{action_fn, filter_fn, hook_fn};

    #[tokio::test]
    async fn test_registrations_are_owner_bound() {
        let runtime = Arc::new(ExtensionRuntime::default());
        let api = runtime.host_api("word-count");

        let id = api
            .register_command(
                None,
                ContributionSpec::new("count", Command::new("Count words", action_fn(|_| async { Ok(()) }))),
            )
            .await;
        assert_eq!(id, "word-count.count");

        api.register_hook(HookPoint::NoteSaved, hook_fn(|_| async { Ok(()) })).await;
        api.register_filter(FilterPoint::NoteTitle, filter_fn(|v, _| async move { Ok(v) }))
            .await;
        api.add_styles(".wc { opacity: .5 }").await;
        api.subscribe("editor", |_| Ok(())).await;

        assert_eq!(runtime.owned_count("word-count").await, 5);
        assert_eq!(runtime.purge_owner("word-count").await.total(), 5);
    }

    #[tokio::test]
    async fn test_get_state_reads_host_snapshot() {
        let runtime = Arc::new(ExtensionRuntime::default());
        runtime.state().publish("vault", json!({"name": "notes"})).await;

        let api = runtime.host_api("reader");
        assert_eq!(api.get_state().await["vault"]["name"], "notes");
    }

    #[tokio::test]
    async fn test_storage_requires_data_dir() {
        let runtime = Arc::new(ExtensionRuntime::default());
        assert!(runtime.host_api("ext").storage().is_err());

        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(ExtensionRuntime::default().with_data_dir(tmp.path()));
        let storage = runtime.host_api("ext").storage().unwrap();
        storage.write("k", "1").await.unwrap();
        assert_eq!(storage.read("k").await.unwrap().as_deref(), Some("1"));
    }
}
