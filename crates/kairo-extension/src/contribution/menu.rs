//! Context-menu and menu-bar registries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use kairo_core::{AppError, AppResult};

use super::{
    CORE_OWNER, Contribution, ContributionPoint, ContributionRegistry, ContributionSpec, qualify_id,
};
use crate::contribution::command::CommandOutcome;
use crate::guard::guarded;
use crate::handler::ActionHandler;
use crate::macros::named_points;
use crate::runtime::OwnerScoped;

named_points! {
    /// Surfaces that show a context menu.
    pub enum ContextMenuSurface {
        /// File tree in the sidebar.
        NoteTree => "note-tree",
        /// Editor body.
        Editor => "editor",
        /// Editor tab strip.
        Tab => "tab",
        /// One row of the search result list.
        SearchResult => "search-result",
    }
}

named_points! {
    /// Top-level menu-bar categories.
    pub enum MenuCategory {
        File => "file",
        Edit => "edit",
        View => "view",
        Insert => "insert",
        Format => "format",
        Tools => "tools",
        Help => "help",
    }
}

impl MenuCategory {
    fn builtin_label(&self) -> &str {
        match self {
            Self::File => "File",
            Self::Edit => "Edit",
            Self::View => "View",
            Self::Insert => "Insert",
            Self::Format => "Format",
            Self::Tools => "Tools",
            Self::Help => "Help",
            Self::Custom(name) => name.as_str(),
        }
    }
}

/// A clickable menu entry.
#[derive(Clone)]
pub struct MenuItem {
    pub label: String,
    pub icon: Option<String>,
    pub shortcut: Option<String>,
    pub action: Arc<dyn ActionHandler>,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, action: Arc<dyn ActionHandler>) -> Self {
        Self {
            label: label.into(),
            icon: None,
            shortcut: None,
            action,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem")
            .field("label", &self.label)
            .field("icon", &self.icon)
            .field("shortcut", &self.shortcut)
            .finish_non_exhaustive()
    }
}

/// Context-menu items keyed by surface.
pub type ContextMenuRegistry = ContributionRegistry<ContextMenuSurface, MenuItem>;

impl<P: ContributionPoint> ContributionRegistry<P, MenuItem> {
    /// Runs the action of the item `effective_id` at `point`.
    pub async fn invoke(
        &self,
        point: &P,
        effective_id: &str,
        context: &Value,
        timeout: Duration,
    ) -> AppResult<CommandOutcome> {
        let entry = self
            .entries(point)
            .await
            .into_iter()
            .find(|e| e.id == effective_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Menu item '{effective_id}' not found at '{point}'"))
            })?;

        if !entry.is_visible(context) {
            return Ok(CommandOutcome::Unavailable);
        }

        match guarded(timeout, entry.payload.action.run(context)).await {
            Ok(()) => Ok(CommandOutcome::Executed),
            Err(failure) => {
                error!(
                    point = %point,
                    item = %entry.id,
                    owner = %entry.owner_id,
                    error = %failure,
                    "Menu action failed"
                );
                Ok(CommandOutcome::Failed(failure.to_string()))
            }
        }
    }
}

/// A menu-bar category as shown to the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct MenuCategoryInfo {
    pub id: MenuCategory,
    pub label: String,
    pub priority: i32,
    pub owner_id: String,
}

/// Menu-bar items plus the category list they hang off.
pub struct MenuBarRegistry {
    items: ContributionRegistry<MenuCategory, MenuItem>,
    /// Categories registered by contributors, highest priority first.
    custom_categories: RwLock<Vec<MenuCategoryInfo>>,
}

impl MenuBarRegistry {
    pub fn new(default_priority: i32) -> Self {
        Self {
            items: ContributionRegistry::new("menu-bar", default_priority),
            custom_categories: RwLock::new(Vec::new()),
        }
    }

    /// Registers an item under a category.
    pub async fn register_item(
        &self,
        category: MenuCategory,
        spec: ContributionSpec<MenuItem>,
        owner_id: &str,
    ) -> String {
        self.items.register(category, spec, owner_id).await
    }

    /// Registers a new top-level category owned by `owner_id`.
    ///
    /// The id is qualified like any other contribution. Re-registering the
    /// same id replaces the label and priority.
    pub async fn register_category(
        &self,
        id: &str,
        label: impl Into<String>,
        priority: i32,
        owner_id: &str,
    ) -> MenuCategory {
        let category = MenuCategory::Custom(qualify_id(owner_id, id));
        let info = MenuCategoryInfo {
            id: category.clone(),
            label: label.into(),
            priority,
            owner_id: owner_id.to_string(),
        };

        let mut categories = self.custom_categories.write().await;
        if let Some(pos) = categories.iter().position(|c| c.id == category) {
            warn!(category = %category, "Menu category registered twice, replacing");
            categories.remove(pos);
        }
        super::insert_by_priority(&mut categories, info, |c| c.priority);

        debug!(category = %category, owner = %owner_id, "Menu category registered");
        category
    }

    /// Registers an item under a category that `owner_id` registered.
    pub async fn register_custom_item(
        &self,
        category_id: &str,
        spec: ContributionSpec<MenuItem>,
        owner_id: &str,
    ) -> String {
        let category = MenuCategory::Custom(qualify_id(owner_id, category_id));
        self.items.register(category, spec, owner_id).await
    }

    pub async fn unregister_item(&self, category: &MenuCategory, effective_id: &str) -> bool {
        self.items.unregister(category, effective_id).await
    }

    /// Returns the visible items under `category`.
    pub async fn get_menu_items(&self, category: &MenuCategory, context: &Value) -> Vec<Contribution<MenuItem>> {
        self.items.query(category, context).await
    }

    /// Built-in categories in menu order, followed by contributed ones.
    pub async fn get_menu_categories(&self) -> Vec<MenuCategoryInfo> {
        let mut out: Vec<MenuCategoryInfo> = MenuCategory::known()
            .into_iter()
            .map(|id| MenuCategoryInfo {
                label: id.builtin_label().to_string(),
                id,
                priority: 0,
                owner_id: CORE_OWNER.to_string(),
            })
            .collect();
        out.extend(self.custom_categories.read().await.iter().cloned());
        out
    }

    pub async fn invoke(
        &self,
        category: &MenuCategory,
        effective_id: &str,
        context: &Value,
        timeout: Duration,
    ) -> AppResult<CommandOutcome> {
        self.items.invoke(category, effective_id, context, timeout).await
    }

    pub async fn unregister_owner(&self, owner_id: &str) -> usize {
        let items = self.items.unregister_owner(owner_id).await;

        let mut categories = self.custom_categories.write().await;
        let before = categories.len();
        categories.retain(|c| c.owner_id != owner_id);

        items + (before - categories.len())
    }

    pub async fn owned_count(&self, owner_id: &str) -> usize {
        let categories = self
            .custom_categories
            .read()
            .await
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .count();
        self.items.owned_count(owner_id).await + categories
    }
}

#[async_trait]
impl OwnerScoped for MenuBarRegistry {
    fn registry_name(&self) -> &'static str {
        "menu-bar"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        MenuBarRegistry::unregister_owner(self, owner_id).await
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        MenuBarRegistry::owned_count(self, owner_id).await
    }
}
