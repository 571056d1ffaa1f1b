//! Generic contribution registry.
//!
//! One [`ContributionRegistry`] holds, for every contribution point, a list
//! of owner-tagged entries in descending priority order. It is instantiated
//! for commands, context-menu items, menu-bar items, and UI slots.
//!
//! Effective ids are `"<owner>.<id>"`, except for [`CORE_OWNER`], whose ids
//! are stored bare. Duplicate effective ids are accepted and coexist; a
//! warning is logged when one is registered.

pub mod command;
pub mod menu;
pub mod slot;

use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::guard::guarded_sync;
use crate::runtime::OwnerScoped;

pub use command::{Command, CommandOutcome, CommandRegistry};
pub use menu::{ContextMenuRegistry, ContextMenuSurface, MenuBarRegistry, MenuCategory, MenuItem};
pub use slot::{SlotComponent, SlotPoint, SlotRegistry};

/// Owner id of first-party contributions shipped with the host.
pub const CORE_OWNER: &str = "core";

/// Gating function evaluated against the query context.
///
/// An error or a panic counts as `false` for that entry only.
pub type Predicate = Arc<dyn Fn(&Value) -> anyhow::Result<bool> + Send + Sync>;

/// Returns the id stored for `id` registered by `owner_id`.
pub fn qualify_id(owner_id: &str, id: &str) -> String {
    if owner_id == CORE_OWNER {
        id.to_string()
    } else {
        format!("{owner_id}.{id}")
    }
}

/// Inserts `entry` after every element whose priority is greater than or
/// equal to its own, keeping the list sorted descending and stable.
pub(crate) fn insert_by_priority<E>(list: &mut Vec<E>, entry: E, priority: impl Fn(&E) -> i32) {
    let p = priority(&entry);
    let at = list.partition_point(|e| priority(e) >= p);
    list.insert(at, entry);
}

/// Marker for types usable as contribution point keys.
pub trait ContributionPoint: Clone + Ord + Display + Debug + Send + Sync + 'static {}

impl<T> ContributionPoint for T where T: Clone + Ord + Display + Debug + Send + Sync + 'static {}

/// Registration request for one contribution.
pub struct ContributionSpec<T> {
    /// Id as given by the contributor, before owner qualification.
    pub id: String,
    /// Ordering priority. `None` uses the registry default.
    pub priority: Option<i32>,
    /// The contributed payload.
    pub payload: T,
    /// Optional gating predicate.
    pub when: Option<Predicate>,
    /// Whether a divider is rendered before this entry.
    pub divider_before: bool,
}

impl<T> ContributionSpec<T> {
    /// Creates a spec with default priority and no predicate.
    pub fn new(id: impl Into<String>, payload: T) -> Self {
        Self {
            id: id.into(),
            priority: None,
            payload,
            when: None,
            divider_before: false,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the gating predicate.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(predicate));
        self
    }

    /// Requests a divider before this entry.
    pub fn with_divider_before(mut self) -> Self {
        self.divider_before = true;
        self
    }
}

/// A stored contribution.
#[derive(Clone)]
pub struct Contribution<T> {
    /// Effective (owner-qualified) id.
    pub id: String,
    /// Owner that registered the entry.
    pub owner_id: String,
    /// Ordering priority, higher first.
    pub priority: i32,
    /// The contributed payload.
    pub payload: T,
    /// Optional gating predicate.
    pub when: Option<Predicate>,
    /// Whether a divider is rendered before this entry.
    pub divider_before: bool,
}

impl<T> Contribution<T> {
    /// Evaluates the predicate against `context`. Entries without one are
    /// always visible. A failing predicate is logged and treated as `false`.
    pub fn is_visible(&self, context: &Value) -> bool {
        let Some(predicate) = &self.when else {
            return true;
        };

        match guarded_sync(|| predicate(context)) {
            Ok(visible) => visible,
            Err(failure) => {
                warn!(
                    contribution = %self.id,
                    owner = %self.owner_id,
                    error = %failure,
                    "Contribution predicate failed, hiding entry"
                );
                false
            }
        }
    }
}

impl<T: Debug> Debug for Contribution<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contribution")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("priority", &self.priority)
            .field("payload", &self.payload)
            .field("has_predicate", &self.when.is_some())
            .field("divider_before", &self.divider_before)
            .finish()
    }
}

/// Keyed collection of prioritized, owner-tagged contributions.
pub struct ContributionRegistry<P, T> {
    /// Name used in logs and purge reports.
    name: &'static str,
    /// Priority used when a spec does not set one.
    default_priority: i32,
    /// Point → entries, highest priority first.
    entries: RwLock<BTreeMap<P, Vec<Contribution<T>>>>,
}

impl<P, T> ContributionRegistry<P, T>
where
    P: ContributionPoint,
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new(name: &'static str, default_priority: i32) -> Self {
        Self {
            name,
            default_priority,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a contribution and returns its effective id.
    pub async fn register(&self, point: P, spec: ContributionSpec<T>, owner_id: &str) -> String {
        let id = qualify_id(owner_id, &spec.id);
        let priority = spec.priority.unwrap_or(self.default_priority);

        let mut entries = self.entries.write().await;
        let list = entries.entry(point.clone()).or_default();

        if list.iter().any(|e| e.id == id) {
            warn!(
                registry = self.name,
                point = %point,
                id = %id,
                "Duplicate contribution id registered, both entries are kept"
            );
        }

        insert_by_priority(
            list,
            Contribution {
                id: id.clone(),
                owner_id: owner_id.to_string(),
                priority,
                payload: spec.payload,
                when: spec.when,
                divider_before: spec.divider_before,
            },
            |e| e.priority,
        );

        debug!(registry = self.name, point = %point, id = %id, priority, "Contribution registered");

        id
    }

    /// Removes the first entry at `point` with the given effective id.
    pub async fn unregister(&self, point: &P, effective_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get_mut(point) else {
            return false;
        };

        let Some(index) = list.iter().position(|e| e.id == effective_id) else {
            return false;
        };
        list.remove(index);

        if list.is_empty() {
            entries.remove(point);
        }

        true
    }

    /// Removes every entry registered by `owner_id`, across all points.
    pub async fn unregister_owner(&self, owner_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let mut removed = 0;

        for list in entries.values_mut() {
            let before = list.len();
            list.retain(|e| e.owner_id != owner_id);
            removed += before - list.len();
        }

        entries.retain(|_, list| !list.is_empty());

        if removed > 0 {
            info!(registry = self.name, owner = %owner_id, removed, "Contributions removed for owner");
        }

        removed
    }

    /// Returns the entries at `point` whose predicate accepts `context`.
    pub async fn query(&self, point: &P, context: &Value) -> Vec<Contribution<T>> {
        self.entries(point)
            .await
            .into_iter()
            .filter(|e| e.is_visible(context))
            .collect()
    }

    /// Returns every entry at `point`, ignoring predicates.
    pub async fn entries(&self, point: &P) -> Vec<Contribution<T>> {
        let entries = self.entries.read().await;
        entries.get(point).cloned().unwrap_or_default()
    }

    /// Returns every entry across all points, grouped by point order.
    pub async fn all(&self) -> Vec<(P, Contribution<T>)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .flat_map(|(point, list)| list.iter().map(move |e| (point.clone(), e.clone())))
            .collect()
    }

    /// Finds an entry by effective id at any point.
    pub async fn find(&self, effective_id: &str) -> Option<(P, Contribution<T>)> {
        let entries = self.entries.read().await;
        entries.iter().find_map(|(point, list)| {
            list.iter()
                .find(|e| e.id == effective_id)
                .map(|e| (point.clone(), e.clone()))
        })
    }

    /// Returns every point that currently has entries.
    pub async fn points(&self) -> Vec<P> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    /// Returns the number of entries registered by `owner_id`.
    pub async fn owned_count(&self, owner_id: &str) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .flat_map(|list| list.iter())
            .filter(|e| e.owner_id == owner_id)
            .count()
    }
}

#[async_trait]
impl<P, T> OwnerScoped for ContributionRegistry<P, T>
where
    P: ContributionPoint,
    T: Clone + Send + Sync + 'static,
{
    fn registry_name(&self) -> &'static str {
        self.name
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        ContributionRegistry::unregister_owner(self, owner_id).await
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        ContributionRegistry::owned_count(self, owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn registry() -> ContributionRegistry<String, &'static str> {
        ContributionRegistry::new("test", 50)
    }

    #[test]
    fn test_qualify_id() {
        assert_eq!(qualify_id("core", "open"), "open");
        assert_eq!(qualify_id("word-count", "open"), "word-count.open");
    }

    #[test]
    fn test_insert_by_priority_is_stable_descending() {
        let mut list = Vec::new();
        for (label, priority) in [("a", 10), ("b", 20), ("c", 10), ("d", 30), ("e", 20)] {
            insert_by_priority(&mut list, (label, priority), |e| e.1);
        }
        let labels: Vec<_> = list.iter().map(|e| e.0).collect();
        assert_eq!(labels, vec!["d", "b", "e", "a", "c"]);
    }

    #[tokio::test]
    async fn test_register_qualifies_and_orders() {
        let reg = registry();
        let point = "sidebar".to_string();

        let low = reg
            .register(point.clone(), ContributionSpec::new("low", "L").with_priority(1), "ext")
            .await;
        let core = reg
            .register(point.clone(), ContributionSpec::new("mid", "M"), CORE_OWNER)
            .await;

        assert_eq!(low, "ext.low");
        assert_eq!(core, "mid");

        let ids: Vec<_> = reg.entries(&point).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["mid", "ext.low"]);
    }

    #[tokio::test]
    async fn test_duplicates_coexist() {
        let reg = registry();
        let point = "p".to_string();
        reg.register(point.clone(), ContributionSpec::new("x", "1"), "ext").await;
        reg.register(point.clone(), ContributionSpec::new("x", "2"), "ext").await;
        assert_eq!(reg.entries(&point).await.len(), 2);

        assert!(reg.unregister(&point, "ext.x").await);
        assert_eq!(reg.entries(&point).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_missing_is_noop() {
        let reg = registry();
        assert!(!reg.unregister(&"nowhere".to_string(), "ghost").await);
    }

    #[tokio::test]
    async fn test_unregister_owner_is_complete_and_idempotent() {
        let reg = registry();
        for point in ["a", "b", "c"] {
            reg.register(point.to_string(), ContributionSpec::new("item", "x"), "ext")
                .await;
            reg.register(point.to_string(), ContributionSpec::new("item", "y"), "other")
                .await;
        }

        assert_eq!(reg.unregister_owner("ext").await, 3);
        assert_eq!(reg.owned_count("ext").await, 0);
        assert_eq!(reg.owned_count("other").await, 3);
        assert_eq!(reg.unregister_owner("ext").await, 0);
    }

    #[tokio::test]
    async fn test_query_applies_predicates_fail_closed() {
        let reg = registry();
        let point = "editor".to_string();

        reg.register(point.clone(), ContributionSpec::new("always", "a"), "ext").await;
        reg.register(
            point.clone(),
            ContributionSpec::new("md-only", "b")
                .when(|ctx| Ok(ctx["ext"].as_str() == Some("md"))),
            "ext",
        )
        .await;
        reg.register(
            point.clone(),
            ContributionSpec::new("broken", "c").when(|_| anyhow::bail!("bad predicate")),
            "ext",
        )
        .await;
        reg.register(
            point.clone(),
            ContributionSpec::new("panicky", "d").when(|_| panic!("predicate panic")),
            "ext",
        )
        .await;

        let ids = |entries: Vec<Contribution<&'static str>>| {
            entries.into_iter().map(|e| e.id).collect::<Vec<_>>()
        };

        assert_eq!(
            ids(reg.query(&point, &json!({"ext": "md"})).await),
            vec!["ext.always", "ext.md-only"]
        );
        assert_eq!(
            ids(reg.query(&point, &json!({"ext": "png"})).await),
            vec!["ext.always"]
        );
    }
}
