//! Handler registry shared by the hook and filter buses.
//!
//! Handlers are stored per point in descending priority order; handlers
//! with equal priority keep their registration order.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::contribution::insert_by_priority;

/// Handle returned when a hook or filter is registered.
///
/// Pass it back to `unregister_hook`/`unregister_filter` to remove exactly
/// that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One registered handler.
pub(crate) struct HandlerEntry<H: ?Sized> {
    pub id: RegistrationId,
    pub handler: Arc<H>,
    pub priority: i32,
    pub owner_id: String,
}

impl<H: ?Sized> Clone for HandlerEntry<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
            priority: self.priority,
            owner_id: self.owner_id.clone(),
        }
    }
}

/// Point → prioritized handler list.
pub(crate) struct HandlerRegistry<K, H: ?Sized> {
    /// Registry name used in log lines (`"hook"`, `"filter"`).
    kind: &'static str,
    entries: RwLock<HashMap<K, Vec<HandlerEntry<H>>>>,
}

impl<K, H> HandlerRegistry<K, H>
where
    K: Clone + Eq + Hash + Display,
    H: ?Sized + Send + Sync,
{
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(
        &self,
        key: K,
        handler: Arc<H>,
        owner_id: &str,
        priority: i32,
    ) -> RegistrationId {
        let id = RegistrationId::new();

        let mut entries = self.entries.write().await;
        let list = entries.entry(key.clone()).or_default();
        insert_by_priority(
            list,
            HandlerEntry {
                id,
                handler,
                priority,
                owner_id: owner_id.to_string(),
            },
            |e| e.priority,
        );

        info!(
            kind = self.kind,
            point = %key,
            owner = %owner_id,
            priority = priority,
            "Handler registered"
        );

        id
    }

    pub async fn unregister(&self, key: &K, id: RegistrationId) -> bool {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get_mut(key) else {
            return false;
        };

        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;

        if list.is_empty() {
            entries.remove(key);
        }

        if removed {
            debug!(kind = self.kind, point = %key, registration = %id, "Handler unregistered");
        }

        removed
    }

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
            info!(kind = self.kind, owner = %owner_id, removed, "Handlers unregistered for owner");
        }

        removed
    }

    /// Returns the handlers for `key` in dispatch order.
    ///
    /// The lock is released before the caller invokes anything, so handlers
    /// may register or unregister while a dispatch is in flight.
    pub async fn snapshot(&self, key: &K) -> Vec<HandlerEntry<H>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned().unwrap_or_default()
    }

    pub async fn count(&self, key: &K) -> usize {
        let entries = self.entries.read().await;
        entries.get(key).map(Vec::len).unwrap_or(0)
    }

    pub async fn keys(&self) -> Vec<K> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    pub async fn owned_count(&self, owner_id: &str) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .flat_map(|list| list.iter())
            .filter(|e| e.owner_id == owner_id)
            .count()
    }
}
