//! Host application state exposed read-only to contributors.
//!
//! The host publishes named stores (`"vault"`, `"editor"`, ...) as JSON
//! values. Contributors read a snapshot through `HostApi::get_state` and
//! may subscribe to changes of one store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::guard::guarded_sync;
use crate::runtime::OwnerScoped;

/// Callback invoked with the new value of a store.
pub type StateCallback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    id: SubscriptionId,
    store: String,
    owner_id: String,
    callback: StateCallback,
}

/// Named JSON stores plus their subscribers.
#[derive(Default)]
pub struct StateStore {
    stores: RwLock<BTreeMap<String, Value>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value of `store` and notifies its subscribers.
    ///
    /// Returns the number of subscribers that accepted the update.
    pub async fn publish(&self, store: &str, value: Value) -> usize {
        self.stores.write().await.insert(store.to_string(), value.clone());

        let callbacks: Vec<(String, StateCallback)> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.store == store)
            .map(|s| (s.owner_id.clone(), Arc::clone(&s.callback)))
            .collect();

        let mut delivered = 0;
        for (owner_id, callback) in callbacks {
            match guarded_sync(|| callback(&value)) {
                Ok(()) => delivered += 1,
                Err(failure) => {
                    warn!(store = %store, owner = %owner_id, error = %failure, "State subscriber failed");
                }
            }
        }

        delivered
    }

    /// Returns every store as one JSON object.
    pub async fn snapshot(&self) -> Value {
        let stores = self.stores.read().await;
        Value::Object(stores.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Returns the current value of one store.
    pub async fn get(&self, store: &str) -> Option<Value> {
        self.stores.read().await.get(store).cloned()
    }

    /// Subscribes `owner_id` to changes of `store`.
    pub async fn subscribe(&self, owner_id: &str, store: &str, callback: StateCallback) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions.write().await.push(Subscription {
            id,
            store: store.to_string(),
            owner_id: owner_id.to_string(),
            callback,
        });

        debug!(store = %store, owner = %owner_id, subscription = %id, "State subscription added");
        id
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }
}

#[async_trait]
impl OwnerScoped for StateStore {
    fn registry_name(&self) -> &'static str {
        "subscriptions"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.owner_id != owner_id);
        before - subscriptions.len()
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_snapshot_contains_published_stores() {
        let state = StateStore::new();
        state.publish("vault", json!({"name": "notes"})).await;
        state.publish("editor", json!({"path": "a.md"})).await;

        assert_eq!(
            state.snapshot().await,
            json!({"editor": {"path": "a.md"}, "vault": {"name": "notes"}})
        );
        assert_eq!(state.get("vault").await, Some(json!({"name": "notes"})));
        assert_eq!(state.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_subscribers_are_isolated_and_purged() {
        let state = StateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        state
            .subscribe(
                "good",
                "editor",
                Arc::new(move |value: &Value| {
                    sink.lock().unwrap().push(value.clone());
                    Ok(())
                }),
            )
            .await;
        state
            .subscribe("bad", "editor", Arc::new(|_: &Value| anyhow::bail!("nope")))
            .await;

        assert_eq!(state.publish("editor", json!(1)).await, 1);
        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);

        assert_eq!(state.unregister_owner("good").await, 1);
        assert_eq!(state.publish("editor", json!(2)).await, 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_by_id() {
        let state = StateStore::new();
        let id = state.subscribe("a", "vault", Arc::new(|_: &Value| Ok(()))).await;
        assert!(state.unsubscribe(id).await);
        assert!(!state.unsubscribe(id).await);
    }
}
