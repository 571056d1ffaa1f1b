//! Filter bus: sequential value transformation across owners.
//!
//! A value passes through every filter registered for a point, highest
//! priority first. A filter that fails is skipped: the running value it
//! received is passed on unchanged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use super::definitions::FilterPoint;
use super::registry::{HandlerRegistry, RegistrationId};
use crate::guard::guarded;
use crate::handler::FilterHandler;
use crate::runtime::OwnerScoped;

/// Value transformation pipeline.
pub struct FilterBus {
    registry: HandlerRegistry<FilterPoint, dyn FilterHandler>,
    timeout: Duration,
    default_priority: i32,
}

impl FilterBus {
    /// Creates an empty filter bus.
    pub fn new(timeout: Duration, default_priority: i32) -> Self {
        Self {
            registry: HandlerRegistry::new("filter"),
            timeout,
            default_priority,
        }
    }

    /// Registers a filter for `filter` on behalf of `owner_id`.
    pub async fn register_filter(
        &self,
        filter: FilterPoint,
        handler: Arc<dyn FilterHandler>,
        owner_id: &str,
        priority: Option<i32>,
    ) -> RegistrationId {
        let priority = priority.unwrap_or(self.default_priority);
        self.registry.register(filter, handler, owner_id, priority).await
    }

    /// Removes one registration. Returns `false` if it was not present.
    pub async fn unregister_filter(&self, filter: &FilterPoint, id: RegistrationId) -> bool {
        self.registry.unregister(filter, id).await
    }

    /// Removes every filter registered by `owner_id`.
    pub async fn unregister_owner(&self, owner_id: &str) -> usize {
        self.registry.unregister_owner(owner_id).await
    }

    /// Passes `value` through every filter for `filter` and returns the
    /// result. With no filters registered the input comes back unchanged.
    pub async fn apply(&self, filter: FilterPoint, value: Value, args: Value) -> Value {
        let handlers = self.registry.snapshot(&filter).await;
        if handlers.is_empty() {
            return value;
        }

        debug!(filter = %filter, handler_count = handlers.len(), "Applying filter chain");

        let mut current = value;
        for entry in &handlers {
            match guarded(self.timeout, entry.handler.apply(current.clone(), &args)).await {
                Ok(next) => current = next,
                Err(failure) => {
                    error!(
                        filter = %filter,
                        owner = %entry.owner_id,
                        error = %failure,
                        "Filter failed, keeping previous value"
                    );
                }
            }
        }

        current
    }

    /// Returns the number of filters registered for `filter`.
    pub async fn filter_count(&self, filter: &FilterPoint) -> usize {
        self.registry.count(filter).await
    }

    /// Returns every filter point that currently has at least one filter.
    pub async fn registered_filters(&self) -> Vec<FilterPoint> {
        let mut filters = self.registry.keys().await;
        filters.sort();
        filters
    }
}

#[async_trait]
impl OwnerScoped for FilterBus {
    fn registry_name(&self) -> &'static str {
        "filters"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        FilterBus::unregister_owner(self, owner_id).await
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        self.registry.owned_count(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handler::filter_fn;

    fn append(suffix: &'static str) -> Arc<dyn FilterHandler> {
        filter_fn(move |value, _args| async move {
            let text = value.as_str().unwrap_or_default();
            Ok(Value::String(format!("{text}{suffix}")))
        })
    }

    fn bus() -> FilterBus {
        FilterBus::new(Duration::from_secs(5), 10)
    }

    #[tokio::test]
    async fn test_identity_without_filters() {
        let bus = bus();
        let out = bus
            .apply(FilterPoint::NoteContent, json!({"body": "x"}), Value::Null)
            .await;
        assert_eq!(out, json!({"body": "x"}));
    }

    #[tokio::test]
    async fn test_failing_filter_leaves_value_unchanged() {
        let bus = bus();
        bus.register_filter(
            FilterPoint::NoteContent,
            filter_fn(|_, _| async { Err::<Value, _>(anyhow::anyhow!("bad filter")) }),
            "broken",
            None,
        )
        .await;
        bus.register_filter(FilterPoint::NoteContent, append("Y"), "good", None)
            .await;

        let out = bus
            .apply(FilterPoint::NoteContent, json!("X"), Value::Null)
            .await;
        assert_eq!(out, json!("XY"));
    }

    #[tokio::test]
    async fn test_filters_chain_in_priority_order() {
        let bus = bus();
        bus.register_filter(FilterPoint::NoteTitle, append("-low"), "a", Some(1))
            .await;
        bus.register_filter(FilterPoint::NoteTitle, append("-high"), "b", Some(99))
            .await;

        let out = bus.apply(FilterPoint::NoteTitle, json!("t"), Value::Null).await;
        assert_eq!(out, json!("t-high-low"));
    }

    #[tokio::test]
    async fn test_filter_receives_args() {
        let bus = bus();
        bus.register_filter(
            FilterPoint::RenderedHtml,
            filter_fn(|value, args| async move {
                let class = args["class"].as_str().unwrap_or_default().to_string();
                Ok(json!(format!("<div class=\"{class}\">{}</div>", value.as_str().unwrap_or_default())))
            }),
            "wrapper",
            None,
        )
        .await;

        let out = bus
            .apply(FilterPoint::RenderedHtml, json!("hi"), json!({"class": "note"}))
            .await;
        assert_eq!(out, json!("<div class=\"note\">hi</div>"));
    }
}
