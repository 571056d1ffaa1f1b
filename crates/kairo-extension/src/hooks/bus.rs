//! Hook bus: ordered, best-effort broadcast of application events.
//!
//! Handlers run strictly one after another in priority order (highest
//! first); each is awaited before the next starts. A handler that fails,
//! panics, or exceeds the callback timeout is logged with its owner and the
//! hook name, and delivery continues with the next handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use super::definitions::{HookEvent, HookPoint};
use super::registry::{HandlerRegistry, RegistrationId};
use crate::guard::guarded;
use crate::handler::HookHandler;
use crate::runtime::OwnerScoped;

/// Outcome of one `trigger` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReport {
    /// Handlers that completed successfully.
    pub completed: usize,
    /// Handlers that failed, panicked, or timed out.
    pub failed: usize,
}

/// Event dispatch bus.
pub struct HookBus {
    registry: HandlerRegistry<HookPoint, dyn HookHandler>,
    /// Upper bound for a single handler.
    timeout: Duration,
    /// Priority used when the caller does not pass one.
    default_priority: i32,
}

impl HookBus {
    /// Creates an empty hook bus.
    pub fn new(timeout: Duration, default_priority: i32) -> Self {
        Self {
            registry: HandlerRegistry::new("hook"),
            timeout,
            default_priority,
        }
    }

    /// Registers a handler for `hook` on behalf of `owner_id`.
    pub async fn register_hook(
        &self,
        hook: HookPoint,
        handler: Arc<dyn HookHandler>,
        owner_id: &str,
        priority: Option<i32>,
    ) -> RegistrationId {
        let priority = priority.unwrap_or(self.default_priority);
        self.registry.register(hook, handler, owner_id, priority).await
    }

    /// Removes one registration. Returns `false` if it was not present.
    pub async fn unregister_hook(&self, hook: &HookPoint, id: RegistrationId) -> bool {
        self.registry.unregister(hook, id).await
    }

    /// Removes every handler registered by `owner_id`.
    pub async fn unregister_owner(&self, owner_id: &str) -> usize {
        self.registry.unregister_owner(owner_id).await
    }

    /// Fires `hook` and waits until every handler has settled.
    ///
    /// Never fails: handler errors are logged and counted in the report.
    pub async fn trigger(&self, hook: HookPoint, args: Value) -> TriggerReport {
        let handlers = self.registry.snapshot(&hook).await;
        let mut report = TriggerReport::default();

        if handlers.is_empty() {
            return report;
        }

        debug!(hook = %hook, handler_count = handlers.len(), "Triggering hook");

        let event = HookEvent::new(hook, args);
        for entry in &handlers {
            match guarded(self.timeout, entry.handler.handle(&event)).await {
                Ok(()) => report.completed += 1,
                Err(failure) => {
                    error!(
                        hook = %event.hook,
                        owner = %entry.owner_id,
                        error = %failure,
                        "Hook handler failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Returns the number of handlers registered for `hook`.
    pub async fn handler_count(&self, hook: &HookPoint) -> usize {
        self.registry.count(hook).await
    }

    /// Returns every hook that currently has at least one handler.
    pub async fn registered_hooks(&self) -> Vec<HookPoint> {
        let mut hooks = self.registry.keys().await;
        hooks.sort();
        hooks
    }
}

#[async_trait]
impl OwnerScoped for HookBus {
    fn registry_name(&self) -> &'static str {
        "hooks"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        HookBus::unregister_owner(self, owner_id).await
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        self.registry.owned_count(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::hook_fn;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Arc<dyn HookHandler> {
        let log = Arc::clone(log);
        hook_fn(move |_event| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(label.to_string());
                Ok(())
            }
        })
    }

    fn bus() -> HookBus {
        HookBus::new(Duration::from_secs(5), 10)
    }

    #[tokio::test]
    async fn test_higher_priority_runs_first() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register_hook(HookPoint::NoteSaved, recorder(&log, "low"), "b", Some(10))
            .await;
        bus.register_hook(HookPoint::NoteSaved, recorder(&log, "high"), "a", Some(20))
            .await;

        bus.trigger(HookPoint::NoteSaved, Value::Null).await;
        assert_eq!(*log.lock().unwrap(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_registration_order() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            bus.register_hook(HookPoint::AppReady, recorder(&log, label), "a", None)
                .await;
        }

        bus.trigger(HookPoint::AppReady, Value::Null).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register_hook(
            HookPoint::NoteOpened,
            hook_fn(|_| async { Err::<(), _>(anyhow::anyhow!("broken extension")) }),
            "bad",
            Some(20),
        )
        .await;
        bus.register_hook(HookPoint::NoteOpened, recorder(&log, "ok"), "good", Some(10))
            .await;

        let report = bus.trigger(HookPoint::NoteOpened, Value::Null).await;
        assert_eq!(report, TriggerReport { completed: 1, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_unregister_by_registration_id() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = bus
            .register_hook(HookPoint::NoteSaved, recorder(&log, "gone"), "a", None)
            .await;
        assert!(bus.unregister_hook(&HookPoint::NoteSaved, id).await);
        assert!(!bus.unregister_hook(&HookPoint::NoteSaved, id).await);

        let report = bus.trigger(HookPoint::NoteSaved, Value::Null).await;
        assert_eq!(report.completed, 0);
        assert!(bus.registered_hooks().await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_receives_args() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        bus.register_hook(
            HookPoint::NoteCreated,
            hook_fn(move |event| {
                let sink = Arc::clone(&sink);
                async move {
                    *sink.lock().unwrap() = event.get_string("path").map(str::to_string);
                    Ok(())
                }
            }),
            "a",
            None,
        )
        .await;

        bus.trigger(HookPoint::NoteCreated, serde_json::json!({"path": "inbox/todo.md"}))
            .await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("inbox/todo.md"));
    }
}
