//! Callback traits implemented by contributors, plus closure adapters.
//!
//! Contributors either implement the traits directly or wrap an async
//! closure with [`hook_fn`], [`filter_fn`], or [`action_fn`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::hooks::definitions::HookEvent;

/// Receives events broadcast by the [`HookBus`](crate::hooks::HookBus).
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles one event. Errors are logged by the bus and never abort
    /// delivery to other handlers.
    async fn handle(&self, event: &HookEvent) -> anyhow::Result<()>;
}

/// Transforms values passed through the [`FilterBus`](crate::hooks::FilterBus).
#[async_trait]
pub trait FilterHandler: Send + Sync {
    /// Returns the transformed value. On error the bus keeps the input.
    async fn apply(&self, value: Value, args: &Value) -> anyhow::Result<Value>;
}

/// Action run by a command or a menu item.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action with the caller-supplied context.
    async fn run(&self, context: &Value) -> anyhow::Result<()>;
}

/// Adapts an async closure to [`HookHandler`].
pub struct ClosureHook<F>(F);

#[async_trait]
impl<F, Fut> HookHandler for ClosureHook<F>
where
    F: Fn(HookEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: &HookEvent) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

/// Adapts an async closure to [`FilterHandler`].
pub struct ClosureFilter<F>(F);

#[async_trait]
impl<F, Fut> FilterHandler for ClosureFilter<F>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn apply(&self, value: Value, args: &Value) -> anyhow::Result<Value> {
        (self.0)(value, args.clone()).await
    }
}

/// Adapts an async closure to [`ActionHandler`].
pub struct ClosureAction<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for ClosureAction<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&self, context: &Value) -> anyhow::Result<()> {
        (self.0)(context.clone()).await
    }
}

/// Wraps an async closure as a hook handler.
///
/// ```rust,ignore
/// let handler = hook_fn(|event| async move {
///     tracing::info!(hook = %event.hook, "note saved");
///     Ok(())
/// });
/// ```
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn HookHandler>
where
    F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(ClosureHook(f))
}

/// Wraps an async closure as a filter handler. The closure receives the
/// running value and a clone of the filter arguments.
pub fn filter_fn<F, Fut>(f: F) -> Arc<dyn FilterHandler>
where
    F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(ClosureFilter(f))
}

/// Wraps an async closure as a command or menu action.
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(ClosureAction(f))
}
