//! Error boundary around contributor code.
//!
//! Every call into hook, filter, command, predicate, or lifecycle code goes
//! through one of these two functions so that errors, panics, and hangs are
//! all turned into a [`CallbackFailure`].

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use futures::FutureExt;

use crate::error::CallbackFailure;

/// Awaits a contributor future with a timeout and a panic boundary.
pub(crate) async fn guarded<T, F>(timeout: Duration, fut: F) -> Result<T, CallbackFailure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_) => Err(CallbackFailure::TimedOut(timeout)),
        Ok(Err(payload)) => Err(CallbackFailure::Panicked(panic_message(payload.as_ref()))),
        Ok(Ok(Err(e))) => Err(CallbackFailure::Failed(e)),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

/// Runs a synchronous contributor closure behind a panic boundary.
pub(crate) fn guarded_sync<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, CallbackFailure> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Err(payload) => Err(CallbackFailure::Panicked(panic_message(payload.as_ref()))),
        Ok(Err(e)) => Err(CallbackFailure::Failed(e)),
        Ok(Ok(value)) => Ok(value),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ok_passes_through() {
        let value = guarded(Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_error_is_captured() {
        let result: Result<(), _> =
            guarded(Duration::from_secs(1), async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(matches!(result, Err(CallbackFailure::Failed(e)) if e.to_string() == "boom"));
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        fn explode() -> anyhow::Result<()> {
            panic!("handler exploded")
        }

        let result = guarded(Duration::from_secs(1), async { explode() }).await;
        assert!(matches!(result, Err(CallbackFailure::Panicked(msg)) if msg == "handler exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_times_out() {
        let result: Result<(), _> = guarded(Duration::from_millis(50), async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CallbackFailure::TimedOut(_))));
    }

    #[test]
    fn test_sync_panic_is_captured() {
        let result = guarded_sync(|| -> anyhow::Result<bool> { panic!("predicate") });
        assert!(matches!(result, Err(CallbackFailure::Panicked(_))));
    }
}
