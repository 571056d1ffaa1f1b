//! Integration tests for built-in plugins, dispatch ordering, and owner
//! cleanup across every registry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use kairo_core::config::extension::ExtensionConfig;
use kairo_extension::prelude::*;
use kairo_extension::{ExtensionRuntime, PluginRegistry};

/// Built-in plugin registering one command per enable.
struct Journal;

#[async_trait]
impl Plugin for Journal {
    fn manifest(&self) -> Manifest {
        kairo_extension::manifest!(id: "journal", name: "Journal", version: "1.0.0")
    }

    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
        let command = Command::new("Open today's entry", action_fn(|_| async { Ok(()) }));
        api.register_command(Some("notes"), ContributionSpec::new("today", command))
            .await;
        Ok(())
    }
}

/// Registers one entry in every owner-scoped registry.
struct Everywhere;

#[async_trait]
impl Plugin for Everywhere {
    fn manifest(&self) -> Manifest {
        kairo_extension::manifest!(id: "everywhere", name: "Everywhere", version: "0.1.0")
    }

    async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
        let noop = || action_fn(|_| async { Ok(()) });

        api.register_command(None, ContributionSpec::new("cmd", Command::new("Cmd", noop())))
            .await;
        api.register_hook(HookPoint::NoteSaved, hook_fn(|_| async { Ok(()) }))
            .await;
        api.register_filter(FilterPoint::NoteContent, filter_fn(|v, _| async move { Ok(v) }))
            .await;
        api.register_context_menu_item(
            ContextMenuSurface::Editor,
            ContributionSpec::new("ctx", MenuItem::new("Ctx", noop())),
        )
        .await;
        api.register_menu_item(
            MenuCategory::Tools,
            ContributionSpec::new("tool", MenuItem::new("Tool", noop())),
        )
        .await;
        api.register_slot_component(
            SlotPoint::StatusBar,
            ContributionSpec::new("status", SlotComponent::new("WordCount")),
        )
        .await;
        api.add_styles(".everywhere { color: red; }").await;
        api.subscribe("notes", |_| Ok(())).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_disable_then_enable_yields_single_command() {
    let runtime = Arc::new(ExtensionRuntime::default());
    let registry = PluginRegistry::new(Arc::clone(&runtime));
    registry.register_plugin(Arc::new(Journal), true).await.unwrap();

    registry.disable_plugin("journal").await.unwrap();
    assert!(runtime.get_commands(&Value::Null).await.is_empty());

    registry.enable_plugin("journal").await.unwrap();
    let commands = runtime.get_commands(&Value::Null).await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].id, "journal.today");
    assert!(registry.is_enabled("journal").await);
}

#[tokio::test]
async fn test_purge_covers_every_registry() {
    let runtime = Arc::new(ExtensionRuntime::default());
    let registry = PluginRegistry::new(Arc::clone(&runtime));
    registry.register_plugin(Arc::new(Everywhere), true).await.unwrap();
    registry.register_plugin(Arc::new(Journal), true).await.unwrap();

    assert_eq!(runtime.owned_count("everywhere").await, 8);

    let report = runtime.purge_owner("everywhere").await;
    assert_eq!(report.total(), 8);
    for name in [
        "commands",
        "context-menu",
        "menu-bar",
        "slots",
        "hooks",
        "filters",
        "styles",
        "subscriptions",
    ] {
        assert_eq!(report.removed.get(name), Some(&1), "registry {name}");
    }

    assert_eq!(runtime.owned_count("everywhere").await, 0);
    assert_eq!(runtime.styles().stylesheet().await, "");
    assert_eq!(runtime.owned_count("journal").await, 1);
}

#[tokio::test]
async fn test_hooks_run_in_priority_order() {
    let runtime = Arc::new(ExtensionRuntime::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    for (owner, priority) in [("low", 10), ("high", 90), ("mid", 50), ("mid-second", 50)] {
        let seen = Arc::clone(&seen);
        runtime
            .host_api(owner)
            .register_hook_with_priority(
                HookPoint::NoteSaved,
                hook_fn(move |_| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.lock().unwrap().push(owner);
                        Ok(())
                    }
                }),
                priority,
            )
            .await;
    }

    let report = runtime.hooks().trigger(HookPoint::NoteSaved, json!({"path": "a.md"})).await;
    assert_eq!(report.completed, 4);
    assert_eq!(*seen.lock().unwrap(), vec!["high", "mid", "mid-second", "low"]);
}

#[tokio::test]
async fn test_filter_chain_skips_failing_and_slow_filters() {
    let config = ExtensionConfig {
        callback_timeout_ms: 50,
        ..ExtensionConfig::default()
    };
    let runtime = Arc::new(ExtensionRuntime::new(config));
    let api = runtime.host_api("chain");

    api.register_filter_with_priority(
        FilterPoint::NoteTitle,
        filter_fn(|v, _| async move { Ok(json!(format!("{}Y", v.as_str().unwrap_or_default()))) }),
        90,
    )
    .await;
    api.register_filter_with_priority(
        FilterPoint::NoteTitle,
        filter_fn(|_, _| async { Err::<Value, _>(anyhow::anyhow!("rejected")) }),
        80,
    )
    .await;
    api.register_filter_with_priority(
        FilterPoint::NoteTitle,
        filter_fn(|v, _| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(v)
        }),
        70,
    )
    .await;
    api.register_filter_with_priority(
        FilterPoint::NoteTitle,
        filter_fn(|v, _| async move { Ok(json!(format!("{}Z", v.as_str().unwrap_or_default()))) }),
        10,
    )
    .await;

    let title = runtime
        .filters()
        .apply(FilterPoint::NoteTitle, json!("X"), Value::Null)
        .await;
    assert_eq!(title, json!("XYZ"));
}

#[tokio::test]
async fn test_commands_sorted_by_priority_across_owners() {
    let runtime = Arc::new(ExtensionRuntime::default());
    let noop = || action_fn(|_| async { Ok(()) });

    runtime
        .host_api("alpha")
        .register_command(None, ContributionSpec::new("a", Command::new("A", noop())).with_priority(10))
        .await;
    runtime
        .host_api("beta")
        .register_command(Some("edit"), ContributionSpec::new("b", Command::new("B", noop())).with_priority(70))
        .await;
    runtime
        .host_api("gamma")
        .register_command(None, ContributionSpec::new("c", Command::new("C", noop())))
        .await;

    let ids: Vec<String> = runtime
        .get_commands(&Value::Null)
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["beta.b", "gamma.c", "alpha.a"]);
}

#[tokio::test]
async fn test_predicate_hides_command_in_context() {
    let runtime = Arc::new(ExtensionRuntime::default());
    let spec = ContributionSpec::new("md-only", Command::new("Markdown only", action_fn(|_| async { Ok(()) })))
        .when(|ctx| Ok(ctx["extension"] == "md"));
    runtime.host_api("md").register_command(None, spec).await;

    assert_eq!(runtime.get_commands(&json!({"extension": "md"})).await.len(), 1);
    assert!(runtime.get_commands(&json!({"extension": "pdf"})).await.is_empty());
    assert_eq!(
        runtime.execute_command("md.md-only", &json!({"extension": "pdf"})).await.unwrap(),
        CommandOutcome::Unavailable
    );
}
