//! UI insertion slots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ContributionRegistry;
use crate::macros::named_points;

named_points! {
    /// Places in the UI where contributors can insert a component.
    pub enum SlotPoint {
        Sidebar => "sidebar",
        StatusBar => "status-bar",
        EditorToolbar => "editor-toolbar",
        NoteHeader => "note-header",
        NoteFooter => "note-footer",
        Settings => "settings",
    }
}

/// Descriptor of a component rendered by the UI layer.
///
/// The runtime does not interpret `component` or `props`; they are handed
/// to the renderer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotComponent {
    /// Component name understood by the renderer.
    pub component: String,
    /// Properties passed to the component.
    #[serde(default)]
    pub props: Value,
}

impl SlotComponent {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Value::Null,
        }
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}

/// Slot components keyed by slot.
pub type SlotRegistry = ContributionRegistry<SlotPoint, SlotComponent>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::contribution::ContributionSpec;

    #[tokio::test]
    async fn test_components_ordered_by_priority() {
        let slots = SlotRegistry::new("slots", 50);
        slots
            .register(
                SlotPoint::StatusBar,
                ContributionSpec::new("words", SlotComponent::new("WordCount")),
                "stats",
            )
            .await;
        slots
            .register(
                SlotPoint::StatusBar,
                ContributionSpec::new("sync", SlotComponent::new("SyncBadge").with_props(json!({"compact": true})))
                    .with_priority(80),
                "core",
            )
            .await;

        let components: Vec<_> = slots
            .entries(&SlotPoint::StatusBar)
            .await
            .into_iter()
            .map(|c| c.payload.component)
            .collect();
        assert_eq!(components, vec!["SyncBadge", "WordCount"]);
    }

    #[test]
    fn test_custom_slot_name() {
        assert_eq!(
            SlotPoint::from("kanban-card"),
            SlotPoint::Custom("kanban-card".to_string())
        );
    }
}
