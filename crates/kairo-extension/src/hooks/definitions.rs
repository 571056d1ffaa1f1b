//! Hook and filter point definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::macros::named_points;

named_points! {
    /// Application events broadcast through the [`HookBus`](super::HookBus).
    pub enum HookPoint {
        // ── Lifecycle ──
        /// Fired once the host finished startup and loaded extensions.
        AppReady => "app:ready",
        /// Fired when a vault is opened.
        VaultOpened => "vault:opened",
        /// Fired when a vault is closed.
        VaultClosed => "vault:closed",

        // ── Notes ──
        /// Fired after a note is created.
        NoteCreated => "note:created",
        /// Fired when a note is opened in an editor.
        NoteOpened => "note:opened",
        /// Fired after a note is written to disk.
        NoteSaved => "note:saved",
        /// Fired after a note is deleted.
        NoteDeleted => "note:deleted",
        /// Fired after a note is renamed or moved.
        NoteRenamed => "note:renamed",

        // ── Search ──
        /// Fired after a search query ran.
        SearchPerformed => "search:performed",
    }
}

named_points! {
    /// Value pipelines run through the [`FilterBus`](super::FilterBus).
    pub enum FilterPoint {
        /// Raw note body before it is shown in the editor.
        NoteContent => "note:content",
        /// Note body right before it is written to disk.
        NoteBeforeSave => "note:before-save",
        /// Note title as displayed.
        NoteTitle => "note:title",
        /// Rendered HTML of a note preview.
        RenderedHtml => "render:html",
        /// Search result list.
        SearchResults => "search:results",
    }
}

/// Event delivered to hook handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    /// The hook being fired.
    pub hook: HookPoint,
    /// Arguments supplied by the host.
    pub args: Value,
    /// Time the hook was triggered.
    pub timestamp: DateTime<Utc>,
}

impl HookEvent {
    /// Creates a new event.
    pub fn new(hook: HookPoint, args: Value) -> Self {
        Self {
            hook,
            args,
            timestamp: Utc::now(),
        }
    }

    /// Gets a string argument by key.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}
