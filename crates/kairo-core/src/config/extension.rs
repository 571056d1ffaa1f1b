//! Extension runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Extension runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Upper bound for a single hook, filter, command, `initialize` or
    /// `cleanup` call, in milliseconds.
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,
    /// Enabled state for extensions without a persisted settings entry.
    #[serde(default = "default_true")]
    pub enabled_by_default: bool,
    /// Maximum size of a single extension data write.
    #[serde(default = "default_max_data_size")]
    pub max_data_size_bytes: usize,
    /// Priority used when a contribution does not specify one.
    #[serde(default = "default_priority")]
    pub default_priority: i32,
    /// Priority used when a hook or filter does not specify one.
    #[serde(default = "default_hook_priority")]
    pub default_hook_priority: i32,
}

impl ExtensionConfig {
    /// Returns the callback timeout as a `Duration`.
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            callback_timeout_ms: default_callback_timeout_ms(),
            enabled_by_default: default_true(),
            max_data_size_bytes: default_max_data_size(),
            default_priority: default_priority(),
            default_hook_priority: default_hook_priority(),
        }
    }
}

fn default_callback_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_max_data_size() -> usize {
    10 * 1024 * 1024
}

fn default_priority() -> i32 {
    50
}

fn default_hook_priority() -> i32 {
    10
}
