//! Owner-tagged logger handed to contributors.

use tracing::{debug, error, info, warn};

/// Forwards contributor log lines to `tracing` under the `extension` target.
#[derive(Debug, Clone)]
pub struct ExtensionLogger {
    owner_id: String,
}

impl ExtensionLogger {
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
        }
    }

    pub fn debug(&self, message: &str) {
        debug!(target: "extension", owner = %self.owner_id, "{message}");
    }

    pub fn info(&self, message: &str) {
        info!(target: "extension", owner = %self.owner_id, "{message}");
    }

    pub fn warn(&self, message: &str) {
        warn!(target: "extension", owner = %self.owner_id, "{message}");
    }

    pub fn error(&self, message: &str) {
        error!(target: "extension", owner = %self.owner_id, "{message}");
    }
}
