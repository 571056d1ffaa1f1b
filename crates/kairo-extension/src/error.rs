//! Error taxonomy for contributor failures.
//!
//! [`ExtensionError`] describes why an extension could not be discovered or
//! started. [`CallbackFailure`] describes why a single contributor callback
//! (hook, filter, command, predicate, `initialize`, `cleanup`) did not
//! complete. Neither is ever propagated out of the dispatch APIs; they are
//! logged and folded into local state.

use std::path::PathBuf;
use std::time::Duration;

use kairo_core::error::AppError;
use thiserror::Error;

/// Failure while discovering or starting an extension.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// `manifest.json` is missing, malformed, or fails validation.
    #[error("invalid manifest at '{}': {reason}", path.display())]
    Manifest {
        /// Folder or file that was being read.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
    /// The entry module could not be loaded.
    #[error("failed to load extension '{id}': {reason}")]
    Load {
        /// Extension id.
        id: String,
        /// What went wrong.
        reason: String,
    },
    /// A lifecycle step (`load`, `initialize`, `cleanup`) did not complete.
    #[error("{stage} failed: {failure}")]
    Callback {
        /// Lifecycle step that failed.
        stage: &'static str,
        #[source]
        failure: CallbackFailure,
    },
}

impl ExtensionError {
    /// Creates a manifest error.
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a load error.
    pub fn load(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a lifecycle callback error.
    pub fn callback(stage: &'static str, failure: CallbackFailure) -> Self {
        Self::Callback { stage, failure }
    }
}

impl From<ExtensionError> for AppError {
    fn from(err: ExtensionError) -> Self {
        match &err {
            ExtensionError::Manifest { .. } => AppError::validation(err.to_string()),
            _ => AppError::plugin(err.to_string()),
        }
    }
}

/// Why a contributor callback did not return a value.
#[derive(Debug, Error)]
pub enum CallbackFailure {
    /// The callback returned an error.
    #[error("{0:#}")]
    Failed(anyhow::Error),
    /// The callback panicked.
    #[error("panicked: {0}")]
    Panicked(String),
    /// The callback did not settle within the configured timeout.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}
