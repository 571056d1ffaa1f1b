//! Application configuration schemas.
//!
//! All configuration structs are deserialized from an optional TOML file
//! merged with `KAIRO__*` environment variables via the `config` crate.
//! Every field carries a serde default, so a host can start without any
//! configuration file at all.

pub mod extension;
pub mod logging;

use serde::{Deserialize, Serialize};

use self::extension::ExtensionConfig;
use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extension runtime settings.
    #[serde(default)]
    pub extensions: ExtensionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and the environment.
    ///
    /// The file is optional. Environment variables prefixed with `KAIRO`
    /// and separated by `__` override file values, e.g.
    /// `KAIRO__EXTENSIONS__CALLBACK_TIMEOUT_MS=5000`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("KAIRO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
