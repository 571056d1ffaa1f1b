//! CLI command definitions and dispatch.

pub mod config;
pub mod extension;
pub mod hooks;
pub mod palette;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::output::OutputFormat;
use kairo_core::config::AppConfig;
use kairo_core::error::AppError;

/// kairo-ext: manage and exercise the extensions of a Kairo vault
#[derive(Debug, Parser)]
#[command(name = "kairo-ext", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/kairo.toml")]
    pub config: String,

    /// Vault root directory
    #[arg(short, long, default_value = ".")]
    pub vault: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extension folder management
    Extension(extension::ExtensionArgs),
    /// Command palette
    Command(palette::PaletteArgs),
    /// Hooks and filters
    Hook(hooks::HookArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Extension(args) => extension::execute(args, &self.vault, &config, self.format).await,
            Commands::Command(args) => palette::execute(args, &self.vault, &config, self.format).await,
            Commands::Hook(args) => hooks::execute(args, &self.vault, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: parse a JSON argument, treating an absent one as `{}`
pub fn parse_json(raw: Option<&str>) -> Result<Value, AppError> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::validation(format!("Invalid JSON argument: {e}"))),
    }
}
