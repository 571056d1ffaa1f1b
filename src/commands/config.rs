//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use kairo_core::config::AppConfig;
use kairo_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_item(config, format),
            OutputFormat::Table => {
                println!("Extensions:");
                let ext = &config.extensions;
                output::print_kv("Callback timeout (ms)", &ext.callback_timeout_ms.to_string());
                output::print_kv("Default priority", &ext.default_priority.to_string());
                output::print_kv("Default hook priority", &ext.default_hook_priority.to_string());
                output::print_kv("Enabled by default", &ext.enabled_by_default.to_string());
                output::print_kv("Max data size (bytes)", &ext.max_data_size_bytes.to_string());
                println!("Logging:");
                output::print_kv("Level", &config.logging.level);
                output::print_kv("Format", &config.logging.format);
            }
        },
    }
    Ok(())
}
