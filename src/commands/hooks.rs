//! Hook and filter CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::host::VaultHost;
use crate::output::{self, OutputFormat};
use kairo_core::config::AppConfig;
use kairo_core::error::AppError;
use kairo_extension::{FilterPoint, HookPoint};

/// Arguments for hook commands
#[derive(Debug, Args)]
pub struct HookArgs {
    /// Hook subcommand
    #[command(subcommand)]
    pub command: HookCommand,
}

/// Hook subcommands
#[derive(Debug, Subcommand)]
pub enum HookCommand {
    /// List hook and filter points with registered handlers
    List,
    /// Broadcast an event to every handler of a hook point
    Trigger {
        /// Hook point, e.g. `note:saved`
        hook: String,
        /// Event arguments as JSON
        #[arg(long)]
        args: Option<String>,
    },
    /// Run a value through a filter pipeline
    Apply {
        /// Filter point, e.g. `note:content`
        filter: String,
        /// Input value as JSON
        value: String,
        /// Extra arguments as JSON
        #[arg(long)]
        args: Option<String>,
    },
}

/// Point display row for table output
#[derive(Debug, Serialize, Tabled)]
struct PointRow {
    /// Hook or filter
    kind: &'static str,
    /// Point name
    point: String,
    /// Handler count
    handlers: usize,
}

/// Execute hook commands
pub async fn execute(
    args: &HookArgs,
    vault: &Path,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let host = VaultHost::boot(vault, config).await?;

    let result = run(&args.command, &host, format).await;
    host.shutdown().await;
    result
}

async fn run(command: &HookCommand, host: &VaultHost, format: OutputFormat) -> Result<(), AppError> {
    let runtime = &host.runtime;
    match command {
        HookCommand::List => {
            let mut rows = Vec::new();
            for hook in runtime.hooks().registered_hooks().await {
                let handlers = runtime.hooks().handler_count(&hook).await;
                rows.push(PointRow { kind: "hook", point: hook.to_string(), handlers });
            }
            for filter in runtime.filters().registered_filters().await {
                let handlers = runtime.filters().filter_count(&filter).await;
                rows.push(PointRow { kind: "filter", point: filter.to_string(), handlers });
            }
            output::print_list(&rows, format);
        }
        HookCommand::Trigger { hook, args } => {
            let args = super::parse_json(args.as_deref())?;
            let report = runtime.hooks().trigger(HookPoint::from(hook.as_str()), args).await;
            if report.failed > 0 {
                output::print_warning(&format!(
                    "'{hook}': {} handler(s) completed, {} failed",
                    report.completed, report.failed
                ));
            } else {
                output::print_success(&format!("'{hook}': {} handler(s) completed", report.completed));
            }
        }
        HookCommand::Apply { filter, value, args } => {
            let value = super::parse_json(Some(value))?;
            let args = super::parse_json(args.as_deref())?;
            let result = runtime.filters().apply(FilterPoint::from(filter.as_str()), value, args).await;
            let json = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
            println!("{json}");
        }
    }
    Ok(())
}
