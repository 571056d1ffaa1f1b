//! Command palette CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::host::VaultHost;
use crate::output::{self, OutputFormat};
use kairo_core::config::AppConfig;
use kairo_core::error::AppError;
use kairo_extension::Contribution;
use kairo_extension::contribution::{Command, CommandOutcome};

/// Arguments for command palette commands
#[derive(Debug, Args)]
pub struct PaletteArgs {
    /// Palette subcommand
    #[command(subcommand)]
    pub command: PaletteCommand,
}

/// Palette subcommands
#[derive(Debug, Subcommand)]
pub enum PaletteCommand {
    /// List commands visible in a context
    List {
        /// Evaluation context as JSON
        #[arg(long)]
        context: Option<String>,
    },
    /// Search commands by name, id, or description
    Search {
        /// Search text
        query: String,
        /// Evaluation context as JSON
        #[arg(long)]
        context: Option<String>,
    },
    /// Execute a command by its effective id
    Run {
        /// Effective command id
        id: String,
        /// Evaluation context as JSON
        #[arg(long)]
        context: Option<String>,
    },
}

/// Command display row for table output
#[derive(Debug, Serialize, Tabled)]
struct CommandRow {
    /// Effective ID
    id: String,
    /// Display name
    name: String,
    /// Owner
    owner: String,
    /// Priority
    priority: i32,
    /// Shortcut
    shortcut: String,
}

impl From<&Contribution<Command>> for CommandRow {
    fn from(c: &Contribution<Command>) -> Self {
        Self {
            id: c.id.clone(),
            name: c.payload.name.clone(),
            owner: c.owner_id.clone(),
            priority: c.priority,
            shortcut: c.payload.shortcut.clone().unwrap_or_default(),
        }
    }
}

/// Execute palette commands
pub async fn execute(
    args: &PaletteArgs,
    vault: &Path,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let host = VaultHost::boot(vault, config).await?;

    let result = run(&args.command, &host, format).await;
    host.shutdown().await;
    result
}

async fn run(command: &PaletteCommand, host: &VaultHost, format: OutputFormat) -> Result<(), AppError> {
    let runtime = &host.runtime;
    match command {
        PaletteCommand::List { context } => {
            let context = super::parse_json(context.as_deref())?;
            let rows: Vec<CommandRow> = runtime
                .get_commands(&context)
                .await
                .iter()
                .map(CommandRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        PaletteCommand::Search { query, context } => {
            let context = super::parse_json(context.as_deref())?;
            let rows: Vec<CommandRow> = runtime
                .search_commands(query, &context)
                .await
                .iter()
                .map(CommandRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        PaletteCommand::Run { id, context } => {
            let context = super::parse_json(context.as_deref())?;
            match runtime.execute_command(id, &context).await? {
                CommandOutcome::Executed => output::print_success(&format!("Executed '{id}'")),
                CommandOutcome::Unavailable => {
                    output::print_warning(&format!("Command '{id}' is not available in this context"))
                }
                CommandOutcome::Failed(reason) => {
                    return Err(AppError::plugin(format!("Command '{id}' failed: {reason}")));
                }
            }
        }
    }
    Ok(())
}
