//! Extension folder management CLI commands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::host::VaultHost;
use crate::output::{self, OutputFormat};
use kairo_core::config::AppConfig;
use kairo_core::error::AppError;
use kairo_extension::{Extension, ImportOutcome};

/// Arguments for extension commands
#[derive(Debug, Args)]
pub struct ExtensionArgs {
    /// Extension subcommand
    #[command(subcommand)]
    pub command: ExtensionCommand,
}

/// Extension subcommands
#[derive(Debug, Subcommand)]
pub enum ExtensionCommand {
    /// Discover and load all extensions, then list their state
    List,
    /// Copy an extension folder into the vault
    Import {
        /// Folder containing a manifest.json
        source: PathBuf,
        /// Replace an installed extension with the same id
        #[arg(long)]
        overwrite: bool,
    },
    /// Delete an installed extension folder
    Remove {
        /// Extension id
        id: String,
    },
    /// Enable an extension and persist the setting
    Enable {
        /// Extension id
        id: String,
    },
    /// Disable an extension and persist the setting
    Disable {
        /// Extension id
        id: String,
    },
}

/// Extension display row for table output
#[derive(Debug, Serialize, Tabled)]
struct ExtensionRow {
    /// Extension ID
    id: String,
    /// Display name
    name: String,
    /// Version
    version: String,
    /// Enabled flag
    enabled: bool,
    /// Loaded flag
    loaded: bool,
    /// Last error
    error: String,
}

impl From<&Extension> for ExtensionRow {
    fn from(ext: &Extension) -> Self {
        Self {
            id: ext.id.clone(),
            name: ext.manifest.as_ref().map(|m| m.name.clone()).unwrap_or_default(),
            version: ext.manifest.as_ref().map(|m| m.version.clone()).unwrap_or_default(),
            enabled: ext.enabled,
            loaded: ext.loaded,
            error: ext.error.clone().unwrap_or_default(),
        }
    }
}

/// Execute extension commands
pub async fn execute(
    args: &ExtensionArgs,
    vault: &Path,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let host = VaultHost::boot(vault, config).await?;

    let result = run(&args.command, &host, format).await;
    host.shutdown().await;
    result
}

async fn run(command: &ExtensionCommand, host: &VaultHost, format: OutputFormat) -> Result<(), AppError> {
    let manager = &host.manager;
    match command {
        ExtensionCommand::List => {
            let rows: Vec<ExtensionRow> = manager.list().await.iter().map(ExtensionRow::from).collect();
            output::print_list(&rows, format);
        }
        ExtensionCommand::Import { source, overwrite } => {
            match manager.import_extension(source, *overwrite).await? {
                ImportOutcome::Imported(ext) => {
                    if let Some(error) = &ext.error {
                        output::print_warning(&format!("Imported '{}' but it failed to load: {error}", ext.id));
                    } else {
                        output::print_success(&format!("Imported extension '{}'", ext.id));
                    }
                }
                ImportOutcome::Collision { id, existing } => {
                    let installed = existing
                        .map(|m| format!("{} {}", m.name, m.version))
                        .unwrap_or_else(|| "an unreadable manifest".to_string());
                    output::print_warning(&format!(
                        "Extension '{id}' is already installed ({installed}); re-run with --overwrite to replace it"
                    ));
                }
            }
        }
        ExtensionCommand::Remove { id } => {
            manager.remove_extension(id).await?;
            output::print_success(&format!("Removed extension '{id}'"));
        }
        ExtensionCommand::Enable { id } => {
            let ext = manager.enable_extension(id).await?;
            match &ext.error {
                Some(error) => output::print_warning(&format!("Enabled '{id}' but it failed to load: {error}")),
                None => output::print_success(&format!("Enabled extension '{id}'")),
            }
        }
        ExtensionCommand::Disable { id } => {
            manager.disable_extension(id).await?;
            output::print_success(&format!("Disabled extension '{id}'"));
        }
    }
    Ok(())
}
