//! Command palette registry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use kairo_core::{AppError, AppResult};

use super::{Contribution, ContributionRegistry, ContributionSpec};
use crate::guard::guarded;
use crate::handler::ActionHandler;
use crate::runtime::OwnerScoped;

/// Category used for commands that do not name one.
pub const DEFAULT_CATEGORY: &str = "general";

/// A palette command.
#[derive(Clone)]
pub struct Command {
    /// Display name.
    pub name: String,
    /// Optional description shown under the name.
    pub description: Option<String>,
    /// Optional keyboard shortcut, e.g. `"Mod+Shift+D"`.
    pub shortcut: Option<String>,
    /// Action run by [`CommandRegistry::execute_command`].
    pub handler: Arc<dyn ActionHandler>,
}

impl Command {
    pub fn new(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            name: name.into(),
            description: None,
            shortcut: None,
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("shortcut", &self.shortcut)
            .finish_non_exhaustive()
    }
}

/// Result of [`CommandRegistry::execute_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The action ran to completion.
    Executed,
    /// The action returned an error, panicked, or timed out.
    Failed(String),
    /// The command's predicate rejected the context; nothing ran.
    Unavailable,
}

/// Commands keyed by category.
pub struct CommandRegistry {
    inner: ContributionRegistry<String, Command>,
    timeout: Duration,
}

impl CommandRegistry {
    pub fn new(timeout: Duration, default_priority: i32) -> Self {
        Self {
            inner: ContributionRegistry::new("commands", default_priority),
            timeout,
        }
    }

    /// Registers a command under `category` (or [`DEFAULT_CATEGORY`]) and
    /// returns its effective id.
    pub async fn register(
        &self,
        category: Option<&str>,
        spec: ContributionSpec<Command>,
        owner_id: &str,
    ) -> String {
        let category = category.unwrap_or(DEFAULT_CATEGORY).to_string();
        self.inner.register(category, spec, owner_id).await
    }

    /// Removes a command by effective id, whatever its category.
    pub async fn unregister(&self, effective_id: &str) -> bool {
        match self.inner.find(effective_id).await {
            Some((category, _)) => self.inner.unregister(&category, effective_id).await,
            None => false,
        }
    }

    /// Returns the commands available in `context`, highest priority first.
    pub async fn get_commands(&self, context: &Value) -> Vec<Contribution<Command>> {
        let mut commands: Vec<_> = self
            .inner
            .all()
            .await
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.is_visible(context))
            .collect();
        commands.sort_by(|a, b| b.priority.cmp(&a.priority));
        commands
    }

    /// Case-insensitive match on name, id, and description.
    pub async fn search_commands(&self, query: &str, context: &Value) -> Vec<Contribution<Command>> {
        let needle = query.trim().to_lowercase();
        let commands = self.get_commands(context).await;
        if needle.is_empty() {
            return commands;
        }

        commands
            .into_iter()
            .filter(|entry| {
                entry.payload.name.to_lowercase().contains(&needle)
                    || entry.id.to_lowercase().contains(&needle)
                    || entry
                        .payload
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Runs a command. Unknown ids are a `NotFound` error; contributor
    /// failures are reported through [`CommandOutcome::Failed`].
    pub async fn execute_command(&self, id: &str, context: &Value) -> AppResult<CommandOutcome> {
        let (_, entry) = self
            .inner
            .find(id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Command '{id}' not found")))?;

        if !entry.is_visible(context) {
            return Ok(CommandOutcome::Unavailable);
        }

        match guarded(self.timeout, entry.payload.handler.run(context)).await {
            Ok(()) => {
                info!(command = %entry.id, owner = %entry.owner_id, "Command executed");
                Ok(CommandOutcome::Executed)
            }
            Err(failure) => {
                error!(
                    command = %entry.id,
                    owner = %entry.owner_id,
                    error = %failure,
                    "Command failed"
                );
                Ok(CommandOutcome::Failed(failure.to_string()))
            }
        }
    }

    /// Returns every category that holds at least one command.
    pub async fn categories(&self) -> Vec<String> {
        self.inner.points().await
    }

    pub async fn owned_count(&self, owner_id: &str) -> usize {
        self.inner.owned_count(owner_id).await
    }
}

#[async_trait]
impl OwnerScoped for CommandRegistry {
    fn registry_name(&self) -> &'static str {
        "commands"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        self.inner.unregister_owner(owner_id).await
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        self.inner.owned_count(owner_id).await
    }
}
