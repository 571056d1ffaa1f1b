//! # kairo-extension
//!
//! Extension runtime for Kairo. Provides:
//!
//! - A generic, owner-tagged [`ContributionRegistry`] instantiated for
//!   commands, context-menu items, menu-bar items, and UI slots
//! - [`HookBus`] for ordered fire-and-forget event dispatch
//! - [`FilterBus`] for ordered value transformation pipelines
//! - [`PluginRegistry`] for compiled-in ("built-in") contributors
//! - [`ExtensionManager`] for folder-based extensions discovered on disk
//! - [`HostApi`], the owner-bound capability object handed to contributors
//!
//! Every registry is reachable from one explicit [`ExtensionRuntime`],
//! whose [`purge_owner`](ExtensionRuntime::purge_owner) removes everything
//! a contributor registered.

pub mod api;
pub mod contribution;
pub mod error;
pub mod fs;
pub mod handler;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod manifest;
pub mod prelude;
pub mod registry;
pub mod runtime;
pub mod settings;

mod guard;

pub use api::HostApi;
pub use contribution::{CORE_OWNER, Contribution, ContributionRegistry, ContributionSpec};
pub use error::{CallbackFailure, ExtensionError};
pub use hooks::{FilterBus, FilterPoint, HookBus, HookEvent, HookPoint};
pub use loader::{ExtensionModule, ModuleLoader, StaticModuleLoader};
pub use manager::{Extension, ExtensionManager, ImportOutcome};
pub use manifest::Manifest;
pub use registry::{Plugin, PluginRegistry};
pub use runtime::{ExtensionRuntime, PurgeReport};
