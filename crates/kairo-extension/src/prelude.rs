//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use crate::api::{ExtensionLogger, ExtensionStorage, HostApi, SubscriptionId};
pub use crate::contribution::{
    Command, CommandOutcome, ContextMenuSurface, Contribution, ContributionSpec, MenuCategory, MenuItem,
    SlotComponent, SlotPoint,
};
pub use crate::handler::{ActionHandler, FilterHandler, HookHandler, action_fn, filter_fn, hook_fn};
pub use crate::hooks::{FilterPoint, HookEvent, HookPoint, RegistrationId};
pub use crate::loader::ExtensionModule;
pub use crate::manifest::Manifest;
pub use crate::registry::{Plugin, PluginInfo};

pub use crate::{declare_extension, manifest};
