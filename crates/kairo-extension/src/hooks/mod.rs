//! Hook system: event and filter points, handler registry, and the two
//! dispatch buses.

pub mod bus;
pub mod definitions;
pub mod filter;
pub mod registry;

pub use bus::{HookBus, TriggerReport};
pub use definitions::{FilterPoint, HookEvent, HookPoint};
pub use filter::FilterBus;
pub use registry::RegistrationId;
