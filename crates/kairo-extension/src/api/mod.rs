//! Host API: the owner-bound capability object and the host services it
//! exposes to contributors.

pub mod host;
pub mod logger;
pub mod state;
pub mod storage;
pub mod styles;

pub use host::HostApi;
pub use logger::ExtensionLogger;
pub use state::{StateCallback, StateStore, SubscriptionId};
pub use storage::ExtensionStorage;
pub use styles::StyleRegistry;
