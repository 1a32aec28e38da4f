//! # guardian-registry
//!
//! Discovery records for live Guardian approval servers.
//!
//! Each running server publishes one JSON record under `<home>/servers/`
//! so sibling invocations can find it (and tooling can list or probe it).
//! Records are published atomically and retracted on shutdown; `remove` is
//! idempotent because shutdown paths race with explicit cleanup.

pub mod error;
pub mod record;
pub mod registry;

pub use error::RegistryError;
pub use record::{HelloResponse, ServerRecord};
pub use registry::ServerRegistry;
