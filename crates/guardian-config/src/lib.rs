//! # guardian-config
//!
//! The on-disk policy document for Guardian and its resolution into
//! effective per-operation policies.
//!
//! The document lives at `<home>/guardian/config.yaml` and is seeded with a
//! bootstrap policy on first access. [`ConfigStore::resolve`] compiles
//! defaults plus per-operation overrides into a [`ResolvedPolicy`] that the
//! policy engine, grant store, and approval server consume without ever
//! re-reading YAML.
//!
//! Unrecognized keys anywhere in the document are carried through
//! load/save round-trips, so documents written by newer Guardians keep
//! working here.

pub mod document;
pub mod error;
pub mod home;
pub mod store;

pub use document::{
    ApprovalMethod, Branding, BrowserApproval, ConfigRoot, Defaults, GrantSettings,
    GuardianDocument, OperationPolicy, ScopeConfig, SecuritySettings, CONFIG_VERSION,
};
pub use error::ConfigError;
pub use home::guardian_home;
pub use store::{resolve_document, ConfigStore, ResolvedPolicy};
