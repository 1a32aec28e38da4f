//! # guardian-audit
//!
//! Structured audit trail for Guardian's operation gating.
//!
//! Every significant decision — a policy check resolving, an approval being
//! requested, granted, denied, or expiring, a grant being minted, consumed,
//! or revoked — is recorded as an [`AuditEvent`]. Events are delivered to an
//! [`AuditSink`]; the default sink appends hash-chained JSON Lines to
//! `<home>/guardian/audit.log` so tampering is detectable after the fact.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use guardian_audit::{AuditAction, AuditEvent, AuditLog};
//!
//! let mut log = AuditLog::open("/tmp/audit.log").unwrap();
//! let mut event = AuditEvent::new(AuditAction::GrantMinted, "git", "push")
//!     .with_grant_id("a1b2c3d4e5f60718a1b2c3d4e5f60718");
//! log.append(&mut event).unwrap();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;
pub mod sink;

pub use error::AuditError;
pub use event::{AuditAction, AuditEvent};
pub use log::AuditLog;
pub use sink::{AuditSink, JsonlSink, NullSink, TracingSink};
