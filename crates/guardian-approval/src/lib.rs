//! # guardian-approval
//!
//! The interactive half of Guardian: a transient, nonce-protected HTTP
//! approval flow served exclusively on loopback.
//!
//! When a policy check answers "approval required", the caller builds an
//! [`ApprovalSession`] and starts an [`ApprovalServer`]. The server binds a
//! random loopback port, publishes a discovery record, prints instructions
//! to the terminal (optionally opening a browser), and then waits for the
//! first of four things to happen:
//!
//! - `POST /approve/<nonce>/confirm` — a grant is minted, `wait()` succeeds
//! - `POST /approve/<nonce>/deny` — `wait()` fails with [`ApprovalError::Denied`]
//! - the expiry timer fires — [`ApprovalError::Expired`]
//! - the caller shuts the handle down — [`ApprovalError::Cancelled`]
//!
//! Exactly one of these wins; the rest become no-ops. Cleanup (registry
//! retraction, listener close) runs exactly once, and every caller of
//! `wait()` observes the same outcome.

pub mod browser;
pub mod error;
pub mod page;
pub mod server;
pub mod session;
pub mod terminal;

mod routes;

pub use error::ApprovalError;
pub use server::{ApprovalHandle, ApprovalServer};
pub use session::ApprovalSession;
