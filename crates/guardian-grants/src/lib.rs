//! # guardian-grants
//!
//! Persistent single-use capabilities ("grants") for Guardian.
//!
//! An approval mints a [`Grant`]; the immediately following re-invocation of
//! the protected operation consumes it. Grants live one-per-file under
//! `<home>/guardian/grants/`, are published atomically (write-then-rename),
//! and are claimed by deletion — whichever process unlinks the file first
//! owns the approval. Expired grants are removed whenever they are observed.

pub mod error;
pub mod grant;
pub mod store;

pub use error::GrantError;
pub use grant::{random_token, Grant, OperationContext};
pub use store::GrantStore;
