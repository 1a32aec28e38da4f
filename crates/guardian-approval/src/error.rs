// error.rs — Terminal outcomes and failures of the approval flow.
//
// Denied/Expired/Cancelled are not bugs; they are the three unhappy endings
// of a perfectly healthy approval session. Callers match on them to pick
// exit codes.

use thiserror::Error;

/// Errors surfaced by `ApprovalHandle::wait()` and `ApprovalServer::start()`.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The user pressed Deny.
    #[error("operation denied by user")]
    Denied,

    /// The approval window elapsed without a decision.
    #[error("approval request expired")]
    Expired,

    /// The caller cancelled the session before a decision arrived.
    #[error("approval cancelled")]
    Cancelled,

    /// The session died on an internal failure (e.g., the grant could not
    /// be written after the user approved).
    #[error("approval failed internally: {0}")]
    Internal(String),

    /// No loopback listener could be bound.
    #[error("failed to bind approval listener: {0}")]
    Listener(#[source] std::io::Error),

    /// Publishing or retracting the server record failed.
    #[error(transparent)]
    Registry(#[from] guardian_registry::RegistryError),

    /// The grant store failed outside the approve path.
    #[error(transparent)]
    Grant(#[from] guardian_grants::GrantError),
}
