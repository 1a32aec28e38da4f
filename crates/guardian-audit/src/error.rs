// error.rs — Error types for the audit subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while recording or verifying audit events.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit log file could not be opened.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A read or write on the audit log failed.
    #[error("audit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized or deserialized.
    #[error("audit event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hash chain is broken — an event's previous_hash does not match
    /// the hash of the preceding line.
    #[error("audit chain integrity violation at line {line}: expected {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
