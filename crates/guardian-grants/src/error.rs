// error.rs — Error types for the grant store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during grant operations.
#[derive(Debug, Error)]
pub enum GrantError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a grant record.
    #[error("grant serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A matched grant could not be deleted; the approval is not consumed.
    #[error("failed to consume grant {id}: {source}")]
    ConsumeFailed {
        id: String,
        source: std::io::Error,
    },

    /// Minting would exceed the configured concurrent grant limit.
    #[error("too many live grants ({live} >= {limit})")]
    TooManyGrants { live: usize, limit: usize },

    /// A grant id contains characters that cannot appear in a file name.
    #[error("malformed grant id '{0}'")]
    MalformedId(String),
}
