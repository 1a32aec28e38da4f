// error.rs — Error types for the server registry.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a server record.
    #[error("server record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A server name contains characters that cannot appear in a file name.
    #[error("malformed server name '{0}'")]
    MalformedName(String),

    /// A `/hello` probe failed (connection refused, timeout, bad body).
    #[error("hello probe failed: {0}")]
    ProbeFailed(#[from] reqwest::Error),
}
