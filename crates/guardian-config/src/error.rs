// error.rs — Error types for the config subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or resolving the policy document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file could not be written (seeding or save).
    #[error("cannot write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid YAML or does not match the schema.
    #[error("cannot parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The document declares a schema version this build does not support.
    #[error("unsupported config version '{found}' (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    /// An operation's expiry string failed to parse as a duration.
    #[error("invalid expires '{raw}' for {scope}.{operation}: {source}")]
    InvalidExpires {
        scope: String,
        operation: String,
        raw: String,
        source: humantime::DurationError,
    },

    /// The user home directory could not be determined.
    #[error("cannot determine home directory (set GUARDIAN_HOME to override)")]
    NoHome,
}
