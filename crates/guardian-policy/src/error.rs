// error.rs — Error types for policy evaluation.

use thiserror::Error;

/// Errors that can occur during a policy check.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy document failed to load or resolve.
    #[error(transparent)]
    Config(#[from] guardian_config::ConfigError),

    /// The grant store failed; a failed consume means "not granted".
    #[error(transparent)]
    Grant(#[from] guardian_grants::GrantError),
}
