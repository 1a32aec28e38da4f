// home.rs — User-home resolution for all on-disk Guardian state.
//
// Every store (config, grants, server registry, audit log) is keyed by an
// explicit home path passed to its constructor. This module only decides
// what that path is by default; nothing else reads the environment.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable that overrides the user home, mainly for tests.
pub const HOME_ENV: &str = "GUARDIAN_HOME";

/// Resolve the home directory that roots Guardian's on-disk state.
///
/// `GUARDIAN_HOME` wins when set and non-empty; otherwise the platform
/// home directory is used.
pub fn guardian_home() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir().ok_or(ConfigError::NoHome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        // Env vars are process-global; use a unique value and restore after.
        let prev = std::env::var(HOME_ENV).ok();
        std::env::set_var(HOME_ENV, "/tmp/guardian-test-home");
        let home = guardian_home().unwrap();
        match prev {
            Some(v) => std::env::set_var(HOME_ENV, v),
            None => std::env::remove_var(HOME_ENV),
        }
        assert_eq!(home, PathBuf::from("/tmp/guardian-test-home"));
    }
}
