// store.rs — ConfigStore: load, seed, save, and resolve the policy document.
//
// The store owns `<home>/guardian/config.yaml`. First access seeds a
// bootstrap document at the supported schema version. Resolution compiles
// defaults + per-operation overrides into a ResolvedPolicy so downstream
// components never re-read YAML.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::document::{ApprovalMethod, ConfigRoot, GuardianDocument, SecuritySettings, CONFIG_VERSION};
use crate::error::ConfigError;

/// Directory mode for `<home>/guardian` on unix.
const DIR_MODE: u32 = 0o750;
/// File mode for the config document on unix.
const FILE_MODE: u32 = 0o600;

/// The document written on first access. Kept as literal YAML so the seeded
/// file carries comments the user can edit from.
const BOOTSTRAP_CONFIG: &str = r#"# Guardian policy document.
# Protected operations suspend until a grant covers them or a human approves
# them through the loopback browser flow.
guardian:
  version: "1.0.0"
  defaults:
    method: browser
    expires: "30m"
    require_reason: false
    audit_all: false
  scopes:
    git:
      description: "Git operations"
      operations:
        commit:
          enabled: false
          risk: medium
        push:
          enabled: true
          method: browser
          expires: "15m"
          risk: high
          conditions:
            branches: ["main", "master"]
  security:
    browser_approval:
      timeout_seconds: 300
      port_range: [49152, 65535]
      localhost_only: true
      auto_open_browser: true
      show_url_in_terminal: true
    grants:
      max_duration: "30m"
      max_concurrent: 10
      auto_cleanup: true
    branding:
      project_name: "Guardian"
      custom_message: ""
  integrations:
    hooks:
      auto_install: false
      backup_existing: true
      verify_integrity: true
"#;

/// The compiled product of defaults + operation overrides for one
/// (scope, operation) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub scope: String,
    pub operation: String,
    pub method: ApprovalMethod,
    /// Materialized expiry window.
    pub expires: Duration,
    pub require_reason: bool,
    /// Free-form risk label from the operation policy.
    pub risk: String,
    /// Condition key → pattern list, cloned from the document.
    pub conditions: BTreeMap<String, Vec<String>>,
}

/// Store for the on-disk policy document, keyed by the user home.
pub struct ConfigStore {
    home: PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at the given home directory. Nothing is read
    /// or written until `load` / `resolve`.
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
        }
    }

    /// Path of the policy document.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("guardian").join("config.yaml")
    }

    /// Load the document, seeding the bootstrap config on first access.
    ///
    /// Fails with `UnsupportedVersion` when the file declares a version this
    /// build does not support. Empty fields receive defaults during
    /// deserialization; the file itself is never upgraded implicitly.
    pub fn load(&self) -> Result<ConfigRoot, ConfigError> {
        let path = self.config_path();
        if !path.exists() {
            self.seed(&path)?;
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let root: ConfigRoot =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;

        let version = root.guardian.version.trim();
        if !version.is_empty() && version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: version.to_string(),
                supported: CONFIG_VERSION.to_string(),
            });
        }

        Ok(root)
    }

    /// Write the document atomically (temp file + rename), mode 0600.
    pub fn save(&self, root: &ConfigRoot) -> Result<(), ConfigError> {
        let path = self.config_path();
        self.ensure_dir(&path)?;

        let yaml = serde_yaml::to_string(root).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(|source| ConfigError::WriteFailed {
            path: tmp.clone(),
            source,
        })?;
        set_mode(&tmp, FILE_MODE).map_err(|source| ConfigError::WriteFailed {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| ConfigError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Resolve the effective policy for one (scope, operation).
    ///
    /// Returns `Ok(None)` whenever the scope or operation is absent or
    /// disabled — "not enforced" is not an error.
    pub fn resolve(
        &self,
        scope: &str,
        operation: &str,
    ) -> Result<Option<ResolvedPolicy>, ConfigError> {
        let root = self.load()?;
        resolve_document(&root.guardian, scope, operation)
    }

    /// The security settings block, loading (and seeding) as needed.
    pub fn security(&self) -> Result<SecuritySettings, ConfigError> {
        Ok(self.load()?.guardian.security)
    }

    fn seed(&self, path: &Path) -> Result<(), ConfigError> {
        self.ensure_dir(path)?;
        fs::write(path, BOOTSTRAP_CONFIG).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        set_mode(path, FILE_MODE).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "seeded bootstrap config");
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::WriteFailed {
                path: dir.to_path_buf(),
                source,
            })?;
            set_mode(dir, DIR_MODE).map_err(|source| ConfigError::WriteFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Pure resolution over an already-loaded document.
pub fn resolve_document(
    doc: &GuardianDocument,
    scope: &str,
    operation: &str,
) -> Result<Option<ResolvedPolicy>, ConfigError> {
    let op = match doc
        .scopes
        .get(scope)
        .and_then(|s| s.operations.get(operation))
    {
        Some(op) => op,
        None => return Ok(None),
    };
    if !op.enabled {
        return Ok(None);
    }

    let raw_expires = op
        .expires
        .as_deref()
        .unwrap_or(doc.defaults.expires.as_str());
    let expires =
        humantime::parse_duration(raw_expires).map_err(|source| ConfigError::InvalidExpires {
            scope: scope.to_string(),
            operation: operation.to_string(),
            raw: raw_expires.to_string(),
            source,
        })?;

    Ok(Some(ResolvedPolicy {
        scope: scope.to_string(),
        operation: operation.to_string(),
        method: op.method.unwrap_or(doc.defaults.method),
        expires,
        require_reason: op.require_reason.unwrap_or(doc.defaults.require_reason),
        risk: op.risk.clone(),
        conditions: op.conditions.clone(),
    }))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
