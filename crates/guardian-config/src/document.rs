// document.rs — The on-disk policy document schema.
//
// Mirrors the YAML under `<home>/guardian/config.yaml`. Every struct carries
// a flattened `extra` map so keys written by a newer Guardian survive a
// load/save round-trip here instead of being dropped.
//
// Durations are stored as human-readable strings ("30m", "15m", "1s") and
// only parsed at resolution time, so a typo in one operation cannot poison
// loading the rest of the document.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The single schema version this build reads and writes.
pub const CONFIG_VERSION: &str = "1.0.0";

/// How a protected operation may be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMethod {
    /// Interactive approval through the loopback browser flow.
    Browser,
    /// Only a previously issued grant may satisfy the check.
    Grant,
}

impl std::fmt::Display for ApprovalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalMethod::Browser => write!(f, "browser"),
            ApprovalMethod::Grant => write!(f, "grant"),
        }
    }
}

/// Top-level wrapper: the document is everything under the `guardian:` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRoot {
    #[serde(default)]
    pub guardian: GuardianDocument,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The policy document: defaults, scoped operation policies, and security
/// settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianDocument {
    /// Schema version. Empty means "whatever this build supports".
    #[serde(default)]
    pub version: String,

    /// Fallbacks applied where an operation does not override.
    #[serde(default)]
    pub defaults: Defaults,

    /// Scope name → scope configuration (e.g., "git" → commit/push policies).
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeConfig>,

    /// Browser/grant/branding security settings.
    #[serde(default)]
    pub security: SecuritySettings,

    /// Hook integration surface (consumed by the hook installer, not here).
    #[serde(default)]
    pub integrations: Integrations,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for GuardianDocument {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            defaults: Defaults::default(),
            scopes: BTreeMap::new(),
            security: SecuritySettings::default(),
            integrations: Integrations::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// Policy defaults inherited by every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_method")]
    pub method: ApprovalMethod,

    /// Approval validity window as a human duration string.
    #[serde(default = "default_expires")]
    pub expires: String,

    #[serde(default)]
    pub require_reason: bool,

    #[serde(default)]
    pub audit_all: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            method: default_method(),
            expires: default_expires(),
            require_reason: false,
            audit_all: false,
            extra: BTreeMap::new(),
        }
    }
}

/// One named scope (e.g., "git") and its gated operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub description: String,

    /// Operation name → policy (e.g., "push" → ...).
    #[serde(default)]
    pub operations: BTreeMap<String, OperationPolicy>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Per-operation policy overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationPolicy {
    /// Disabled operations resolve to "not enforced".
    #[serde(default)]
    pub enabled: bool,

    /// Override of the default approval method.
    #[serde(default)]
    pub method: Option<ApprovalMethod>,

    /// Override of the default expiry (human duration string).
    #[serde(default)]
    pub expires: Option<String>,

    /// Three-state: None inherits the default, Some(_) forces a value.
    #[serde(default)]
    pub require_reason: Option<bool>,

    /// Free-form risk label (e.g., "high") surfaced on the approval page.
    #[serde(default)]
    pub risk: String,

    /// Condition key → pattern list. Recognized keys are "branches" and
    /// "remote_patterns" (alias "remotes"); unknown keys pass through.
    #[serde(default)]
    pub conditions: BTreeMap<String, Vec<String>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Security settings: browser approval behavior, grant limits, branding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Encryption block — configuration surface only, consumed elsewhere.
    #[serde(default)]
    pub encryption: serde_yaml::Value,

    /// Audit block — configuration surface only, consumed elsewhere.
    #[serde(default)]
    pub audit: serde_yaml::Value,

    #[serde(default)]
    pub browser_approval: BrowserApproval,

    #[serde(default)]
    pub grants: GrantSettings,

    #[serde(default)]
    pub branding: Branding,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Settings for the loopback browser approval flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserApproval {
    /// Upper bound on how long an approval page stays live, in seconds.
    /// Zero defers entirely to the policy expiry.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Inclusive [min, max] range to sample listen ports from.
    #[serde(default = "default_port_range")]
    pub port_range: [u16; 2],

    /// Advisory only: the bind address is always loopback.
    #[serde(default = "default_true")]
    pub localhost_only: bool,

    #[serde(default = "default_true")]
    pub auto_open_browser: bool,

    #[serde(default = "default_true")]
    pub show_url_in_terminal: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for BrowserApproval {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            port_range: default_port_range(),
            localhost_only: true,
            auto_open_browser: true,
            show_url_in_terminal: true,
            extra: BTreeMap::new(),
        }
    }
}

impl BrowserApproval {
    /// The timeout as a duration. Zero means "no browser-side bound".
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Limits on single-use grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantSettings {
    /// Cap on any single grant's validity (human duration string).
    #[serde(default = "default_max_duration")]
    pub max_duration: String,

    /// Cap on concurrently live (unexpired) grants.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Garbage-collect expired grants opportunistically.
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            max_duration: default_max_duration(),
            max_concurrent: default_max_concurrent(),
            auto_cleanup: true,
            extra: BTreeMap::new(),
        }
    }
}

impl GrantSettings {
    /// Parse the max grant duration, falling back to the built-in default
    /// when the string is unparseable.
    pub fn max_duration_parsed(&self) -> Duration {
        match humantime::parse_duration(&self.max_duration) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(
                    raw = %self.max_duration,
                    error = %err,
                    "invalid grants.max_duration, using default"
                );
                humantime::parse_duration(&default_max_duration()).expect("default parses")
            }
        }
    }
}

/// Presentation settings for the approval page and terminal block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branding {
    #[serde(default = "default_project_name")]
    pub project_name: String,

    #[serde(default)]
    pub logo_path: Option<PathBuf>,

    /// Extra line shown on the approval page and in the terminal block.
    #[serde(default)]
    pub custom_message: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            logo_path: None,
            custom_message: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Integration surface for hook installers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Integrations {
    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Hook installation preferences (consumed by the external hook plumbing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub auto_install: bool,

    #[serde(default = "default_true")]
    pub backup_existing: bool,

    #[serde(default = "default_true")]
    pub verify_integrity: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            auto_install: false,
            backup_existing: true,
            verify_integrity: true,
            extra: BTreeMap::new(),
        }
    }
}

// Serde default functions
fn default_method() -> ApprovalMethod {
    ApprovalMethod::Browser
}

fn default_expires() -> String {
    "30m".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_port_range() -> [u16; 2] {
    [49152, 65535]
}

fn default_max_duration() -> String {
    "30m".to_string()
}

fn default_max_concurrent() -> usize {
    10
}

fn default_project_name() -> String {
    "Guardian".to_string()
}

fn default_true() -> bool {
    true
}
