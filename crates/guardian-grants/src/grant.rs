// grant.rs — Grant record and matching rules.
//
// A grant is a single-use capability: it admits exactly one later check with
// the same (scope, operation) and a context compatible with the one the
// approval was given for. Fields captured at approval time (branch, remote,
// user) pin the grant; absent fields are wildcards.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use guardian_config::{ApprovalMethod, ResolvedPolicy};

/// The runtime context of a gated operation. Any subset may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationContext {
    /// Current branch (e.g., "main"). Empty when not applicable.
    pub branch: String,
    /// Remote name or URL (e.g., "origin", "git@host:x/y.git").
    pub remote: String,
    /// User the operation runs as.
    pub user: String,
}

impl OperationContext {
    pub fn new(
        branch: impl Into<String>,
        remote: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            branch: branch.into(),
            remote: remote.into(),
            user: user.into(),
        }
    }
}

/// A single-use approval artifact, stored as `<id>.json`.
///
/// Readers must tolerate unknown fields; writers omit absent ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// 16 random bytes, hex-encoded.
    pub id: String,

    pub scope: String,
    pub operation: String,

    /// Branch the approval was given for; absent means "any".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// RFC3339 UTC.
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// The method that produced this grant.
    pub method: ApprovalMethod,

    /// Per-grant random token, hex-encoded.
    pub nonce: String,
}

impl Grant {
    /// Mint a grant covering `ctx` for the resolved policy.
    ///
    /// The validity window is `min(policy.expires, max_duration)`, anchored
    /// at `now`.
    pub fn mint(
        policy: &ResolvedPolicy,
        ctx: &OperationContext,
        max_duration: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let window = policy.expires.min(max_duration);
        let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id: random_token(),
            scope: policy.scope.clone(),
            operation: policy.operation.clone(),
            branch: non_empty(&ctx.branch),
            remote: non_empty(&ctx.remote),
            user: non_empty(&ctx.user),
            issued_at: now,
            expires_at: now + window,
            method: policy.method,
            nonce: random_token(),
        }
    }

    /// Whether the grant is expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this grant covers a check for `(scope, operation)` in `ctx`.
    ///
    /// Scope and operation must be identical; every field present on the
    /// grant must equal the corresponding context field, compared
    /// case-insensitively. A pinned field never matches an empty context
    /// value.
    pub fn matches(&self, scope: &str, operation: &str, ctx: &OperationContext) -> bool {
        if self.scope != scope || self.operation != operation {
            return false;
        }
        field_covers(&self.branch, &ctx.branch)
            && field_covers(&self.remote, &ctx.remote)
            && field_covers(&self.user, &ctx.user)
    }
}

fn field_covers(pinned: &Option<String>, actual: &str) -> bool {
    match pinned.as_deref() {
        None | Some("") => true,
        Some(want) => !actual.is_empty() && want.eq_ignore_ascii_case(actual),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// 16 bytes from the OS cryptographic RNG, lowercase hex (32 chars).
/// Used for grant ids and approval-URL nonces.
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn push_policy(expires: Duration) -> ResolvedPolicy {
        ResolvedPolicy {
            scope: "git".to_string(),
            operation: "push".to_string(),
            method: ApprovalMethod::Browser,
            expires,
            require_reason: false,
            risk: "high".to_string(),
            conditions: BTreeMap::new(),
        }
    }

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn mint_clamps_to_max_duration() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(3600));
        let grant = Grant::mint(&policy, &OperationContext::default(), Duration::from_secs(60), now);
        assert_eq!(grant.expires_at, now + chrono::Duration::seconds(60));
    }

    #[test]
    fn mint_keeps_shorter_policy_expiry() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(60));
        let grant = Grant::mint(&policy, &OperationContext::default(), Duration::from_secs(3600), now);
        assert_eq!(grant.expires_at, now + chrono::Duration::seconds(60));
    }

    #[test]
    fn matching_is_case_insensitive_on_pinned_fields() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(900));
        let ctx = OperationContext::new("Main", "Origin", "Alice");
        let grant = Grant::mint(&policy, &ctx, Duration::from_secs(900), now);

        assert!(grant.matches("git", "push", &OperationContext::new("main", "origin", "alice")));
        assert!(!grant.matches("git", "push", &OperationContext::new("develop", "origin", "alice")));
        assert!(!grant.matches("git", "commit", &ctx));
    }

    #[test]
    fn pinned_field_rejects_empty_context() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(900));
        let grant = Grant::mint(
            &policy,
            &OperationContext::new("main", "", ""),
            Duration::from_secs(900),
            now,
        );

        // The grant pinned branch=main; a check without a branch is not covered.
        assert!(!grant.matches("git", "push", &OperationContext::default()));
        // But a check on main with extra context the grant never pinned is.
        assert!(grant.matches("git", "push", &OperationContext::new("main", "origin", "bob")));
    }

    #[test]
    fn unpinned_grant_covers_any_context() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(900));
        let grant = Grant::mint(&policy, &OperationContext::default(), Duration::from_secs(900), now);
        assert!(grant.matches("git", "push", &OperationContext::new("release/1.2", "origin", "x")));
    }

    #[test]
    fn serialization_omits_absent_fields_and_ignores_unknown() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(900));
        let grant = Grant::mint(&policy, &OperationContext::new("main", "", ""), Duration::from_secs(900), now);

        let json = serde_json::to_string(&grant).unwrap();
        assert!(json.contains("\"branch\""));
        assert!(!json.contains("\"remote\""));
        assert!(!json.contains("\"user\""));

        // A newer writer may add fields; they must not break us.
        let patched = json.replacen('{', "{\"issued_by_build\":\"v9\",", 1);
        let restored: Grant = serde_json::from_str(&patched).unwrap();
        assert_eq!(restored.id, grant.id);
        assert_eq!(restored.branch.as_deref(), Some("main"));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let policy = push_policy(Duration::from_secs(10));
        let grant = Grant::mint(&policy, &OperationContext::default(), Duration::from_secs(10), now);
        assert!(!grant.is_expired_at(now));
        assert!(grant.is_expired_at(grant.expires_at));
    }
}
