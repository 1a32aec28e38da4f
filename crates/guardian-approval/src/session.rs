// session.rs — The state of one interactive approval attempt.
//
// A session is ephemeral: it exists from "approval required" until the
// server reaches a terminal state, and never touches disk. Its effective
// expiry is fixed at construction so every component (timer, terminal
// block, approval page) agrees on the same deadline.

use std::time::Duration;

use chrono::{DateTime, Utc};

use guardian_config::{Branding, BrowserApproval, ResolvedPolicy};
use guardian_grants::OperationContext;

/// Fallback window applied when neither the policy nor the browser settings
/// bound the approval.
const DEFAULT_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Everything one approval attempt needs to render and decide.
#[derive(Debug, Clone)]
pub struct ApprovalSession {
    pub scope: String,
    pub operation: String,
    pub policy: ResolvedPolicy,
    /// Why the caller wants this operation, when the policy demands one.
    pub reason: Option<String>,
    pub context: OperationContext,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub project_name: String,
    pub custom_message: String,
}

impl ApprovalSession {
    /// Build a session for a resolved policy, anchoring the expiry at now.
    pub fn new(
        policy: ResolvedPolicy,
        context: OperationContext,
        reason: Option<String>,
        browser: &BrowserApproval,
        branding: &Branding,
    ) -> Self {
        let now = Utc::now();
        let effective = effective_expiry(policy.expires, browser.timeout());
        let expires_at = now
            + chrono::Duration::from_std(effective).unwrap_or_else(|_| chrono::Duration::minutes(5));

        Self {
            scope: policy.scope.clone(),
            operation: policy.operation.clone(),
            policy,
            reason,
            context,
            requested_at: now,
            expires_at,
            project_name: branding.project_name.clone(),
            custom_message: branding.custom_message.clone(),
        }
    }

    /// The wall-clock window this session stays open.
    pub fn effective_expiry(&self) -> Duration {
        (self.expires_at - self.requested_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Time left as of `now`; zero once past the deadline.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// `min` of the two bounds, ignoring zeroes; 5 minutes when both are zero.
pub fn effective_expiry(policy: Duration, browser_timeout: Duration) -> Duration {
    match (policy.is_zero(), browser_timeout.is_zero()) {
        (true, true) => DEFAULT_EXPIRY,
        (false, true) => policy,
        (true, false) => browser_timeout,
        (false, false) => policy.min(browser_timeout),
    }
}
