// event.rs — Audit event data model.
//
// Each gated operation leaves a trail: the check that resolved, the approval
// that was requested and how it ended, and every grant lifecycle change.
// Events form a chain: each one carries the hash of the previous log line,
// so insertions and deletions are detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of action this event records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A policy check resolved (admit, approval required, or not enforced).
    CheckResolved,
    /// An interactive approval flow started.
    ApprovalRequested,
    /// The user approved the pending operation.
    ApprovalGranted,
    /// The user denied the pending operation.
    ApprovalDenied,
    /// The approval window elapsed without a decision.
    ApprovalExpired,
    /// A single-use grant was written to disk.
    GrantMinted,
    /// A grant matched a check and was consumed (deleted).
    GrantConsumed,
    /// A grant was explicitly revoked.
    GrantRevoked,
}

/// A single audit event — one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this event.
    pub event_id: Uuid,

    /// When this event occurred (UTC).
    pub timestamp: DateTime<Utc>,

    /// What kind of action was performed.
    pub action: AuditAction,

    /// The scope of the gated operation (e.g., "git").
    pub scope: String,

    /// The operation within the scope (e.g., "push").
    pub operation: String,

    /// The user the operation ran as, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Short outcome description (e.g., "admit", "approval_required").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// The grant this event concerns, for grant lifecycle actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,

    /// Hash of the previous event line in the log (for tamper detection).
    /// The first event in the log has this set to None.
    pub previous_hash: Option<String>,

    /// Arbitrary additional data.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl AuditEvent {
    /// Create a new audit event with the current timestamp and a random UUID.
    pub fn new(action: AuditAction, scope: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            scope: scope.into(),
            operation: operation.into(),
            actor: None,
            outcome: None,
            grant_id: None,
            previous_hash: None,
            details: serde_json::Value::Null,
        }
    }

    /// Set the acting user and return self (builder pattern).
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        let actor = actor.into();
        if !actor.is_empty() {
            self.actor = Some(actor);
        }
        self
    }

    /// Set the outcome label and return self.
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Set the grant id and return self.
    pub fn with_grant_id(mut self, grant_id: impl Into<String>) -> Self {
        self.grant_id = Some(grant_id.into());
        self
    }

    /// Set arbitrary detail data and return self.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
