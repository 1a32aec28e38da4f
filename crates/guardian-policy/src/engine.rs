// engine.rs — Policy evaluation engine.
//
// Every gated operation passes through `check()`, which decides one of:
//
// 1. Scope/operation not enforced → Admit (no policy attached)
// 2. A known condition fails → Admit (the policy does not apply here)
// 3. A covering single-use grant exists → consume it, Admit
// 4. Otherwise → ApprovalRequired carrying the resolved policy
//
// Step 3 is what lets a git hook re-enter Guardian immediately after an
// interactive approval and proceed without a second prompt — exactly once.

use std::path::Path;
use std::sync::Arc;

use guardian_audit::{AuditAction, AuditEvent, AuditSink, NullSink};
use guardian_config::{resolve_document, ConfigStore, ResolvedPolicy};
use guardian_grants::{GrantStore, OperationContext};

use crate::conditions::conditions_apply;
use crate::error::PolicyError;

/// The outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDecision {
    /// The operation may proceed. No policy requirement is attached.
    Admit,
    /// A human must approve through the resolved policy's method.
    ApprovalRequired(ResolvedPolicy),
}

/// The policy engine — resolves config and consults grants for one home.
pub struct PolicyEngine {
    config: ConfigStore,
    grants: GrantStore,
    audit: Arc<dyn AuditSink>,
}

impl PolicyEngine {
    /// Create an engine rooted at the given home directory.
    pub fn new(home: impl AsRef<Path>) -> Result<Self, PolicyError> {
        Ok(Self {
            config: ConfigStore::new(home.as_ref()),
            grants: GrantStore::new(home.as_ref())?,
            audit: Arc::new(NullSink),
        })
    }

    /// Attach an audit sink; grant lifecycle events flow through it too.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.grants = self.grants.with_audit(audit.clone());
        self.audit = audit;
        self
    }

    /// Evaluate `(scope, operation)` in `ctx`.
    pub fn check(
        &self,
        scope: &str,
        operation: &str,
        ctx: &OperationContext,
    ) -> Result<CheckDecision, PolicyError> {
        let root = self.config.load()?;
        let policy = match resolve_document(&root.guardian, scope, operation)? {
            Some(policy) => policy,
            None => {
                tracing::debug!(scope, operation, "not enforced");
                return Ok(CheckDecision::Admit);
            }
        };

        tracing::debug!(
            scope,
            operation,
            method = %policy.method,
            expires = ?policy.expires,
            risk = %policy.risk,
            "policy resolved"
        );

        if !conditions_apply(&policy.conditions, ctx) {
            self.audit_check(&policy, ctx, "conditions_not_met", root.guardian.defaults.audit_all);
            return Ok(CheckDecision::Admit);
        }

        if let Some(grant) = self.grants.consume(scope, operation, ctx)? {
            tracing::debug!(grant_id = %grant.id, scope, operation, "admitted via grant");
            self.audit_check(&policy, ctx, "admit_via_grant", root.guardian.defaults.audit_all);
            return Ok(CheckDecision::Admit);
        }

        self.audit_check(&policy, ctx, "approval_required", root.guardian.defaults.audit_all);
        Ok(CheckDecision::ApprovalRequired(policy))
    }

    /// The grant store backing this engine.
    pub fn grants(&self) -> &GrantStore {
        &self.grants
    }

    fn audit_check(
        &self,
        policy: &ResolvedPolicy,
        ctx: &OperationContext,
        outcome: &str,
        audit_all: bool,
    ) {
        if !audit_all {
            return;
        }
        self.audit.record(
            AuditEvent::new(AuditAction::CheckResolved, &policy.scope, &policy.operation)
                .with_actor(ctx.user.clone())
                .with_outcome(outcome)
                .with_details(serde_json::json!({
                    "method": policy.method.to_string(),
                    "risk": policy.risk,
                })),
        );
    }
}
