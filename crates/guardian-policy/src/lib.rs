//! # guardian-policy
//!
//! The decision chokepoint for gated operations.
//!
//! A caller asks [`PolicyEngine::check`] whether `(scope, operation)` may
//! run in the current context. The engine resolves the effective policy,
//! evaluates its conditions, consults the grant store for a covering
//! single-use grant, and answers with [`CheckDecision::Admit`] or
//! [`CheckDecision::ApprovalRequired`] carrying the resolved policy.
//!
//! The one deliberately asymmetric rule lives here: a remote that *looks
//! like a URL* always satisfies a `remote_patterns` condition, so a
//! name-based allowlist ("origin") can never silently admit a push to an
//! explicit URL. Ambiguity resolves toward requiring approval.

pub mod conditions;
pub mod engine;
pub mod error;

pub use engine::{CheckDecision, PolicyEngine};
pub use error::PolicyError;

// The context type is defined next to grant matching; re-export it so
// callers of `check` don't need a direct guardian-grants dependency.
pub use guardian_grants::OperationContext;
