// check.rs — The gate itself: check, and approve interactively if needed.
//
// This is the command git hooks call. On "approval required" it starts the
// loopback approval server and blocks on the outcome; on approval the
// minted grant stays on disk so the hook's re-entry admits exactly once.

use std::path::Path;
use std::sync::Arc;

use guardian_approval::{ApprovalError, ApprovalServer, ApprovalSession};
use guardian_audit::{AuditSink, JsonlSink, NullSink};
use guardian_config::{ApprovalMethod, ConfigStore};
use guardian_grants::OperationContext;
use guardian_policy::{CheckDecision, PolicyEngine};

pub async fn run(
    home: &Path,
    scope: &str,
    operation: &str,
    ctx: OperationContext,
    reason: Option<String>,
    no_browser: bool,
) -> i32 {
    let audit = audit_sink(home);

    let engine = match PolicyEngine::new(home) {
        Ok(engine) => engine.with_audit(audit.clone()),
        Err(err) => {
            eprintln!("guardian: {:#}", anyhow::Error::from(err));
            return 3;
        }
    };

    let policy = match engine.check(scope, operation, &ctx) {
        Ok(CheckDecision::Admit) => {
            println!("admitted: {}.{}", scope, operation);
            return 0;
        }
        Ok(CheckDecision::ApprovalRequired(policy)) => policy,
        Err(err) => {
            eprintln!("guardian: {:#}", anyhow::Error::from(err));
            return 3;
        }
    };

    if policy.require_reason && reason.as_deref().unwrap_or("").trim().is_empty() {
        eprintln!(
            "guardian: {}.{} requires a reason (pass --reason)",
            scope, operation
        );
        return 3;
    }

    if policy.method == ApprovalMethod::Grant {
        eprintln!(
            "guardian: {}.{} only accepts pre-issued grants and none covers this invocation",
            scope, operation
        );
        return 1;
    }

    if no_browser {
        eprintln!("guardian: approval required for {}.{} (--no-browser set)", scope, operation);
        return 1;
    }

    let security = match ConfigStore::new(home).security() {
        Ok(security) => security,
        Err(err) => {
            eprintln!("guardian: {:#}", anyhow::Error::from(err));
            return 3;
        }
    };

    let session = ApprovalSession::new(
        policy,
        ctx,
        reason,
        &security.browser_approval,
        &security.branding,
    );

    let server = ApprovalServer::new(home).with_audit(audit);
    let handle = match server.start(session, &security).await {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("guardian: {:#}", anyhow::Error::from(err));
            return 3;
        }
    };

    // Ctrl-C is the external cancellation path.
    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            handle.shutdown().await;
            handle.wait().await
        }
    };

    match outcome {
        Ok(()) => {
            println!("approved: {}.{}", scope, operation);
            0
        }
        Err(ApprovalError::Denied) => {
            eprintln!("guardian: {}", ApprovalError::Denied);
            1
        }
        Err(err @ (ApprovalError::Expired | ApprovalError::Cancelled)) => {
            eprintln!("guardian: {}", err);
            2
        }
        Err(err) => {
            eprintln!("guardian: {:#}", anyhow::Error::from(err));
            3
        }
    }
}

/// The production audit sink: hash-chained JSONL under the home. An
/// unopenable audit file degrades to no auditing rather than blocking the
/// gate.
fn audit_sink(home: &Path) -> Arc<dyn AuditSink> {
    let path = home.join("guardian").join("audit.log");
    match JsonlSink::open(&path) {
        Ok(sink) => Arc::new(sink),
        Err(err) => {
            tracing::warn!(error = %err, "audit log unavailable, events will be dropped");
            Arc::new(NullSink)
        }
    }
}
