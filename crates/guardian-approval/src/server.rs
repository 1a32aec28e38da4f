// server.rs — Approval server lifecycle and the terminal-state latch.
//
// One server gates one approval session. Three concurrent units run per
// server: the HTTP accept loop (axum with graceful shutdown), the expiry
// timer, and a supervisor that drains the listener and performs cleanup
// exactly once. HTTP posts, the timer, and external cancellation all race
// toward a single terminal transition; whichever lands first wins and
// everything later is a no-op.
//
// Cross-process coordination stays on the filesystem: the grant minted on
// approve is published atomically by the grant store, and the registry
// record is retracted during cleanup.

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::sync::watch;

use guardian_audit::{AuditAction, AuditEvent, AuditSink, NullSink};
use guardian_config::{GrantSettings, SecuritySettings};
use guardian_grants::{random_token, Grant, GrantStore};
use guardian_registry::{ServerRecord, ServerRegistry};

use crate::browser;
use crate::error::ApprovalError;
use crate::routes;
use crate::session::ApprovalSession;
use crate::terminal;

/// Registry name under which every approval server publishes itself.
pub const SERVER_NAME: &str = "guardian";

/// How many random ports to try before falling back to an OS-assigned one.
const PORT_ATTEMPTS: usize = 25;

/// Grace period for in-flight requests once shutdown is triggered.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Delay between a decision and shutdown, so the browser can render the
/// confirmation before the listener disappears.
const SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Terminal states of one approval session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Approved,
    Denied,
    Expired,
    Cancelled,
    InternalError(String),
}

impl Outcome {
    pub(crate) fn status(&self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Denied => "denied",
            Outcome::Expired => "expired",
            Outcome::Cancelled => "cancelled",
            Outcome::InternalError(_) => "error",
        }
    }
}

/// Result of an approve attempt through the HTTP surface.
pub(crate) enum ApproveResult {
    /// This request won the race; a grant was minted.
    Approved(Grant),
    /// A terminal transition already happened; carries its status label.
    AlreadySettled(&'static str),
    /// This request won the race but the grant could not be written.
    Failed,
}

/// Result of a deny attempt through the HTTP surface.
pub(crate) enum DenyResult {
    Denied,
    AlreadySettled(&'static str),
}

struct Flags {
    completed: bool,
}

/// State shared by the route handlers and the background tasks.
pub(crate) struct ServerState {
    pub(crate) session: ApprovalSession,
    pub(crate) nonce: String,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) grants: GrantStore,
    pub(crate) grant_settings: GrantSettings,
    pub(crate) audit: Arc<dyn AuditSink>,
    /// Chosen page template, validated once per session.
    pub(crate) template: OnceLock<&'static str>,
    flags: Mutex<Flags>,
    outcome_tx: watch::Sender<Option<Outcome>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ServerState {
    /// Attempt the terminal transition. Returns true when this call won.
    pub(crate) fn complete(&self, outcome: Outcome) -> bool {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if flags.completed {
            return false;
        }
        flags.completed = true;
        drop(flags);
        let _ = self.outcome_tx.send(Some(outcome));
        true
    }

    /// Status label of the settled outcome ("running" before settlement).
    pub(crate) fn status(&self) -> &'static str {
        match self.outcome_tx.borrow().as_ref() {
            Some(outcome) => outcome.status(),
            None => "running",
        }
    }

    /// Handle a confirm: mint the grant and settle the session, atomically
    /// with respect to a racing deny/expiry.
    pub(crate) fn approve(self: &Arc<Self>) -> ApproveResult {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if flags.completed {
            drop(flags);
            return ApproveResult::AlreadySettled(self.status());
        }

        // Mint before announcing success; the flags lock keeps a racing
        // deny from interleaving. No await happens under the lock.
        let minted = self
            .grants
            .mint(&self.session.policy, &self.session.context, &self.grant_settings);
        flags.completed = true;
        drop(flags);

        match minted {
            Ok(grant) => {
                let _ = self.outcome_tx.send(Some(Outcome::Approved));
                self.audit.record(
                    AuditEvent::new(AuditAction::ApprovalGranted, &self.session.scope, &self.session.operation)
                        .with_actor(self.session.context.user.clone())
                        .with_grant_id(&grant.id)
                        .with_details(serde_json::json!({
                            "method": self.session.policy.method.to_string(),
                        })),
                );
                self.schedule_shutdown(SETTLE_DELAY);
                ApproveResult::Approved(grant)
            }
            Err(err) => {
                tracing::error!(error = %err, "grant mint failed after approval");
                let _ = self.outcome_tx.send(Some(Outcome::InternalError(err.to_string())));
                self.schedule_shutdown(Duration::ZERO);
                ApproveResult::Failed
            }
        }
    }

    /// Handle a deny.
    pub(crate) fn deny(self: &Arc<Self>) -> DenyResult {
        if self.complete(Outcome::Denied) {
            self.audit.record(
                AuditEvent::new(AuditAction::ApprovalDenied, &self.session.scope, &self.session.operation)
                    .with_actor(self.session.context.user.clone())
                    .with_details(serde_json::json!({
                        "method": self.session.policy.method.to_string(),
                    })),
            );
            self.schedule_shutdown(SETTLE_DELAY);
            DenyResult::Denied
        } else {
            DenyResult::AlreadySettled(self.status())
        }
    }

    /// Bare state for router tests; no background tasks run.
    #[cfg(test)]
    pub(crate) fn for_tests(
        session: ApprovalSession,
        nonce: String,
        grants: GrantStore,
        grant_settings: GrantSettings,
        audit: Arc<dyn AuditSink>,
        outcome_tx: watch::Sender<Option<Outcome>>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            session,
            nonce,
            started_at: Utc::now(),
            grants,
            grant_settings,
            audit,
            template: OnceLock::new(),
            flags: Mutex::new(Flags { completed: false }),
            outcome_tx,
            shutdown_tx,
        }
    }

    fn schedule_shutdown(self: &Arc<Self>, delay: Duration) {
        let state = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = state.shutdown_tx.send(true);
        });
    }
}

/// Factory for approval servers, keyed by the user home.
pub struct ApprovalServer {
    home: PathBuf,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalServer {
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
            audit: Arc::new(NullSink),
        }
    }

    /// Attach an audit sink; approval and grant events flow through it.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Bind a loopback listener, publish the server record, start the
    /// background tasks, and print the terminal instructions.
    ///
    /// A bind failure aborts with `Listener` and leaves no registry entry
    /// behind.
    pub async fn start(
        &self,
        session: ApprovalSession,
        security: &SecuritySettings,
    ) -> Result<ApprovalHandle, ApprovalError> {
        let registry = ServerRegistry::new(&self.home)?;
        let grants = GrantStore::new(&self.home)?.with_audit(self.audit.clone());

        if !security.browser_approval.localhost_only {
            tracing::warn!("localhost_only=false is ignored; the approval server binds loopback only");
        }

        let listener = allocate_listener(security.browser_approval.port_range).await?;
        let port = listener.local_addr().map_err(ApprovalError::Listener)?.port();
        let nonce = random_token();
        let url = format!("http://127.0.0.1:{}/approve/{}", port, nonce);

        let record = ServerRecord::new(SERVER_NAME, port, env!("CARGO_PKG_VERSION"))
            .with_meta("scope", &session.scope)
            .with_meta("operation", &session.operation)
            .with_meta("method", session.policy.method.to_string())
            .with_meta("project", &session.project_name)
            .with_meta("machine", machine_name());
        registry.save(&record)?;

        self.audit.record(
            AuditEvent::new(AuditAction::ApprovalRequested, &session.scope, &session.operation)
                .with_actor(session.context.user.clone())
                .with_outcome("pending"),
        );

        let effective = session.effective_expiry();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let state = Arc::new(ServerState {
            session,
            nonce: nonce.clone(),
            started_at: record.started_at,
            grants,
            grant_settings: security.grants.clone(),
            audit: self.audit.clone(),
            template: OnceLock::new(),
            flags: Mutex::new(Flags { completed: false }),
            outcome_tx,
            shutdown_tx,
        });

        let app = routes::router(state.clone());

        // Accept loop with graceful shutdown on the latch trigger.
        let mut graceful_rx = shutdown_rx.clone();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.wait_for(|fired| *fired).await;
            })
            .into_future();

        // Supervisor: bound the drain, normalize transport errors, then
        // clean up exactly once (registry retraction, listener close).
        let supervisor_state = state.clone();
        let mut drain_rx = shutdown_rx;
        tokio::spawn(async move {
            tokio::pin!(serve);
            let result = tokio::select! {
                res = &mut serve => res,
                _ = async {
                    let _ = drain_rx.wait_for(|fired| *fired).await;
                    tokio::time::sleep(SHUTDOWN_DRAIN).await;
                } => {
                    tracing::warn!("approval server did not drain in time; closing");
                    Ok(())
                }
            };
            if let Err(err) = result {
                // A clean shutdown surfaces as Ok from axum; anything else
                // is a real transport failure.
                tracing::error!(error = %err, "approval server transport error");
                supervisor_state.complete(Outcome::InternalError(err.to_string()));
            }
            // Listener gone without a decision (shouldn't happen, but the
            // latch must never stay open): settle as cancelled.
            supervisor_state.complete(Outcome::Cancelled);
            if supervisor_state.grant_settings.auto_cleanup {
                if let Err(err) = supervisor_state.grants.cleanup() {
                    tracing::debug!(error = %err, "grant cleanup on shutdown failed");
                }
            }
            if let Err(err) = registry.remove(SERVER_NAME) {
                tracing::warn!(error = %err, "failed to retract server record");
            }
            let _ = done_tx.send(true);
        });

        // Single-shot expiry timer.
        if !effective.is_zero() {
            let timer_state = state.clone();
            let mut timer_shutdown = timer_state.shutdown_tx.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(effective) => {
                        if timer_state.complete(Outcome::Expired) {
                            timer_state.audit.record(
                                AuditEvent::new(
                                    AuditAction::ApprovalExpired,
                                    &timer_state.session.scope,
                                    &timer_state.session.operation,
                                )
                                .with_outcome("expired"),
                            );
                            let _ = timer_state.shutdown_tx.send(true);
                        }
                    }
                    _ = timer_shutdown.wait_for(|fired| *fired) => {}
                }
            });
        }

        let auto_open = browser::auto_open_enabled(security.browser_approval.auto_open_browser);
        let mut open_failed = false;
        if auto_open {
            if let Err(err) = browser::open_in_browser(&url) {
                tracing::debug!(error = %err, "browser auto-open failed");
                open_failed = true;
            }
        }

        let block = if security.browser_approval.show_url_in_terminal {
            terminal::render_instructions(&state.session, &url, true, open_failed)
        } else {
            terminal::render_minimal(&state.session)
        };
        eprint!("{}", block);

        tracing::debug!(port, nonce = %nonce, "approval server listening");

        Ok(ApprovalHandle {
            url,
            port,
            effective,
            state,
            outcome_rx,
            done_rx,
        })
    }
}

/// Handle to a running approval server. Cheap to share by reference;
/// `wait()` may be called concurrently and every caller sees the same
/// outcome.
pub struct ApprovalHandle {
    url: String,
    port: u16,
    effective: Duration,
    state: Arc<ServerState>,
    outcome_rx: watch::Receiver<Option<Outcome>>,
    done_rx: watch::Receiver<bool>,
}

impl ApprovalHandle {
    /// The nonce-bearing approval URL.
    pub fn approval_url(&self) -> &str {
        &self.url
    }

    /// The bound loopback port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The wall-clock window the session stays open.
    pub fn effective_expiry(&self) -> Duration {
        self.effective
    }

    /// Block until the session settles and cleanup has run.
    pub async fn wait(&self) -> Result<(), ApprovalError> {
        let mut done = self.done_rx.clone();
        let _ = done.wait_for(|finished| *finished).await;

        let outcome = self
            .outcome_rx
            .borrow()
            .clone()
            .unwrap_or(Outcome::Cancelled);
        match outcome {
            Outcome::Approved => Ok(()),
            Outcome::Denied => Err(ApprovalError::Denied),
            Outcome::Expired => Err(ApprovalError::Expired),
            Outcome::Cancelled => Err(ApprovalError::Cancelled),
            Outcome::InternalError(msg) => Err(ApprovalError::Internal(msg)),
        }
    }

    /// Cancel the session (idempotent) and join cleanup. A session that
    /// already settled keeps its outcome.
    pub async fn shutdown(&self) {
        self.state.complete(Outcome::Cancelled);
        let _ = self.state.shutdown_tx.send(true);
        let mut done = self.done_rx.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

/// Bind a loopback listener: up to 25 random samples from the configured
/// range, then an OS-assigned ephemeral port.
async fn allocate_listener(range: [u16; 2]) -> Result<TcpListener, ApprovalError> {
    let [min, max] = range;
    if min != 0 && max >= min {
        let candidates: Vec<u16> = {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            (0..PORT_ATTEMPTS).map(|_| rng.gen_range(min..=max)).collect()
        };
        for port in candidates {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
                return Ok(listener);
            }
        }
        tracing::debug!("configured port range exhausted, using an ephemeral port");
    }
    TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(ApprovalError::Listener)
}

fn machine_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
