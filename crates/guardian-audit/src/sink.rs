// sink.rs — Pluggable destinations for audit events.
//
// Guardian's stores and the approval server emit events through the
// AuditSink trait; they never choose where the events land. The CLI wires
// a JsonlSink in production, tests usually pass NullSink.

use std::path::Path;
use std::sync::Mutex;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::log::AuditLog;

/// Destination for audit events.
///
/// Implementations must tolerate being called from multiple threads; the
/// emitting side holds only an `Arc<dyn AuditSink>`.
pub trait AuditSink: Send + Sync {
    /// Record one event. Failures must be contained by the sink — emitters
    /// treat recording as infallible.
    fn record(&self, event: AuditEvent);
}

/// Sink that appends hash-chained JSON Lines to a file.
pub struct JsonlSink {
    log: Mutex<AuditLog>,
}

impl JsonlSink {
    /// Open (or create) the JSONL file backing this sink.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Ok(Self {
            log: Mutex::new(AuditLog::open(path)?),
        })
    }
}

impl AuditSink for JsonlSink {
    fn record(&self, mut event: AuditEvent) {
        let mut log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = log.append(&mut event) {
            // An unwritable audit file must not take the gated operation down.
            tracing::warn!(error = %err, "failed to append audit event");
        }
    }
}

/// Sink that forwards events to the `tracing` infrastructure at info level.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            action = ?event.action,
            scope = %event.scope,
            operation = %event.operation,
            outcome = event.outcome.as_deref().unwrap_or(""),
            grant_id = event.grant_id.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Sink that discards every event.
pub struct NullSink;

impl AuditSink for NullSink {
    fn record(&self, _event: AuditEvent) {}
}
