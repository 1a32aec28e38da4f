// record.rs — The per-server metadata record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public record for one live approval server, stored as `<name>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerRecord {
    /// Registry key (e.g., "guardian"). One record per instance name.
    pub name: String,

    /// Loopback port the server is listening on.
    pub port: u16,

    /// Process id of the owning process.
    pub pid: u32,

    /// Build version of the owning process.
    pub version: String,

    /// When the server started (RFC3339).
    pub started_at: DateTime<Utc>,

    /// Free-form details: scope, operation, method, project, machine.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ServerRecord {
    /// Create a record for a server that just bound `port`, stamped with the
    /// current process id and time.
    pub fn new(name: impl Into<String>, port: u16, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port,
            pid: std::process::id(),
            version: version.into(),
            started_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Insert one metadata entry and return self (builder pattern).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Body of a `GET /hello` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResponse {
    pub name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() {
        let record = ServerRecord::new("guardian", 50123, "0.6.2")
            .with_meta("scope", "git")
            .with_meta("operation", "push");

        let json = serde_json::to_string(&record).unwrap();
        let restored: ServerRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, record);
        assert_eq!(restored.metadata["scope"], "git");
    }

    #[test]
    fn record_without_metadata_deserializes() {
        let json = r#"{
            "name": "guardian",
            "port": 50123,
            "pid": 1234,
            "version": "0.6.2",
            "started_at": "2026-03-01T10:00:00Z"
        }"#;
        let record: ServerRecord = serde_json::from_str(json).unwrap();
        assert!(record.metadata.is_empty());
    }
}
