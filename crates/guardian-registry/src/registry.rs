// registry.rs — Filesystem-backed registry of live approval servers.
//
// Records live under `<home>/servers/`, one JSON file per instance name,
// published with write-then-rename so a crashing writer never leaves a
// half-record for `list` to trip over.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RegistryError;
use crate::record::{HelloResponse, ServerRecord};

/// Directory mode for `<home>/servers` on unix.
const DIR_MODE: u32 = 0o750;
/// File mode for server records on unix.
const FILE_MODE: u32 = 0o600;

/// Timeout for `/hello` probes against sibling servers.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Registry of live server records, keyed by the user home.
pub struct ServerRegistry {
    dir: PathBuf,
}

impl ServerRegistry {
    /// Create a registry rooted at the given home. Creates the servers
    /// directory (mode 0750) if it doesn't exist.
    pub fn new(home: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = home.as_ref().join("servers");
        fs::create_dir_all(&dir).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;
        set_mode(&dir, DIR_MODE).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Publish (or replace) a record atomically, mode 0600.
    pub fn save(&self, record: &ServerRecord) -> Result<(), RegistryError> {
        let path = self.record_file(&record.name)?;
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json).map_err(|source| RegistryError::Io {
            path: tmp.clone(),
            source,
        })?;
        set_mode(&tmp, FILE_MODE).map_err(|source| RegistryError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Load a record by name. Missing is `Ok(None)`.
    pub fn load(&self, name: &str) -> Result<Option<ServerRecord>, RegistryError> {
        let path = self.record_file(name)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RegistryError::Io { path, source }),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Retract a record. Removing a missing record is success.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let path = self.record_file(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Io { path, source }),
        }
    }

    /// All records, sorted by name. Unparseable files are skipped.
    pub fn list(&self) -> Result<Vec<ServerRecord>, RegistryError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| RegistryError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RegistryError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(_) => continue,
            };
            match serde_json::from_str::<ServerRecord>(&json) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping unparseable server record");
                }
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Ask the server on `port` who it is.
    pub async fn probe_hello(&self, port: u16) -> Result<HelloResponse, RegistryError> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        let hello = client
            .get(format!("http://127.0.0.1:{}/hello", port))
            .send()
            .await?
            .error_for_status()?
            .json::<HelloResponse>()
            .await?;
        Ok(hello)
    }

    /// Whether `port` can currently be bound on loopback.
    pub fn is_port_available(port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).is_ok()
    }

    /// Path of the registry directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_file(&self, name: &str) -> Result<PathBuf, RegistryError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RegistryError::MalformedName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
