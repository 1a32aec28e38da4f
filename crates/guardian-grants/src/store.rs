// store.rs — GrantStore: persistence and lifecycle for single-use grants.
//
// Each grant is one JSON file: `<home>/guardian/grants/<id>.json`, mode 0600
// in a 0700 directory. Publication is write-to-temp-then-rename so readers
// never observe a partial file. Consumption is defined by deletion: the
// process whose unlink succeeds owns the approval, which is what makes
// grants single-use across independent processes without any locking.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use guardian_audit::{AuditAction, AuditEvent, AuditSink, NullSink};
use guardian_config::{GrantSettings, ResolvedPolicy};

use crate::error::GrantError;
use crate::grant::{Grant, OperationContext};

/// Directory mode for the grants dir on unix.
const DIR_MODE: u32 = 0o700;
/// File mode for grant records on unix.
const FILE_MODE: u32 = 0o600;

/// Filesystem-backed store for single-use grants, keyed by the user home.
pub struct GrantStore {
    dir: PathBuf,
    audit: Arc<dyn AuditSink>,
}

impl GrantStore {
    /// Create a store rooted at the given home. Creates the grants
    /// directory (mode 0700) if it doesn't exist.
    pub fn new(home: impl AsRef<Path>) -> Result<Self, GrantError> {
        let dir = home.as_ref().join("guardian").join("grants");
        fs::create_dir_all(&dir).map_err(|source| GrantError::Io {
            path: dir.clone(),
            source,
        })?;
        set_mode(&dir, DIR_MODE).map_err(|source| GrantError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            audit: Arc::new(NullSink),
        })
    }

    /// Attach an audit sink for grant lifecycle events.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Mint a grant for the resolved policy and context, and publish it.
    ///
    /// Expired grants are garbage-collected first (when auto_cleanup is on),
    /// then the live count is checked against `max_concurrent`. The record
    /// is written to a temp file and renamed into place.
    pub fn mint(
        &self,
        policy: &ResolvedPolicy,
        ctx: &OperationContext,
        settings: &GrantSettings,
    ) -> Result<Grant, GrantError> {
        if settings.auto_cleanup {
            if let Err(err) = self.cleanup() {
                tracing::warn!(error = %err, "grant cleanup before mint failed");
            }
        }

        let live = self.list()?.len();
        if live >= settings.max_concurrent {
            return Err(GrantError::TooManyGrants {
                live,
                limit: settings.max_concurrent,
            });
        }

        let grant = Grant::mint(policy, ctx, settings.max_duration_parsed(), Utc::now());
        let path = self.grant_file(&grant.id)?;
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(&grant)?;
        fs::write(&tmp, json).map_err(|source| GrantError::Io {
            path: tmp.clone(),
            source,
        })?;
        set_mode(&tmp, FILE_MODE).map_err(|source| GrantError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| GrantError::Io {
            path: path.clone(),
            source,
        })?;

        self.audit.record(
            AuditEvent::new(AuditAction::GrantMinted, &grant.scope, &grant.operation)
                .with_grant_id(&grant.id)
                .with_actor(ctx.user.clone())
                .with_outcome("minted"),
        );
        tracing::debug!(id = %grant.id, scope = %grant.scope, operation = %grant.operation, "grant minted");

        Ok(grant)
    }

    /// Find and consume a grant covering `(scope, operation, ctx)`.
    ///
    /// Enumerates grant files in name order: unparseable files are skipped,
    /// expired ones removed, and the first match is deleted. Deletion *is*
    /// the consumption event — if the unlink fails (including a lost race),
    /// an error is returned and the caller must treat the approval as not
    /// granted.
    pub fn consume(
        &self,
        scope: &str,
        operation: &str,
        ctx: &OperationContext,
    ) -> Result<Option<Grant>, GrantError> {
        let now = Utc::now();

        for path in self.grant_files()? {
            let grant = match self.read_grant(&path) {
                Some(g) => g,
                None => continue,
            };

            if grant.is_expired_at(now) {
                self.remove_quietly(&path);
                continue;
            }

            if grant.matches(scope, operation, ctx) {
                fs::remove_file(&path).map_err(|source| GrantError::ConsumeFailed {
                    id: grant.id.clone(),
                    source,
                })?;

                self.audit.record(
                    AuditEvent::new(AuditAction::GrantConsumed, scope, operation)
                        .with_grant_id(&grant.id)
                        .with_actor(ctx.user.clone())
                        .with_outcome("used"),
                );
                tracing::debug!(id = %grant.id, scope, operation, "grant consumed");
                return Ok(Some(grant));
            }
        }

        Ok(None)
    }

    /// Delete a grant by id. Deleting a missing grant is success.
    pub fn revoke(&self, id: &str) -> Result<(), GrantError> {
        let path = self.grant_file(id)?;
        // Best-effort read so the audit event can name the operation.
        let revoked = self.read_grant(&path);
        match fs::remove_file(&path) {
            Ok(()) => {
                let (scope, operation) = revoked
                    .map(|g| (g.scope, g.operation))
                    .unwrap_or_default();
                self.audit.record(
                    AuditEvent::new(AuditAction::GrantRevoked, scope, operation)
                        .with_grant_id(id)
                        .with_outcome("revoked"),
                );
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(GrantError::Io { path, source }),
        }
    }

    /// Remove every expired grant. Returns how many were removed.
    pub fn cleanup(&self) -> Result<usize, GrantError> {
        let now = Utc::now();
        let mut removed = 0;

        for path in self.grant_files()? {
            if let Some(grant) = self.read_grant(&path) {
                if grant.is_expired_at(now) {
                    self.remove_quietly(&path);
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// List all live (unexpired, parseable) grants, oldest first.
    pub fn list(&self) -> Result<Vec<Grant>, GrantError> {
        let now = Utc::now();
        let mut grants: Vec<Grant> = self
            .grant_files()?
            .into_iter()
            .filter_map(|path| self.read_grant(&path))
            .filter(|g| !g.is_expired_at(now))
            .collect();
        grants.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(grants)
    }

    /// Path of the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Grant file paths in name order. Non-`.json` entries and temp files
    /// are ignored.
    fn grant_files(&self) -> Result<Vec<PathBuf>, GrantError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| GrantError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| GrantError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Read one grant file; a vanished or unparseable file yields None.
    fn read_grant(&self, path: &Path) -> Option<Grant> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            // A sibling process may have consumed it between readdir and read.
            Err(_) => return None,
        };
        match serde_json::from_str(&json) {
            Ok(grant) => Some(grant),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping unparseable grant file");
                None
            }
        }
    }

    fn remove_quietly(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %err, "failed to remove stale grant");
            }
        }
    }

    fn grant_file(&self, id: &str) -> Result<PathBuf, GrantError> {
        // Ids are hex tokens; anything else cannot become a file name.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GrantError::MalformedId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
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
