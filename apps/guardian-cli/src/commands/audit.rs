// audit.rs — Audit subcommands: verify, tail.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use guardian_audit::AuditLog;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit log hash chain integrity.
    Verify,
    /// Show recent audit events.
    Tail {
        /// Number of events to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn run(home: &Path, command: AuditCommands) -> anyhow::Result<()> {
    let path = audit_path(home);

    match command {
        AuditCommands::Verify => {
            AuditLog::verify_chain(&path).context("verifying audit chain")?;
            println!("audit chain OK: {}", path.display());
            Ok(())
        }
        AuditCommands::Tail { n } => {
            let events = AuditLog::read_all(&path).context("reading audit log")?;
            for event in events.iter().rev().take(n).rev() {
                println!(
                    "{}  {:?}  {}.{}  {}",
                    event.timestamp.to_rfc3339(),
                    event.action,
                    event.scope,
                    event.operation,
                    event.outcome.as_deref().unwrap_or(""),
                );
            }
            Ok(())
        }
    }
}

fn audit_path(home: &Path) -> PathBuf {
    home.join("guardian").join("audit.log")
}
