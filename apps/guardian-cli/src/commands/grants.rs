// grants.rs — Grant subcommands: list, revoke, cleanup.

use std::path::Path;

use anyhow::Context;
use clap::Subcommand;

use guardian_grants::GrantStore;

#[derive(Subcommand)]
pub enum GrantCommands {
    /// List live grants.
    List,
    /// Revoke a grant by id.
    Revoke {
        /// The grant id (32 hex chars).
        id: String,
    },
    /// Remove expired grants.
    Cleanup,
}

pub fn run(home: &Path, command: GrantCommands) -> anyhow::Result<()> {
    let store = GrantStore::new(home).context("opening grant store")?;

    match command {
        GrantCommands::List => {
            let grants = store.list()?;
            if grants.is_empty() {
                println!("no live grants");
                return Ok(());
            }
            for grant in grants {
                println!(
                    "{}  {}.{}  branch={}  expires={}",
                    grant.id,
                    grant.scope,
                    grant.operation,
                    grant.branch.as_deref().unwrap_or("*"),
                    grant.expires_at.to_rfc3339(),
                );
            }
            Ok(())
        }
        GrantCommands::Revoke { id } => {
            store.revoke(&id).context("revoking grant")?;
            println!("revoked {}", id);
            Ok(())
        }
        GrantCommands::Cleanup => {
            let removed = store.cleanup()?;
            println!("removed {} expired grant(s)", removed);
            Ok(())
        }
    }
}
