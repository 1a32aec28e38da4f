// servers.rs — Server registry subcommands: list, probe.

use std::path::Path;

use anyhow::Context;
use clap::Subcommand;

use guardian_registry::ServerRegistry;

#[derive(Subcommand)]
pub enum ServerCommands {
    /// List registered approval servers.
    List,
    /// Probe a registered server's /hello endpoint.
    Probe {
        /// Registry name (defaults to "guardian").
        #[arg(default_value = "guardian")]
        name: String,
    },
}

pub async fn run(home: &Path, command: ServerCommands) -> anyhow::Result<()> {
    let registry = ServerRegistry::new(home).context("opening server registry")?;

    match command {
        ServerCommands::List => {
            let records = registry.list()?;
            if records.is_empty() {
                println!("no live servers");
                return Ok(());
            }
            for record in records {
                let live = if ServerRegistry::is_port_available(record.port) {
                    "stale"
                } else {
                    "listening"
                };
                println!(
                    "{}  port={}  pid={}  started={}  [{}]",
                    record.name,
                    record.port,
                    record.pid,
                    record.started_at.to_rfc3339(),
                    live,
                );
            }
            Ok(())
        }
        ServerCommands::Probe { name } => {
            let record = registry
                .load(&name)?
                .with_context(|| format!("no record for '{}'", name))?;
            let hello = registry.probe_hello(record.port).await?;
            println!(
                "{} v{} up since {}",
                hello.name,
                hello.version,
                hello.started_at.to_rfc3339()
            );
            Ok(())
        }
    }
}
