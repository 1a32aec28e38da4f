//! # guardian-cli
//!
//! Command-line interface for Guardian, the local operation gate.
//!
//! - `guardian check <scope> <operation>` — gate an operation, approving
//!   interactively through the loopback browser flow when required
//! - `guardian grants list/revoke/cleanup` — manage single-use grants
//! - `guardian servers list/probe` — inspect live approval servers
//! - `guardian config init/show` — manage the policy document
//! - `guardian audit verify/tail` — inspect the tamper-evident audit trail
//!
//! Exit codes from `check`: 0 admitted/approved, 1 denied, 2 expired or
//! cancelled, 3 configuration or internal errors.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guardian_config::guardian_home;

/// Guardian CLI — approval gate for high-risk operations.
#[derive(Parser)]
#[command(name = "guardian", version, about)]
struct Cli {
    /// Home directory rooting Guardian state (defaults to GUARDIAN_HOME,
    /// then the platform home).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an operation may run; suspend for approval if needed.
    Check {
        /// Scope of the operation (e.g., "git").
        scope: String,
        /// Operation within the scope (e.g., "push").
        operation: String,
        /// Current branch, when applicable.
        #[arg(long, default_value = "")]
        branch: String,
        /// Remote name or URL, when applicable.
        #[arg(long, default_value = "")]
        remote: String,
        /// User the operation runs as.
        #[arg(long, default_value = "")]
        user: String,
        /// Why this operation should be approved.
        #[arg(long)]
        reason: Option<String>,
        /// Fail instead of starting the interactive approval flow.
        #[arg(long)]
        no_browser: bool,
    },
    /// Manage single-use grants.
    Grants {
        #[command(subcommand)]
        command: commands::grants::GrantCommands,
    },
    /// Inspect live approval servers.
    Servers {
        #[command(subcommand)]
        command: commands::servers::ServerCommands,
    },
    /// Manage the policy document.
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so hooks capturing stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let home = match cli.home.map(Ok).unwrap_or_else(guardian_home) {
        Ok(home) => home,
        Err(err) => {
            eprintln!("guardian: {}", err);
            std::process::exit(3);
        }
    };

    let code = match cli.command {
        Commands::Check {
            scope,
            operation,
            branch,
            remote,
            user,
            reason,
            no_browser,
        } => {
            commands::check::run(
                &home,
                &scope,
                &operation,
                guardian_grants::OperationContext::new(branch, remote, user),
                reason,
                no_browser,
            )
            .await
        }
        Commands::Grants { command } => exit_code(commands::grants::run(&home, command)),
        Commands::Servers { command } => exit_code(commands::servers::run(&home, command).await),
        Commands::Config { command } => exit_code(commands::config::run(&home, command)),
        Commands::Audit { command } => exit_code(commands::audit::run(&home, command)),
    };

    std::process::exit(code);
}

fn exit_code(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("guardian: {:#}", err);
            3
        }
    }
}
