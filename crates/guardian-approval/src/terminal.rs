// terminal.rs — Terminal instructions for a pending approval.
//
// Renders the ruled block shown when an approval server starts. The block
// carries everything a person needs to act without a browser auto-open:
// what is being gated, where, the approval URL, and how long is left.
// When show_url is disabled the block shrinks to a notice that an approval
// is pending elsewhere.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use chrono::Utc;

use crate::session::ApprovalSession;

const RULE_WIDTH: usize = 62;

/// Render the full instruction block.
pub fn render_instructions(
    session: &ApprovalSession,
    url: &str,
    show_url: bool,
    auto_open_failed: bool,
) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!("  {} APPROVAL REQUIRED\n", session.project_name.to_uppercase()));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    out.push_str(&format!("  Operation: {}.{}\n", session.scope, session.operation));
    out.push_str(&format!("  Machine:   {}\n", machine_name()));
    out.push_str(&format!("  Project:   {}\n", project_folder()));
    if !session.context.branch.is_empty() {
        out.push_str(&format!("  Branch:    {}\n", session.context.branch));
    }
    if !session.context.remote.is_empty() {
        out.push_str(&format!("  Remote:    {}\n", session.context.remote));
    }

    if show_url {
        out.push('\n');
        out.push_str(&format!("  Approve or deny at:\n    {}\n", url));
    }

    out.push('\n');
    out.push_str(&format!(
        "  Time remaining: {}\n",
        format_remaining(session.remaining(Utc::now()))
    ));

    if !session.custom_message.is_empty() {
        out.push_str(&format!("\n  {}\n", session.custom_message));
    }
    if auto_open_failed {
        out.push_str("\n  (could not open a browser automatically)\n");
    }

    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// Render the minimal block used when the URL is hidden from the terminal.
pub fn render_minimal(session: &ApprovalSession) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "  {}: approval pending for {}.{}\n",
        session.project_name, session.scope, session.operation
    ));
    out.push_str(&format!(
        "  Time remaining: {}\n",
        format_remaining(session.remaining(Utc::now()))
    ));
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// `M:SS` formatting for the remaining window.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// The name of this machine, best effort.
fn machine_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// The project folder name: git toplevel when inside a repository,
/// otherwise the basename of the current directory.
fn project_folder() -> String {
    let toplevel = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| PathBuf::from(s.trim()));

    let dir = toplevel.or_else(|| std::env::current_dir().ok());
    dir.and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_config::{ApprovalMethod, Branding, BrowserApproval, ResolvedPolicy};
    use guardian_grants::OperationContext;
    use std::collections::BTreeMap;

    fn session() -> ApprovalSession {
        let policy = ResolvedPolicy {
            scope: "git".to_string(),
            operation: "push".to_string(),
            method: ApprovalMethod::Browser,
            expires: Duration::from_secs(900),
            require_reason: false,
            risk: "high".to_string(),
            conditions: BTreeMap::new(),
        };
        let branding = Branding {
            custom_message: "Protected branch, tread carefully.".to_string(),
            ..Branding::default()
        };
        ApprovalSession::new(
            policy,
            OperationContext::new("main", "origin", "alice"),
            None,
            &BrowserApproval::default(),
            &branding,
        )
    }

    #[test]
    fn full_block_contains_url_and_context() {
        let block = render_instructions(&session(), "http://127.0.0.1:50123/approve/abcd", true, false);
        assert!(block.contains("GUARDIAN APPROVAL REQUIRED"));
        assert!(block.contains("git.push"));
        assert!(block.contains("http://127.0.0.1:50123/approve/abcd"));
        assert!(block.contains("main"));
        assert!(block.contains("Protected branch"));
    }

    #[test]
    fn hidden_url_stays_hidden() {
        let block = render_instructions(&session(), "http://127.0.0.1:50123/approve/abcd", false, false);
        assert!(!block.contains("127.0.0.1"));
    }

    #[test]
    fn minimal_block_omits_everything_sensitive() {
        let block = render_minimal(&session());
        assert!(block.contains("approval pending"));
        assert!(!block.contains("127.0.0.1"));
    }

    #[test]
    fn auto_open_failure_is_noted() {
        let block = render_instructions(&session(), "http://x", true, true);
        assert!(block.contains("could not open a browser"));
    }

    #[test]
    fn remaining_formats_as_minutes_and_seconds() {
        assert_eq!(format_remaining(Duration::from_secs(0)), "0:00");
        assert_eq!(format_remaining(Duration::from_secs(59)), "0:59");
        assert_eq!(format_remaining(Duration::from_secs(61)), "1:01");
        assert_eq!(format_remaining(Duration::from_secs(15 * 60)), "15:00");
    }
}
