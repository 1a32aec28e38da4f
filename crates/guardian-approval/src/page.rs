// page.rs — Approval page rendering.
//
// The page is an embedded HTML template with {{placeholder}} substitution.
// The template is checked once per session; if it is missing the
// placeholders the flow depends on, a compiled-in minimal page takes over.
// Raw template problems never reach the HTTP client.

use chrono::SecondsFormat;

use crate::session::ApprovalSession;

/// The full approval page shipped with the binary.
const TEMPLATE: &str = include_str!("../templates/approve.html");

/// Minimal fallback used when the embedded template is unusable.
const FALLBACK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{{project_name}} approval</title></head>
<body>
<h1>{{project_name}}: approve {{scope}}.{{operation}}?</h1>
<form method="post" action="{{confirm_url}}"><button>Approve</button></form>
<form method="post" action="{{deny_url}}"><button>Deny</button></form>
</body></html>
"#;

/// Placeholders the flow cannot work without.
const REQUIRED: &[&str] = &[
    "{{project_name}}",
    "{{scope}}",
    "{{operation}}",
    "{{confirm_url}}",
    "{{deny_url}}",
];

/// Pick the usable template: the embedded one, or the fallback.
pub fn select_template() -> &'static str {
    if REQUIRED.iter().all(|p| TEMPLATE.contains(p)) {
        TEMPLATE
    } else {
        tracing::warn!("embedded approval template unusable, using fallback");
        FALLBACK_TEMPLATE
    }
}

/// Render the approval page for a session. All values are HTML-escaped.
pub fn render(template: &str, session: &ApprovalSession, nonce: &str) -> String {
    let confirm_url = format!("/approve/{}/confirm", nonce);
    let deny_url = format!("/approve/{}/deny", nonce);

    let substitutions = [
        ("{{project_name}}", escape(&session.project_name)),
        ("{{scope}}", escape(&session.scope)),
        ("{{operation}}", escape(&session.operation)),
        ("{{risk}}", escape(or_dash(&session.policy.risk))),
        ("{{branch}}", escape(or_dash(&session.context.branch))),
        ("{{remote}}", escape(or_dash(&session.context.remote))),
        ("{{user}}", escape(or_dash(&session.context.user))),
        ("{{reason}}", escape(or_dash(session.reason.as_deref().unwrap_or("")))),
        ("{{custom_message}}", escape(&session.custom_message)),
        (
            "{{expires_at}}",
            escape(&session.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ),
        ("{{confirm_url}}", confirm_url),
        ("{{deny_url}}", deny_url),
    ];

    let mut page = template.to_string();
    for (placeholder, value) in substitutions {
        page = page.replace(placeholder, &value);
    }
    page
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "—"
    } else {
        s
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
