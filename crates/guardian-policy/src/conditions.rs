// conditions.rs — Condition matching for resolved policies.
//
// A policy's conditions decide whether it applies to this invocation at
// all. When a known condition fails, the policy simply does not apply and
// the operation is admitted without ceremony. The exception is the
// fail-closed remote rule below.
//
// Recognized keys:
//   branches        — ctx.branch must match at least one pattern
//   remote_patterns — ctx.remote must match (alias: remotes)
// Unknown keys always pass, so a newer config does not break older builds.

use std::collections::BTreeMap;

use glob::Pattern;

use guardian_grants::OperationContext;

/// Condition key for branch patterns.
pub const KEY_BRANCHES: &str = "branches";
/// Condition key for remote patterns.
pub const KEY_REMOTE_PATTERNS: &str = "remote_patterns";
/// Accepted alias for `remote_patterns`.
pub const KEY_REMOTES: &str = "remotes";

/// Hosting domains that mark a remote as URL-shaped even without a scheme.
const HOSTING_DOMAINS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "sr.ht",
    "azure.com",
];

/// Evaluate every condition against the context.
///
/// Returns true when the policy applies to this invocation: all known
/// conditions passed. Returns false as soon as one known condition fails.
pub fn conditions_apply(
    conditions: &BTreeMap<String, Vec<String>>,
    ctx: &OperationContext,
) -> bool {
    for (key, patterns) in conditions {
        let passed = match key.as_str() {
            KEY_BRANCHES => branch_condition(patterns, &ctx.branch),
            KEY_REMOTE_PATTERNS | KEY_REMOTES => remote_condition(patterns, &ctx.remote),
            // Forward compatibility: conditions we don't understand pass.
            _ => true,
        };
        if !passed {
            tracing::debug!(condition = %key, "condition failed, policy does not apply");
            return false;
        }
    }
    true
}

/// A remote that looks like a URL rather than a configured remote name.
///
/// Catches scheme URLs (`https://…`), scp-style ssh (`git@host:path`), and
/// anything mentioning a well-known hosting domain.
pub fn is_url_shaped_remote(remote: &str) -> bool {
    if remote.contains("://") {
        return true;
    }
    if remote.starts_with("git@") && remote.contains(':') {
        return true;
    }
    let lower = remote.to_ascii_lowercase();
    HOSTING_DOMAINS.iter().any(|domain| lower.contains(domain))
}

fn branch_condition(patterns: &[String], branch: &str) -> bool {
    if branch.is_empty() {
        // The dimension this condition speaks about isn't present.
        return false;
    }
    any_pattern_matches(patterns, branch)
}

fn remote_condition(patterns: &[String], remote: &str) -> bool {
    if remote.is_empty() {
        return false;
    }
    // Fail-closed: a URL-form remote satisfies the condition no matter what
    // the pattern list says. "origin" in an allowlist must never be read as
    // permission for `https://github.com/x/y.git`.
    if is_url_shaped_remote(remote) {
        return true;
    }
    any_pattern_matches(patterns, remote)
}

/// True when any pattern matches. An empty pattern list matches everything;
/// empty pattern elements are ignored.
fn any_pattern_matches(patterns: &[String], value: &str) -> bool {
    let mut saw_pattern = false;
    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }
        saw_pattern = true;
        if pattern_matches(pattern, value) {
            return true;
        }
    }
    !saw_pattern
}

/// Shell-glob match with literal fallback: a pattern that fails to compile
/// is compared for plain equality instead of being treated as fatal.
fn pattern_matches(pattern: &str, value: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        Err(_) => pattern == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conds(key: &str, patterns: &[&str]) -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert(
            key.to_string(),
            patterns.iter().map(|s| s.to_string()).collect(),
        );
        map
    }

    fn ctx(branch: &str, remote: &str) -> OperationContext {
        OperationContext::new(branch, remote, "")
    }

    #[test]
    fn branch_literal_and_glob() {
        let c = conds(KEY_BRANCHES, &["main", "release/*"]);
        assert!(conditions_apply(&c, &ctx("main", "")));
        assert!(conditions_apply(&c, &ctx("release/1.9", "")));
        assert!(!conditions_apply(&c, &ctx("feature/foo", "")));
    }

    #[test]
    fn branch_matching_is_case_sensitive() {
        let c = conds(KEY_BRANCHES, &["main"]);
        assert!(!conditions_apply(&c, &ctx("Main", "")));
    }

    #[test]
    fn empty_branch_fails_the_condition() {
        let c = conds(KEY_BRANCHES, &["main"]);
        assert!(!conditions_apply(&c, &ctx("", "origin")));
    }

    #[test]
    fn empty_pattern_list_matches_everything() {
        let c = conds(KEY_BRANCHES, &[]);
        assert!(conditions_apply(&c, &ctx("anything", "")));
    }

    #[test]
    fn empty_pattern_elements_are_ignored() {
        let c = conds(KEY_BRANCHES, &["", "main"]);
        assert!(conditions_apply(&c, &ctx("main", "")));
        assert!(!conditions_apply(&c, &ctx("develop", "")));
        // Only empty elements — same as an empty list.
        let only_empty = conds(KEY_BRANCHES, &[""]);
        assert!(conditions_apply(&only_empty, &ctx("develop", "")));
    }

    #[test]
    fn invalid_glob_falls_back_to_literal() {
        // "[" is not a valid glob; it must still match itself literally.
        let c = conds(KEY_BRANCHES, &["["]);
        assert!(conditions_apply(&c, &ctx("[", "")));
        assert!(!conditions_apply(&c, &ctx("main", "")));
    }

    #[test]
    fn remote_name_allowlist() {
        let c = conds(KEY_REMOTE_PATTERNS, &["origin", "upstream"]);
        assert!(conditions_apply(&c, &ctx("", "origin")));
        assert!(!conditions_apply(&c, &ctx("", "fork")));
    }

    #[test]
    fn remotes_alias_is_recognized() {
        let c = conds(KEY_REMOTES, &["origin"]);
        assert!(conditions_apply(&c, &ctx("", "origin")));
    }

    #[test]
    fn empty_remote_fails_the_condition() {
        let c = conds(KEY_REMOTE_PATTERNS, &["origin"]);
        assert!(!conditions_apply(&c, &ctx("main", "")));
    }

    #[test]
    fn url_shaped_remotes_always_satisfy_remote_conditions() {
        let c = conds(KEY_REMOTE_PATTERNS, &["origin", "upstream"]);
        // None of these are in the allowlist; all must still apply the policy.
        for remote in [
            "https://github.com/x/y.git",
            "ssh://git@example.com/x/y.git",
            "git@example.com:x/y.git",
            "github.com/x/y",
            "GITLAB.com/team/repo",
        ] {
            assert!(conditions_apply(&c, &ctx("", remote)), "remote: {remote}");
        }
    }

    #[test]
    fn url_shape_detection() {
        assert!(is_url_shaped_remote("https://github.com/x/y.git"));
        assert!(is_url_shaped_remote("git@host:x/y.git"));
        assert!(is_url_shaped_remote("bitbucket.org/x/y"));
        assert!(!is_url_shaped_remote("origin"));
        assert!(!is_url_shaped_remote("git@nodomain"));
        assert!(!is_url_shaped_remote("upstream"));
    }

    #[test]
    fn unknown_condition_keys_pass() {
        let c = conds("planets", &["mars"]);
        assert!(conditions_apply(&c, &ctx("", "")));
    }

    #[test]
    fn all_known_conditions_must_pass() {
        let mut c = conds(KEY_BRANCHES, &["main"]);
        c.insert(KEY_REMOTE_PATTERNS.to_string(), vec!["origin".to_string()]);

        assert!(conditions_apply(&c, &ctx("main", "origin")));
        assert!(!conditions_apply(&c, &ctx("main", "")));
        assert!(!conditions_apply(&c, &ctx("feature/x", "origin")));
    }
}
