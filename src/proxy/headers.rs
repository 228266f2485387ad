//! Request-header classification for backend forwarding.
//!
//! # Responsibilities
//! - Decide, per header, whether the client's value reaches the backend
//! - Let endpoint allow/strip sets override the built-in tables
//!
//! # Design Decisions
//! - Names compared lowercase, the `http` crate's canonical form
//! - Anything outside the tables is dropped; unknown drops are logged by the
//!   caller so operators can spot legitimate headers to allow

use std::collections::HashSet;

/// Headers copied through to the backend unless stripped.
const PASS_THROUGH: &[&str] = &[
    "accept",
    "accept-language",
    "content-type",
    "authorization",
    "referer",
    "user-agent",
    "cookie",
    "etag",
    "cache-control",
    "if-modified-since",
    "if-unmodified-since",
    "if-match",
    "if-none-match",
];

/// Headers removed without comment: either renegotiated per-hop or
/// meaningless once the proxy re-issues the request.
const SILENT_DROP: &[&str] = &[
    "accept-charset",
    "accept-encoding",
    "accept-datetime",
    "content-md5",
    "via",
    "connection",
];

/// The forwarding decision for one request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    /// Copy the client value to the backend request.
    Pass,
    /// Remove quietly.
    Drop,
    /// Remove and log; the header is outside every table.
    DropUnknown,
}

/// Classifies one header name against the endpoint's overrides and the
/// built-in tables. Strip wins over allow; both win over the defaults.
pub fn classify(name: &str, allow: &HashSet<String>, strip: &HashSet<String>) -> HeaderAction {
    if strip.contains(name) {
        return HeaderAction::Drop;
    }
    if allow.contains(name) {
        return HeaderAction::Pass;
    }
    if PASS_THROUGH.contains(&name) {
        return HeaderAction::Pass;
    }
    if SILENT_DROP.contains(&name) {
        return HeaderAction::Drop;
    }
    HeaderAction::DropUnknown
}

/// Normalizes a configured header-name set to lowercase.
pub fn normalize_set<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn pass_through_table() {
        for name in PASS_THROUGH {
            assert_eq!(
                classify(name, &empty(), &empty()),
                HeaderAction::Pass,
                "{name}"
            );
        }
    }

    #[test]
    fn silent_drop_table() {
        for name in SILENT_DROP {
            assert_eq!(
                classify(name, &empty(), &empty()),
                HeaderAction::Drop,
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_headers_are_dropped_loudly() {
        assert_eq!(
            classify("x-custom-thing", &empty(), &empty()),
            HeaderAction::DropUnknown
        );
    }

    #[test]
    fn allow_overrides_unknown_default() {
        let allow = normalize_set(["X-Custom-Thing"]);
        assert_eq!(
            classify("x-custom-thing", &allow, &empty()),
            HeaderAction::Pass
        );
    }

    #[test]
    fn strip_overrides_pass_through() {
        let strip = normalize_set(["Cookie"]);
        assert_eq!(classify("cookie", &empty(), &strip), HeaderAction::Drop);
    }

    #[test]
    fn strip_wins_over_allow() {
        let allow = normalize_set(["x-thing"]);
        let strip = normalize_set(["x-thing"]);
        assert_eq!(classify("x-thing", &allow, &strip), HeaderAction::Drop);
    }
}
