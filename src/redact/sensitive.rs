//! Built-in sensitive header classifier.
//!
//! Independent of any configured redaction list. Matches an exact set of
//! credential-bearing headers plus any name containing a sensitive keyword,
//! whatever its spelling (`x-api-key`, `X_API_KEY`, `x.api.key`, `xapikey`).

const EXACT: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
    "x-xsrf-token",
    "x-amz-security-token",
];

/// Keywords in compacted form (separators removed).
const KEYWORDS: &[&str] = &[
    "token",
    "secret",
    "password",
    "passwd",
    "apikey",
    "privatekey",
    "credential",
    "session",
];

/// Whether a header name looks like it carries a credential.
pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return false;
    }
    if EXACT.contains(&lower.as_str()) {
        return true;
    }

    let compact: String = lower
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.' | ' '))
        .collect();

    KEYWORDS.iter().any(|kw| compact.contains(kw))
}
