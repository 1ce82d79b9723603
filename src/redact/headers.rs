//! Header value rewriting.

/// Redact one header value according to the header's semantics.
///
/// - `authorization` / `proxy-authorization`: keep the scheme token
/// - `cookie`: redact every pair's value, keep names and separators
/// - `set-cookie`: redact the leading pair, keep attributes verbatim
/// - anything else: replace wholesale
pub fn redact_header_value(name: &str, value: &str, replacement: &str) -> String {
    match name {
        "authorization" | "proxy-authorization" => redact_credentials(value, replacement),
        "cookie" => redact_cookie(value, replacement),
        "set-cookie" => redact_set_cookie(value, replacement),
        _ => replacement.to_string(),
    }
}

/// `Bearer abc` -> `Bearer [REDACTED]`. A bare token is replaced wholesale.
pub fn redact_credentials(value: &str, replacement: &str) -> String {
    let trimmed = value.trim();
    if trimmed == replacement {
        return trimmed.to_string();
    }

    match trimmed.split_once(char::is_whitespace) {
        Some((scheme, credential)) if !credential.trim().is_empty() => {
            format!("{} {}", scheme, replacement)
        }
        _ => replacement.to_string(),
    }
}

/// `a=1; b=2` -> `a=[REDACTED]; b=[REDACTED]`.
///
/// Segments without a usable `name=` are replaced entirely so that a
/// malformed or cut-off pair cannot leak through as a "name".
pub fn redact_cookie(value: &str, replacement: &str) -> String {
    value
        .split(';')
        .map(|segment| redact_cookie_pair(segment, replacement))
        .collect::<Vec<_>>()
        .join(";")
}

/// `sid=abc; Path=/; HttpOnly` -> `sid=[REDACTED]; Path=/; HttpOnly`.
pub fn redact_set_cookie(value: &str, replacement: &str) -> String {
    match value.split_once(';') {
        Some((pair, attributes)) => {
            format!("{};{}", redact_cookie_pair(pair, replacement), attributes)
        }
        None => redact_cookie_pair(value, replacement),
    }
}

fn redact_cookie_pair(segment: &str, replacement: &str) -> String {
    let content = segment.trim_start();
    let leading = &segment[..segment.len() - content.len()];

    if content.trim().is_empty() {
        return segment.to_string();
    }

    match content.split_once('=') {
        Some((name, _)) if !name.trim().is_empty() => {
            format!("{}{}={}", leading, name, replacement)
        }
        _ => format!("{}{}", leading, replacement),
    }
}
