//! Route pattern normalization.
//!
//! Frameworks spell route parameters differently. Everything is rewritten to
//! a single `{name}` placeholder syntax:
//!
//! | Source                     | Example             | Normalized      |
//! |----------------------------|---------------------|-----------------|
//! | Next.js brackets           | `/files/[...path]`  | `/files/{path}` |
//! | OpenAPI / Hono braces      | `/users/{id?}`      | `/users/{id}`   |
//! | Express / Fastify colons   | `/users/:id(\d+)`   | `/users/{id}`   |
//! | Remix dollars              | `/posts/$slug`      | `/posts/{slug}` |
//! | Wildcards                  | `/static/*`         | `/static/{wildcard}` |
//!
//! Leading method tokens (`GET /users`), query strings and fragments are
//! stripped, and empty input becomes `/`.

use std::sync::LazyLock;

use regex::Regex;

/// Placeholder used for anonymous wildcard segments.
pub const WILDCARD: &str = "{wildcard}";

/// `METHOD <whitespace>` prefix, case-insensitive.
static METHOD_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(GET|HEAD|POST|PUT|PATCH|DELETE|OPTIONS|TRACE|CONNECT|QUERY|ALL|ANY)\s+")
        .expect("method prefix regex")
});

/// Normalize a raw route string into canonical `{name}` syntax.
pub fn normalize_route(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_method = METHOD_PREFIX.replace(trimmed, "");
    let path = strip_origin(without_method.trim());
    let path = strip_query_and_fragment(path);

    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_segment)
        .collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut out = String::with_capacity(path.len() + 8);
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Drop `scheme://authority` from absolute URLs.
fn strip_origin(s: &str) -> &str {
    match s.find("://") {
        Some(idx) if !s[..idx].contains('/') => {
            let rest = &s[idx + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        _ => s,
    }
}

/// Cut at the first `?` or `#` outside any bracket group.
///
/// A `?` directly after a `:name` / `$name` parameter and followed by `/` or
/// the end of input is an optional marker, not a query.
fn strip_query_and_fragment(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut segment_start = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth = depth.saturating_sub(1),
            b'/' if depth == 0 => segment_start = i + 1,
            b'#' if depth == 0 => return &s[..i],
            b'?' if depth == 0 => {
                let is_param = matches!(bytes.get(segment_start), Some(b':' | b'$'))
                    && i > segment_start + 1;
                let at_boundary = matches!(bytes.get(i + 1), None | Some(b'/'));
                if !(is_param && at_boundary) {
                    return &s[..i];
                }
            }
            _ => {}
        }
    }

    s
}

fn normalize_segment(segment: &str) -> String {
    if segment.bytes().all(|b| b == b'*') {
        return WILDCARD.to_string();
    }

    let name = match segment.as_bytes()[0] {
        b'[' => {
            let inner = segment.trim_start_matches('[');
            Some(inner.trim_start_matches("..."))
        }
        b'{' => {
            let inner = &segment[1..];
            Some(inner.trim_start_matches("...").trim_start_matches(|c: char| c == '*' || c == '+'))
        }
        b':' | b'$' => Some(&segment[1..]),
        b'*' => Some(&segment[1..]),
        _ => None,
    };

    match name {
        Some(rest) => {
            let name = param_name(rest);
            if name.is_empty() {
                WILDCARD.to_string()
            } else {
                format!("{{{}}}", name)
            }
        }
        None => segment.to_string(),
    }
}

/// Longest leading run of `[A-Za-z0-9_-]`.
fn param_name(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(s.len());
    &s[..end]
}
