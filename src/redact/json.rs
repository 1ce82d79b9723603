//! JSON-path redaction over `serde_json::Value`.
//!
//! Supported paths: `.`-separated keys with `[n]` array indices and an
//! optional leading `$` or `$.`, e.g. `$.user.tokens[0]`, `items[2].secret`.

use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Key(String),
    Index(usize),
}

/// Split a path into segments. `None` for an empty path or malformed
/// brackets.
pub(crate) fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(idx) => part.split_at(idx),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let inner = rest[1..close].trim();
            let segment = match inner.parse::<usize>() {
                Ok(idx) => Segment::Index(idx),
                Err(_) => Segment::Key(inner.trim_matches(|c: char| c == '\'' || c == '"').to_string()),
            };
            segments.push(segment);
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }

    (!segments.is_empty()).then_some(segments)
}

/// Replace the value at `segments` with `replacement`. Returns whether
/// anything changed. A missing key, an out-of-range index or a step into a
/// scalar leaves the document untouched.
pub(crate) fn redact_at(root: &mut Value, segments: &[Segment], replacement: &str) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        match step(current, segment) {
            Some(next) => current = next,
            None => return false,
        }
    }

    match step(current, last) {
        Some(target) => {
            if target.as_str() == Some(replacement) {
                return false;
            }
            *target = Value::String(replacement.to_string());
            true
        }
        None => false,
    }
}

fn step<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
        (Value::Array(items), Segment::Index(idx)) => items.get_mut(*idx),
        (Value::Object(_), Segment::Index(_)) | (Value::Array(_), Segment::Key(_)) => None,
        (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_), _) => None,
    }
}

/// Apply all paths to a JSON text. `None` when the text is not JSON or no
/// path matched, so callers keep the original bytes.
pub(crate) fn redact_json_text(text: &str, paths: &[Vec<Segment>], replacement: &str) -> Option<String> {
    let mut doc: Value = serde_json::from_str(text).ok()?;

    let mut changed = false;
    for path in paths {
        changed |= redact_at(&mut doc, path, replacement);
    }

    if !changed {
        return None;
    }
    serde_json::to_string(&doc).ok()
}

/// `application/json` or any `+json` media type.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const R: &str = "[REDACTED]";

    fn paths(list: &[&str]) -> Vec<Vec<Segment>> {
        list.iter().filter_map(|p| parse_path(p)).collect()
    }

    #[test]
    fn test_parse_path_forms() {
        assert_eq!(parse_path("$.token"), Some(vec![Segment::Key("token".into())]));
        assert_eq!(parse_path("token"), parse_path("$.token"));
        assert_eq!(
            parse_path("$.items[2].secret"),
            Some(vec![
                Segment::Key("items".into()),
                Segment::Index(2),
                Segment::Key("secret".into()),
            ])
        );
        assert_eq!(parse_path("$[0][1]"), Some(vec![Segment::Index(0), Segment::Index(1)]));
        assert_eq!(parse_path("$"), None);
        assert_eq!(parse_path("a[1"), None);
        assert_eq!(parse_path("a[1]b"), None);
    }

    #[test]
    fn test_top_level_key_keeps_order() {
        let out = redact_json_text(r#"{"token":"x","keep":"y"}"#, &paths(&["$.token"]), R);
        assert_eq!(out.as_deref(), Some(r#"{"token":"[REDACTED]","keep":"y"}"#));
    }

    #[test]
    fn test_nested_and_indexed() {
        let text = r#"{"user":{"cards":[{"pan":"4111"},{"pan":"5500"}]}}"#;
        let out = redact_json_text(text, &paths(&["$.user.cards[1].pan"]), R).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"user":{"cards":[{"pan":"4111"},{"pan":"[REDACTED]"}]}}));
    }

    #[test]
    fn test_container_replaced_whole() {
        let out = redact_json_text(r#"{"auth":{"a":1},"n":2}"#, &paths(&["auth"]), R);
        assert_eq!(out.as_deref(), Some(r#"{"auth":"[REDACTED]","n":2}"#));
    }

    #[test]
    fn test_missing_or_scalar_paths_skip() {
        let text = r#"{"a":"scalar","list":[1]}"#;
        assert_eq!(redact_json_text(text, &paths(&["$.missing", "$.a.b", "$.list[5]", "$.list.x"]), R), None);
    }

    #[test]
    fn test_invalid_json_passes() {
        assert_eq!(redact_json_text("{not json", &paths(&["$.a"]), R), None);
    }

    #[test]
    fn test_already_redacted_unchanged() {
        assert_eq!(redact_json_text(r#"{"token":"[REDACTED]"}"#, &paths(&["$.token"]), R), None);
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(is_json_content_type("application/vnd.api+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("application/jsonl"));
        assert!(!is_json_content_type(""));
    }
}
