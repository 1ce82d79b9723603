//! Redaction engine.
//!
//! [`Redactor`] applies a [`RedactionPolicy`] to a [`RequestLog`]:
//!
//! - headers in the policy set are rewritten ([`headers`])
//! - query parameters in the policy set are replaced ([`redact_url`])
//! - JSON bodies have the configured paths replaced
//!
//! [`is_sensitive_header`] is a fixed classifier that works without any
//! policy.

pub mod headers;
mod json;
mod query;
mod sensitive;

use crate::config::RedactionPolicy;
use crate::core::{CapturedBody, Headers, RequestLog};

pub use headers::redact_header_value;
pub use json::is_json_content_type;
pub use query::redact_url;
pub use sensitive::is_sensitive_header;

use json::Segment;

/// Applies one redaction policy. Cheap to build; compiles JSON paths once.
#[derive(Debug)]
pub struct Redactor<'a> {
    policy: &'a RedactionPolicy,
    json_paths: Vec<Vec<Segment>>,
}

impl<'a> Redactor<'a> {
    pub fn new(policy: &'a RedactionPolicy) -> Self {
        let json_paths = policy
            .json_paths
            .iter()
            .filter_map(|p| json::parse_path(p))
            .collect();
        Self { policy, json_paths }
    }

    pub fn policy(&self) -> &RedactionPolicy {
        self.policy
    }

    /// Copy of `headers` with every listed header rewritten.
    pub fn redact_headers(&self, headers: &Headers) -> Headers {
        let mut out = headers.clone();
        for (name, value) in out.iter_mut() {
            if self.policy.headers.contains(name) {
                *value = value.map(|v| redact_header_value(name, v, &self.policy.replacement));
            }
        }
        out
    }

    /// URL with listed query parameter values replaced.
    pub fn redact_url(&self, url: &str) -> String {
        redact_url(url, &self.policy.query_params, &self.policy.replacement)
    }

    /// Body with JSON paths applied, if `content_type` is JSON and the body
    /// is text. Anything else comes back unchanged.
    pub fn redact_body(&self, body: &CapturedBody, content_type: Option<&str>) -> CapturedBody {
        if self.json_paths.is_empty() || !body.encoding.is_text() {
            return body.clone();
        }
        if !content_type.is_some_and(is_json_content_type) {
            return body.clone();
        }
        let Some(text) = body.value.as_deref() else {
            return body.clone();
        };

        match json::redact_json_text(text, &self.json_paths, &self.policy.replacement) {
            Some(value) => CapturedBody {
                value: Some(value),
                ..body.clone()
            },
            None => body.clone(),
        }
    }

    /// Redacted copy of a log record.
    ///
    /// Body redaction looks at the content type in the already redacted
    /// header maps. When headers were not captured, or the content type was
    /// itself redacted, the raw `request_ct` / `response_ct` are used.
    pub fn redact_log(
        &self,
        log: &RequestLog,
        request_ct: Option<&str>,
        response_ct: Option<&str>,
    ) -> RequestLog {
        let request_headers = log.request_headers.as_ref().map(|h| self.redact_headers(h));
        let response_headers = log.response_headers.as_ref().map(|h| self.redact_headers(h));

        let request_ct = self.content_type(request_headers.as_ref(), request_ct);
        let response_ct = self.content_type(response_headers.as_ref(), response_ct);

        let request_body = log.request_body.as_ref().map(|b| self.redact_body(b, request_ct));
        let response_body = log.response_body.as_ref().map(|b| self.redact_body(b, response_ct));

        RequestLog {
            url: self.redact_url(&log.url),
            request_headers,
            response_headers,
            request_body,
            response_body,
            ..log.clone()
        }
    }

    fn content_type<'h>(&self, redacted: Option<&'h Headers>, raw: Option<&'h str>) -> Option<&'h str> {
        redacted
            .and_then(|h| h.get_first("content-type"))
            .filter(|ct| *ct != self.policy.replacement)
            .or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HeaderValue;

    fn policy(headers: &[&str], query: &[&str], paths: &[&str]) -> RedactionPolicy {
        RedactionPolicy {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            query_params: query.iter().map(|s| s.to_string()).collect(),
            json_paths: paths.iter().map(|s| s.to_string()).collect(),
            replacement: "[REDACTED]".to_string(),
        }
    }

    fn log() -> RequestLog {
        RequestLog {
            request_id: "req_1".into(),
            trace_id: "t".into(),
            span_id: "s".into(),
            service: "svc".into(),
            method: "POST".into(),
            url: "/login?token=abc&page=2".into(),
            route: Some("/login".into()),
            status: Some(200),
            duration_ms: 1,
            request_headers: Some(
                Headers::new()
                    .with("authorization", "Bearer secret")
                    .with("cookie", "a=1; b=2")
                    .with("content-type", "application/json"),
            ),
            response_headers: Some(
                Headers::new()
                    .with("set-cookie", "sid=1; Path=/")
                    .with("set-cookie", "theme=dark; Secure"),
            ),
            request_body: Some(CapturedBody::text(r#"{"token":"x","keep":"y"}"#)),
            response_body: Some(CapturedBody::text(r#"{"token":"x"}"#)),
            tenant_id: None,
            user_id: None,
            session_id: None,
            error: None,
            attributes: None,
            events: None,
            timestamp: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_redact_log_end_to_end() {
        let policy = policy(&["authorization", "cookie", "set-cookie"], &["token"], &["$.token"]);
        let redacted = Redactor::new(&policy).redact_log(&log(), None, None);

        let req = redacted.request_headers.as_ref().unwrap();
        assert_eq!(req.get_first("authorization"), Some("Bearer [REDACTED]"));
        assert_eq!(req.get_first("cookie"), Some("a=[REDACTED]; b=[REDACTED]"));
        assert_eq!(req.get_first("content-type"), Some("application/json"));

        let set_cookie = redacted.response_headers.as_ref().unwrap().get("set-cookie").unwrap();
        assert_eq!(
            set_cookie,
            &HeaderValue::Many(vec![
                "sid=[REDACTED]; Path=/".to_string(),
                "theme=[REDACTED]; Secure".to_string(),
            ])
        );

        assert_eq!(redacted.url, "/login?token=%5BREDACTED%5D&page=2");
        assert_eq!(
            redacted.request_body.as_ref().unwrap().value.as_deref(),
            Some(r#"{"token":"[REDACTED]","keep":"y"}"#)
        );
        // No JSON content type on the response
        assert_eq!(
            redacted.response_body.as_ref().unwrap().value.as_deref(),
            Some(r#"{"token":"x"}"#)
        );
    }

    #[test]
    fn test_redact_log_does_not_touch_input() {
        let policy = policy(&["authorization"], &["token"], &[]);
        let original = log();
        let _ = Redactor::new(&policy).redact_log(&original, None, None);
        assert_eq!(original, log());
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let policy = policy(&["authorization", "cookie", "set-cookie"], &["token"], &["$.token"]);
        let redactor = Redactor::new(&policy);
        let once = redactor.redact_log(&log(), None, None);
        let twice = redactor.redact_log(&once, None, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_body_uses_fallback_content_type_without_headers() {
        let policy = policy(&[], &[], &["$.token"]);
        let mut record = log();
        record.request_headers = None;

        let redactor = Redactor::new(&policy);
        let untouched = redactor.redact_log(&record, None, None);
        assert_eq!(untouched.request_body, record.request_body);

        let redacted = redactor.redact_log(&record, Some("application/json"), None);
        assert_eq!(
            redacted.request_body.unwrap().value.as_deref(),
            Some(r#"{"token":"[REDACTED]","keep":"y"}"#)
        );
    }

    #[test]
    fn test_redacted_content_type_falls_back_to_raw() {
        let policy = policy(&["content-type"], &[], &["$.token"]);
        let redactor = Redactor::new(&policy);

        let unknown = redactor.redact_log(&log(), None, None);
        assert_eq!(
            unknown.request_body.unwrap().value.as_deref(),
            Some(r#"{"token":"x","keep":"y"}"#)
        );

        let raw = redactor.redact_log(&log(), Some("application/json"), None);
        assert_eq!(
            raw.request_headers.unwrap().get_first("content-type"),
            Some("[REDACTED]")
        );
        assert_eq!(
            raw.request_body.unwrap().value.as_deref(),
            Some(r#"{"token":"[REDACTED]","keep":"y"}"#)
        );
    }

    #[test]
    fn test_base64_body_not_parsed() {
        let policy = policy(&[], &[], &["$.token"]);
        let body = CapturedBody::capture(br#"{"token":"x"}"#, crate::capture::BodyMode::Base64, 100);
        let out = Redactor::new(&policy).redact_body(&body, Some("application/json"));
        assert_eq!(out, body);
    }

    #[test]
    fn test_body_sizes_kept() {
        let policy = policy(&[], &[], &["$.token"]);
        let body = CapturedBody::capture(br#"{"token":"x"}"#, crate::capture::BodyMode::Text, 100);
        let out = Redactor::new(&policy).redact_body(&body, Some("application/json"));
        assert_eq!(out.total_bytes, body.total_bytes);
        assert_eq!(out.truncated, body.truncated);
        assert_eq!(out.value.as_deref(), Some(r#"{"token":"[REDACTED]"}"#));
    }
}
