//! Redaction across headers, URL, bodies and span attributes

use serde_json::json;

use req_insight::observability::keys;
use req_insight::{
    is_sensitive_header, BodyMode, CaptureOverride, CapturedBody, NormalizedRequest,
    NormalizedResponse, RedactionOverride,
};

use crate::helpers::{base_config, resolve, TestEmitter};

#[test]
fn test_secrets_never_reach_observers() {
    let config = resolve(
        base_config()
            .with_capture(
                CaptureOverride::default()
                    .request_body(BodyMode::Text)
                    .response_body(BodyMode::Text),
            )
            .with_redaction(
                RedactionOverride::default()
                    .headers(["authorization", "cookie", "set-cookie"])
                    .query_params(["api_key"])
                    .json_paths(["$.card.number", "$.tokens[0]"]),
            ),
    );
    let t = TestEmitter::with_config(config);

    let request = NormalizedRequest::new("POST", "https://shop.test/pay?api_key=k-123&step=2")
        .with_header("Authorization", "Basic dXNlcjpwYXNz")
        .with_header("Cookie", "sid=s3cr3t-sid; theme=dark")
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(CapturedBody::text(
            r#"{"card":{"number":"4111111111111111","exp":"12/30"},"tokens":["t1","t2"]}"#,
        ));
    let ctx = t.emitter.start(request);

    let response = NormalizedResponse::new(200)
        .with_header("Set-Cookie", "sid=new; Path=/; HttpOnly")
        .with_header("Content-Type", "application/json")
        .with_body(CapturedBody::text(r#"{"tokens":["fresh"]}"#));
    let log = t.emitter.finish(&ctx, response, None);

    assert_eq!(log.url, "https://shop.test/pay?api_key=%5BREDACTED%5D&step=2");

    let req_headers = log.request_headers.as_ref().unwrap();
    assert_eq!(req_headers.get_first("authorization"), Some("Basic [REDACTED]"));
    assert_eq!(req_headers.get_first("cookie"), Some("sid=[REDACTED]; theme=[REDACTED]"));

    let res_headers = log.response_headers.as_ref().unwrap();
    assert_eq!(
        res_headers.get_first("set-cookie"),
        Some("sid=[REDACTED]; Path=/; HttpOnly")
    );

    assert_eq!(
        log.request_body.as_ref().unwrap().value.as_deref(),
        Some(r#"{"card":{"number":"[REDACTED]","exp":"12/30"},"tokens":["[REDACTED]","t2"]}"#)
    );
    assert_eq!(
        log.response_body.as_ref().unwrap().value.as_deref(),
        Some(r#"{"tokens":["[REDACTED]"]}"#)
    );

    let serialized = serde_json::to_string(&t.emitted()).unwrap();
    let span = serde_json::to_string(&t.span().attributes).unwrap();
    for secret in ["k-123", "dXNlcjpwYXNz", "s3cr3t-sid", "4111111111111111", "\"t1\"", "fresh"] {
        assert!(!serialized.contains(secret), "log leaked {}", secret);
        assert!(!span.contains(secret), "span leaked {}", secret);
    }
}

#[test]
fn test_per_request_redaction_override() {
    let t = TestEmitter::new();
    let ctx = t.emitter.start(NormalizedRequest::new("GET", "/search?q=cats&session=s1"));
    ctx.override_redaction(RedactionOverride::default().query_params(["session"]).replacement("<gone>"));

    let log = t.emitter.finish(&ctx, NormalizedResponse::new(200), None);
    assert_eq!(log.url, "/search?q=cats&session=%3Cgone%3E");

    // The shared policy is untouched.
    let ctx = t.emitter.start(NormalizedRequest::new("GET", "/search?session=s2"));
    let log = t.emitter.finish(&ctx, NormalizedResponse::new(200), None);
    assert_eq!(log.url, "/search?session=s2");
}

#[test]
fn test_decoded_target_still_redacted() {
    let t = TestEmitter::new();
    let ctx = t.emitter.start(NormalizedRequest::new("GET", "/search?q=red shoes&token=tk-991"));
    let log = t.emitter.finish(&ctx, NormalizedResponse::new(200), None);

    assert_eq!(log.url, "/search?q=red shoes&token=%5BREDACTED%5D");
    let span = serde_json::to_string(&t.span().attributes).unwrap();
    assert!(!span.contains("tk-991"));
}

#[test]
fn test_redacted_forwarding_value_ignored() {
    let t = TestEmitter::new();
    let ctx = t.emitter.start(
        NormalizedRequest::new("GET", "/")
            .with_header("X-Real-Ip", "[REDACTED]")
            .with_remote_address("198.51.100.4:61000"),
    );
    t.emitter.finish(&ctx, NormalizedResponse::new(200), None);

    assert_eq!(t.span().attribute(keys::CLIENT_ADDRESS), Some(&json!("198.51.100.4")));
}

#[test]
fn test_classifier_spellings() {
    for name in ["X-API-Key", "x_api_key", "x.api.key", "XApiKey", "X-Session-Token", "db-password"] {
        assert!(is_sensitive_header(name), "{} should be sensitive", name);
    }
    for name in ["accept", "x-forwarded-for", "content-type", "x-request-id"] {
        assert!(!is_sensitive_header(name), "{} should not be sensitive", name);
    }
}
