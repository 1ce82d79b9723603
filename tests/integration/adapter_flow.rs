//! End-to-end request flow through `http` types

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use serde_json::json;

use req_insight::observability::keys;
use req_insight::{
    BodyMode, CaptureBody, CaptureOverride, DeferredBodies, NormalizedRequest,
    NormalizedResponse, RequestContext,
};

use crate::helpers::{base_config, resolve, TestEmitter};

fn text_capture() -> req_insight::ResolvedConfig {
    resolve(
        base_config().with_capture(
            CaptureOverride::default()
                .request_body(BodyMode::Text)
                .response_body(BodyMode::Text)
                .max_body_bytes(16),
        ),
    )
}

#[tokio::test]
async fn test_streamed_bodies_are_bounded() {
    let t = TestEmitter::with_config(text_capture());

    let mut req = http::Request::builder()
        .method("PUT")
        .uri("/documents/42?draft=true")
        .header("content-type", "text/plain")
        .header("x-request-id", "ignored")
        .body(Full::new(Bytes::from("a".repeat(40))))
        .unwrap();

    let ctx = t.emitter.start(NormalizedRequest::from_http(&req).with_route("PUT /documents/:id"));
    ctx.attach(req.extensions_mut());

    let (req_body, req_pending) = CaptureBody::new(req.into_body(), 16, BodyMode::Text);
    let collected = req_body.collect().await.unwrap().to_bytes();
    assert_eq!(collected.len(), 40, "the application still sees the whole body");

    let res = http::Response::builder()
        .status(201)
        .header("Request-Id", "res-7")
        .body(Full::new(Bytes::from_static(b"{\"ok\":true}")))
        .unwrap();
    let (res_body, res_pending) = CaptureBody::new(Full::new(Bytes::from_static(b"{\"ok\":true}")), 16, BodyMode::Text);
    res_body.collect().await.unwrap();

    let log = t
        .emitter
        .finish_deferred(
            &ctx,
            NormalizedResponse::from_http(&res),
            None,
            DeferredBodies::new().request(req_pending).response(res_pending),
        )
        .await;

    assert_eq!(log.request_id, "res-7");
    assert_eq!(log.method, "PUT");
    assert_eq!(log.route.as_deref(), Some("/documents/{id}"));
    assert_eq!(log.status, Some(201));

    let request_body = log.request_body.as_ref().unwrap();
    assert_eq!(request_body.total_bytes, 40);
    assert!(request_body.truncated);
    assert_eq!(request_body.value.as_deref(), Some("aaaaaaaaaaaaaaaa"));
    assert_eq!(log.response_body.as_ref().unwrap().value.as_deref(), Some("{\"ok\":true}"));

    let span = t.span();
    assert_eq!(span.name, "PUT /documents/{id}");
    assert_eq!(span.attribute(keys::HTTP_REQUEST_BODY_TRUNCATED), Some(&json!(true)));
    assert_eq!(span.attribute(keys::HTTP_RESPONSE_STATUS_CODE), Some(&json!(201)));
    assert_eq!(t.emitted(), vec![log]);
}

#[tokio::test]
async fn test_context_found_through_extensions() {
    let t = TestEmitter::new();
    let mut req = http::Request::builder().uri("/me").body(()).unwrap();

    let ctx = t.emitter.start(NormalizedRequest::from_http(&req));
    ctx.attach(req.extensions_mut());

    // A later layer only has the request.
    let found = RequestContext::from_extensions(req.extensions()).unwrap();
    found.set_session("sess-1");
    found.set_route("/me");

    let log = t.emitter.finish(&ctx, NormalizedResponse::new(200), None);
    assert_eq!(log.session_id.as_deref(), Some("sess-1"));
    assert_eq!(log.route.as_deref(), Some("/me"));
    assert_eq!(found.request_id(), Some(log.request_id.clone()));
}

#[tokio::test]
async fn test_binary_body_falls_back_to_base64() {
    let t = TestEmitter::with_config(text_capture());
    let ctx = t.emitter.start(NormalizedRequest::new("POST", "/blob"));

    let (body, pending) = CaptureBody::new(Full::new(Bytes::from_static(&[0xff, 0xfe, 0x00])), 16, BodyMode::Text);
    body.collect().await.unwrap();

    let log = t
        .emitter
        .finish_deferred(&ctx, NormalizedResponse::new(200), None, DeferredBodies::new().request(pending))
        .await;

    let captured = log.request_body.unwrap();
    assert_eq!(captured.encoding.as_str(), "base64");
    assert_eq!(captured.decoded().unwrap(), Some(vec![0xff, 0xfe, 0x00]));
}

#[test]
fn test_serialized_record_shape() {
    let t = TestEmitter::new();
    let ctx = t.emitter.start(NormalizedRequest::new("GET", "/health").with_start_time(1_000));
    let log = t
        .emitter
        .finish(&ctx, NormalizedResponse::new(200).with_end_time(1_004), None);

    let json = serde_json::to_value(&log).unwrap();
    assert_eq!(json["service"], "checkout");
    assert_eq!(json["durationMs"], 4);
    assert_eq!(json["url"], "/health");
    assert!(json["requestId"].as_str().unwrap().starts_with("req_"));
    assert!(json.get("error").is_none());
    assert!(json.get("userId").is_none());
}
