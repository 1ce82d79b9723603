//! Many requests in flight on one emitter

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use req_insight::{NormalizedRequest, NormalizedResponse};

use crate::helpers::TestEmitter;

#[test]
fn test_parallel_requests_are_isolated() {
    let t = Arc::new(TestEmitter::new());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let ctx = t
                            .emitter
                            .start(NormalizedRequest::new("GET", format!("/w/{}/{}", worker, i)));
                        ctx.set_attribute("worker", worker);
                        let log = t.emitter.finish(&ctx, NormalizedResponse::new(200), None);
                        assert_eq!(log.url, format!("/w/{}/{}", worker, i));
                        assert_eq!(log.attributes.unwrap()["worker"], worker);
                        log.request_id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(ids.len(), 200);
    assert_eq!(t.emitter.in_flight(), 0);
    assert_eq!(t.emitted().len(), 200);
    assert_eq!(t.tracer.finished_spans().len(), 200);
}

#[test]
fn test_generated_ids_sort_by_time() {
    let t = TestEmitter::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let ctx = t.emitter.start(NormalizedRequest::new("GET", "/"));
        ids.push(t.emitter.finish(&ctx, NormalizedResponse::new(200), None).request_id);
        thread::sleep(std::time::Duration::from_millis(2));
    }

    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}
