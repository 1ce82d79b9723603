//! Integration tests for req_insight
//!
//! These drive the public API the way a framework adapter would: build a
//! normalized request from `http` types, tee bodies through `CaptureBody`,
//! and finish through the emitter with an in-memory tracer.
//!
//! Run with: cargo test --test integration

mod helpers;

mod adapter_flow;
mod concurrency;
mod config_file;
mod redaction;
