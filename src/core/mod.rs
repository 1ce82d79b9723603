//! Core data types shared by adapters, the emitter and observers.
//!
//! - [`NormalizedRequest`] / [`NormalizedResponse`] - what adapters hand in
//! - [`Headers`] / [`HeaderValue`] - header multimap
//! - [`CapturedBody`] - bounded body payload
//! - [`RequestLog`] - the record handed back out

mod body;
mod headers;
mod log;
mod request;
mod response;
mod timestamp;

pub use body::CapturedBody;
pub use headers::{HeaderValue, Headers};
pub use log::{Attributes, ErrorDetail, LogEvent, RequestLog};
pub use request::{url_path, NormalizedRequest};
pub use response::NormalizedResponse;
pub use timestamp::{now_millis, Iso8601Timestamp};
