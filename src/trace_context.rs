//! W3C `traceparent` handling for request spans.
//!
//! `traceparent: 00-{trace-id:32 hex}-{parent-id:16 hex}-{flags:2 hex}`
//!
//! An incoming header is continued: the request span keeps the trace id,
//! gets a fresh span id and records the caller's span as its parent. Without
//! a usable header a new root context is generated from UUIDv7 bytes.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::core::Headers;

/// Request header carrying the caller's context.
pub const TRACEPARENT: &str = "traceparent";

const VERSION: &str = "00";
const SAMPLED: u8 = 0x01;

/// Why a `traceparent` value was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceparentError {
    Fields,
    Version,
    TraceId,
    ParentId,
    Flags,
}

impl fmt::Display for TraceparentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            TraceparentError::Fields => "expected 4 dash-separated fields",
            TraceparentError::Version => "unsupported version",
            TraceparentError::TraceId => "invalid trace id",
            TraceparentError::ParentId => "invalid parent id",
            TraceparentError::Flags => "invalid trace flags",
        };
        write!(f, "traceparent: {}", what)
    }
}

impl std::error::Error for TraceparentError {}

/// Ids of the span a request runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex chars.
    pub trace_id: String,
    /// 16 lowercase hex chars, this request's span.
    pub span_id: String,
    /// Caller's span when the trace was continued.
    pub parent_span_id: Option<String>,
    pub flags: u8,
}

impl TraceContext {
    /// Fresh root context, sampled.
    pub fn new() -> Self {
        Self {
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            parent_span_id: None,
            flags: SAMPLED,
        }
    }

    /// Continue the trace named by a `traceparent` value.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    /// Continue the trace from request headers, if they carry one.
    pub fn from_headers(headers: &Headers) -> Option<Self> {
        headers.get_first(TRACEPARENT).and_then(Self::parse)
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & SAMPLED != 0
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for TraceContext {
    type Err = TraceparentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.trim().split('-');
        let (Some(version), Some(trace), Some(parent), Some(flags), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(TraceparentError::Fields);
        };

        if version != VERSION {
            return Err(TraceparentError::Version);
        }
        let trace_id = hex_id(trace, 32).ok_or(TraceparentError::TraceId)?;
        let parent_id = hex_id(parent, 16).ok_or(TraceparentError::ParentId)?;
        let flags = match flags.len() {
            2 => u8::from_str_radix(flags, 16).map_err(|_| TraceparentError::Flags)?,
            _ => return Err(TraceparentError::Flags),
        };

        Ok(Self {
            trace_id,
            span_id: generate_span_id(),
            parent_span_id: Some(parent_id),
            flags,
        })
    }
}

/// Outgoing form, with this request's span as the parent id.
impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{:02x}", VERSION, self.trace_id, self.span_id, self.flags)
    }
}

/// Lowercased id of exactly `len` hex digits, rejecting all-zero ids.
fn hex_id(field: &str, len: usize) -> Option<String> {
    let valid = field.len() == len
        && field.bytes().all(|b| b.is_ascii_hexdigit())
        && field.bytes().any(|b| b != b'0');
    valid.then(|| field.to_ascii_lowercase())
}

/// 32 hex chars; the leading 48 bits are the millisecond timestamp.
pub fn generate_trace_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// 16 hex chars from the random half of a UUIDv7.
///
/// The variant bits keep the id from ever being all zeros.
pub fn generate_span_id() -> String {
    let bytes = Uuid::now_v7().into_bytes();
    bytes[8..].iter().map(|b| format!("{:02x}", b)).collect()
}
