//! Captured request/response body payloads.

use serde::{Deserialize, Serialize};

use crate::capture::BodyMode;
use crate::encoding::{decode_body, encode_body, BodyEncoding, DecodeError};

/// A body as it appears in a log record.
///
/// When `value` is present, decoding it under `encoding` yields exactly the
/// first `min(total_bytes, limit)` bytes of the original payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedBody {
    /// Size of the full payload, before truncation.
    pub total_bytes: u64,
    /// Representation of `value`.
    pub encoding: BodyEncoding,
    /// Whether bytes beyond the capture limit were dropped.
    pub truncated: bool,
    /// Captured payload; absent when capture is disabled or the limit is 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl CapturedBody {
    /// Capture a fully buffered payload under a mode and byte limit.
    pub fn capture(data: &[u8], mode: BodyMode, limit: usize) -> Self {
        let kept = &data[..data.len().min(limit)];
        Self::from_parts(kept, data.len() as u64, data.len() > limit, mode)
    }

    /// Build from an already bounded prefix plus the true total size.
    pub(crate) fn from_parts(kept: &[u8], total_bytes: u64, truncated: bool, mode: BodyMode) -> Self {
        let (value, encoding) = match mode {
            BodyMode::None => (None, BodyEncoding::Utf8),
            _ if kept.is_empty() && truncated => (None, mode.preferred_encoding()),
            BodyMode::Text => {
                let (v, e) = encode_body(kept, true);
                (Some(v), e)
            }
            BodyMode::Base64 => {
                let (v, e) = encode_body(kept, false);
                (Some(v), e)
            }
        };

        Self {
            total_bytes,
            encoding,
            truncated,
            value,
        }
    }

    /// Build a UTF-8 body from text, e.g. a payload an adapter already read.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            total_bytes: value.len() as u64,
            encoding: BodyEncoding::Utf8,
            truncated: false,
            value: Some(value),
        }
    }

    /// Decode the captured payload.
    pub fn decoded(&self) -> Result<Option<Vec<u8>>, DecodeError> {
        self.value
            .as_deref()
            .map(|v| decode_body(v, self.encoding))
            .transpose()
    }

    /// Re-apply a (possibly stricter) capture policy.
    ///
    /// `None` drops the payload but keeps the size. A smaller limit cuts the
    /// payload and marks truncation. `Base64` re-encodes text payloads.
    /// Undecodable payloads are left untouched.
    pub fn restrict(self, mode: BodyMode, limit: usize) -> Self {
        if mode == BodyMode::None {
            return Self { value: None, ..self };
        }

        let Ok(Some(bytes)) = self.decoded() else {
            return self;
        };

        let over_limit = bytes.len() > limit;
        let needs_reencode = mode == BodyMode::Base64 && self.encoding.is_text();
        if !over_limit && !needs_reencode {
            return self;
        }

        let kept = &bytes[..bytes.len().min(limit)];
        let mode = if self.encoding.is_text() { mode } else { BodyMode::Base64 };
        let mut body = Self::from_parts(kept, self.total_bytes, self.truncated || over_limit, mode);
        if limit == 0 {
            body.value = None;
        }
        body
    }

    /// Number of bytes held in `value` once decoded.
    pub fn captured_len(&self) -> usize {
        self.decoded().ok().flatten().map_or(0, |b| b.len())
    }
}
