//! Bounded body capture.
//!
//! - [`BoundedBuffer`] - fixed-budget accumulator, independent of any I/O
//! - [`capture_stream`] - drain a chunk stream into a capture
//! - [`CaptureBody`] - tee an `http_body::Body` into a capture delivered
//!   through a [`PendingBody`]

mod buffer;
mod stream;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoding::BodyEncoding;

pub use buffer::BoundedBuffer;
pub use stream::{capture_stream, CaptureBody, CaptureError, PendingBody};

/// Whether and how a body payload is captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    /// Sizes only, no payload.
    #[default]
    None,
    /// UTF-8 text, falling back to base64 for non-UTF-8 bytes.
    Text,
    /// Always base64.
    Base64,
}

impl BodyMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BodyMode::None => "none",
            BodyMode::Text => "text",
            BodyMode::Base64 => "base64",
        }
    }

    /// Whether any payload is kept.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, BodyMode::None)
    }

    pub(crate) fn preferred_encoding(&self) -> BodyEncoding {
        match self {
            BodyMode::Base64 => BodyEncoding::Base64,
            _ => BodyEncoding::Utf8,
        }
    }
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(BodyMode::None),
            "text" => Ok(BodyMode::Text),
            "base64" => Ok(BodyMode::Base64),
            other => Err(format!(
                "unknown body mode '{}', expected: none, text, base64",
                other
            )),
        }
    }
}
