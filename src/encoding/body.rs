//! Textual encodings for captured body payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::DecodeError;

/// How a captured body payload is represented as text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Payload is the body bytes interpreted as UTF-8.
    #[default]
    Utf8,
    /// Payload is the standard (padded) base64 encoding of the body bytes.
    Base64,
}

impl BodyEncoding {
    /// Wire name (`utf8` / `base64`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            BodyEncoding::Utf8 => "utf8",
            BodyEncoding::Base64 => "base64",
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, BodyEncoding::Utf8)
    }
}

impl std::fmt::Display for BodyEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode body bytes for inclusion in a log record.
///
/// With `prefer_text`, valid UTF-8 is kept as-is. Anything else (binary
/// data, or a prefix that ends inside a multi-byte character) is base64 so
/// that decoding the value always yields the exact captured bytes.
pub fn encode_body(bytes: &[u8], prefer_text: bool) -> (String, BodyEncoding) {
    if prefer_text {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return (text.to_owned(), BodyEncoding::Utf8);
        }
    }
    (STANDARD.encode(bytes), BodyEncoding::Base64)
}

/// Decode a body value back into the captured bytes.
pub fn decode_body(value: &str, encoding: BodyEncoding) -> Result<Vec<u8>, DecodeError> {
    match encoding {
        BodyEncoding::Utf8 => Ok(value.as_bytes().to_vec()),
        BodyEncoding::Base64 => STANDARD
            .decode(value)
            .map_err(|e| DecodeError::Base64(e.to_string())),
    }
}
