//! Time-ordered request identifiers.
//!
//! An identifier is a UUIDv7: 48 bits of millisecond Unix time, the version
//! nibble, random fill and the RFC 4122 variant bits. It renders three ways:
//!
//! - hyphenated hex (`0190b6a2-...`)
//! - base-62, 22 characters
//! - base-48 with the `req_` prefix, 27 characters, used for request ids
//!
//! Identifiers minted in later milliseconds compare greater as plain strings
//! in all three renderings. Within one millisecond the random bits decide.

use std::fmt;
use std::str::FromStr;

use uuid::{NoContext, Timestamp, Uuid};

use crate::encoding::{decode_base48, encode_base48, encode_base62, DecodeError};

/// Literal tag in front of every rendered request id.
pub const REQUEST_ID_PREFIX: &str = "req_";

/// Length of the base-48 body of a request id.
pub const REQUEST_ID_BODY_LEN: usize = 23;

/// A 128-bit time-ordered identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Mint a new identifier for the current time.
    pub fn new() -> Self {
        Self(Uuid::new_v7(Timestamp::now(NoContext)))
    }

    /// Mint an identifier for an explicit Unix time in milliseconds.
    pub fn at_millis(millis: u64) -> Self {
        let secs = millis / 1000;
        let nanos = ((millis % 1000) * 1_000_000) as u32;
        Self(Uuid::new_v7(Timestamp::from_unix(NoContext, secs, nanos)))
    }

    /// Millisecond timestamp embedded in the identifier.
    pub fn timestamp_millis(&self) -> u64 {
        let bytes = self.0.as_bytes();
        bytes[..6]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Raw 16 bytes, big-endian.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Canonical hyphenated lowercase hex.
    pub fn to_hex(&self) -> String {
        self.0.hyphenated().to_string()
    }

    /// 22-character base-62 rendering.
    pub fn to_base62(&self) -> String {
        encode_base62(self.as_bytes())
    }

    /// Prefixed base-48 rendering used for externally visible request ids.
    pub fn to_request_id(&self) -> String {
        let mut out = String::with_capacity(REQUEST_ID_PREFIX.len() + REQUEST_ID_BODY_LEN);
        out.push_str(REQUEST_ID_PREFIX);
        out.push_str(&encode_base48(self.as_bytes()));
        out
    }

    /// Parse a prefixed base-48 request id.
    pub fn parse_request_id(s: &str) -> Result<Self, DecodeError> {
        let body = s.strip_prefix(REQUEST_ID_PREFIX).unwrap_or(s);
        if body.len() != REQUEST_ID_BODY_LEN {
            return Err(DecodeError::InvalidLength { length: body.len() });
        }
        let bytes = decode_base48(body)?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidLength { length: body.len() })?;
        Ok(Self(Uuid::from_bytes(bytes)))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_request_id())
    }
}

impl FromStr for RequestId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_request_id(s)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Generate a fresh externally visible request id.
#[inline]
pub fn generate_request_id() -> String {
    RequestId::new().to_request_id()
}
