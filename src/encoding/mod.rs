//! Byte encoding utilities.
//!
//! - [`BASE48`] / [`BASE62`] - order-preserving numeral encodings used to
//!   render identifiers
//! - [`encode_body`] / [`decode_body`] - UTF-8 or base64 payloads for
//!   captured bodies

mod basex;
mod body;

use std::fmt;

pub use basex::{BaseCodec, BASE48, BASE62, MAX_CHUNK_BYTES};
pub use body::{decode_body, encode_body, BodyEncoding};

/// Encode bytes with the base-48 alphabet.
#[inline]
pub fn encode_base48(bytes: &[u8]) -> String {
    BASE48.encode(bytes)
}

/// Decode a base-48 string.
#[inline]
pub fn decode_base48(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    BASE48.decode(encoded)
}

/// Encode bytes with the base-62 alphabet.
#[inline]
pub fn encode_base62(bytes: &[u8]) -> String {
    BASE62.encode(bytes)
}

/// Decode a base-62 string.
#[inline]
pub fn decode_base62(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    BASE62.decode(encoded)
}

/// Error decoding an encoded string back into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Character outside the codec's alphabet.
    InvalidCharacter { character: char, position: usize },
    /// Length does not correspond to any chunk layout.
    InvalidLength { length: usize },
    /// Chunk value exceeds what its byte size can hold.
    Overflow { chunk: usize },
    /// Malformed base64 body payload.
    Base64(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidCharacter {
                character,
                position,
            } => write!(f, "invalid character {:?} at position {}", character, position),
            DecodeError::InvalidLength { length } => {
                write!(f, "invalid encoded length: {}", length)
            }
            DecodeError::Overflow { chunk } => {
                write!(f, "chunk {} exceeds its maximum value", chunk)
            }
            DecodeError::Base64(msg) => write!(f, "invalid base64: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}
