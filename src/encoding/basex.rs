//! Order-preserving base-N codecs over fixed-size byte chunks.
//!
//! Input is split into chunks of at most [`MAX_CHUNK_BYTES`] bytes. Each chunk
//! is treated as a big-endian unsigned integer, converted to the target base
//! and left-padded with the alphabet's zero symbol to a width that depends
//! only on the chunk's byte length. Because the alphabets are in ASCII order
//! and every chunk of a given size has the same width, plain string
//! comparison of two encodings of equal-length inputs matches the unsigned
//! big-endian order of the inputs.

use std::sync::LazyLock;

use super::DecodeError;

/// Largest chunk encoded as a single integer.
pub const MAX_CHUNK_BYTES: usize = 32;

/// 48 symbols: digits without `0`/`1`, consonants without `L`/`l`.
const BASE48_ALPHABET: &[u8; 48] = b"23456789BCDFGHJKMNPQRSTVWXYZbcdfghjkmnpqrstvwxyz";

/// 62 symbols: standard alphanumerics in ASCII order.
const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const INVALID: u8 = 0xFF;

/// Base-48 codec used for externally visible request identifiers.
pub static BASE48: LazyLock<BaseCodec> = LazyLock::new(|| BaseCodec::new(BASE48_ALPHABET));

/// Base-62 codec.
pub static BASE62: LazyLock<BaseCodec> = LazyLock::new(|| BaseCodec::new(BASE62_ALPHABET));

/// A fixed-alphabet numeral codec with precomputed chunk widths.
///
/// Immutable after construction; shared freely across threads.
pub struct BaseCodec {
    alphabet: &'static [u8],
    base: u32,
    lookup: [u8; 256],
    /// `widths[n]` = encoded characters for an `n`-byte chunk.
    widths: [usize; MAX_CHUNK_BYTES + 1],
}

impl BaseCodec {
    fn new(alphabet: &'static [u8]) -> Self {
        debug_assert!(alphabet.windows(2).all(|w| w[0] < w[1]));

        let mut lookup = [INVALID; 256];
        for (value, &symbol) in alphabet.iter().enumerate() {
            lookup[symbol as usize] = value as u8;
        }

        let mut codec = Self {
            alphabet,
            base: alphabet.len() as u32,
            lookup,
            widths: [0; MAX_CHUNK_BYTES + 1],
        };

        // Width of an n-byte chunk = digits needed for its maximum value.
        for n in 1..=MAX_CHUNK_BYTES {
            codec.widths[n] = codec.to_digits(&vec![0xFF; n]).len();
        }

        codec
    }

    /// Number of symbols in the alphabet.
    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Encoded length for an input of `len` bytes.
    pub fn encoded_len(&self, len: usize) -> usize {
        let full = len / MAX_CHUNK_BYTES;
        let rest = len % MAX_CHUNK_BYTES;
        full * self.widths[MAX_CHUNK_BYTES] + self.widths[rest]
    }

    /// Encode bytes into this codec's alphabet.
    pub fn encode(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(self.encoded_len(bytes.len()));

        for chunk in bytes.chunks(MAX_CHUNK_BYTES) {
            let digits = self.to_digits(chunk);
            let width = self.widths[chunk.len()];

            for _ in digits.len()..width {
                out.push(self.alphabet[0] as char);
            }
            for &digit in digits.iter().rev() {
                out.push(self.alphabet[digit as usize] as char);
            }
        }

        out
    }

    /// Decode a string produced by [`BaseCodec::encode`].
    ///
    /// Rejects foreign characters, lengths that do not correspond to any
    /// chunk layout, and chunks whose value does not fit their byte size.
    pub fn decode(&self, encoded: &str) -> Result<Vec<u8>, DecodeError> {
        for (position, character) in encoded.chars().enumerate() {
            if !character.is_ascii() || self.lookup[character as usize] == INVALID {
                return Err(DecodeError::InvalidCharacter {
                    character,
                    position,
                });
            }
        }

        // All characters are ASCII from here on, so byte length == char count.
        let symbols = encoded.as_bytes();
        let full_width = self.widths[MAX_CHUNK_BYTES];
        let full_chunks = symbols.len() / full_width;
        let rest_width = symbols.len() % full_width;

        let rest_bytes = if rest_width == 0 {
            0
        } else {
            self.bytes_for_width(rest_width)
                .ok_or(DecodeError::InvalidLength {
                    length: symbols.len(),
                })?
        };

        let mut out = Vec::with_capacity(full_chunks * MAX_CHUNK_BYTES + rest_bytes);

        for (index, chunk) in symbols[..full_chunks * full_width]
            .chunks(full_width)
            .enumerate()
        {
            self.decode_chunk(chunk, MAX_CHUNK_BYTES, index, &mut out)?;
        }

        if rest_bytes > 0 {
            let tail = &symbols[full_chunks * full_width..];
            self.decode_chunk(tail, rest_bytes, full_chunks, &mut out)?;
        }

        Ok(out)
    }

    /// Inverse of the width table for partial chunks.
    fn bytes_for_width(&self, width: usize) -> Option<usize> {
        (1..MAX_CHUNK_BYTES).find(|&n| self.widths[n] == width)
    }

    /// Convert a big-endian chunk into digits, least significant first.
    /// Leading zero bytes produce no digits.
    fn to_digits(&self, chunk: &[u8]) -> Vec<u8> {
        let mut number = chunk.to_vec();
        let mut digits = Vec::with_capacity(self.widths[chunk.len().min(MAX_CHUNK_BYTES)]);
        let mut start = number.iter().position(|&b| b != 0).unwrap_or(number.len());

        while start < number.len() {
            let mut remainder: u32 = 0;
            for byte in &mut number[start..] {
                let acc = (remainder << 8) | u32::from(*byte);
                *byte = (acc / self.base) as u8;
                remainder = acc % self.base;
            }
            digits.push(remainder as u8);

            while start < number.len() && number[start] == 0 {
                start += 1;
            }
        }

        digits
    }

    fn decode_chunk(
        &self,
        symbols: &[u8],
        byte_len: usize,
        chunk: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), DecodeError> {
        let mut number = vec![0u8; byte_len];

        for &symbol in symbols {
            let mut carry = u32::from(self.lookup[symbol as usize]);
            for byte in number.iter_mut().rev() {
                let acc = u32::from(*byte) * self.base + carry;
                *byte = (acc & 0xFF) as u8;
                carry = acc >> 8;
            }
            if carry != 0 {
                return Err(DecodeError::Overflow { chunk });
            }
        }

        out.extend_from_slice(&number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Deterministic byte pattern that exercises leading zeros and high bytes.
    fn sample(len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| match i % 5 {
                0 => 0,
                1 => 0xFF,
                _ => (i * 37 % 251) as u8,
            })
            .collect()
    }

    #[test]
    fn test_alphabet_sizes() {
        assert_eq!(BASE48.base(), 48);
        assert_eq!(BASE62.base(), 62);
    }

    #[test]
    fn test_identifier_widths() {
        assert_eq!(BASE62.encoded_len(16), 22);
        assert_eq!(BASE48.encoded_len(16), 23);
        assert_eq!(BASE48.encode(&[0u8; 16]).len(), 23);
        assert_eq!(BASE62.encode(&[0xFF; 16]).len(), 22);
    }

    #[test]
    fn test_round_trip_all_lengths() {
        for len in 0..=200 {
            let bytes = sample(len);
            for codec in [&*BASE48, &*BASE62] {
                let encoded = codec.encode(&bytes);
                assert_eq!(encoded.len(), codec.encoded_len(len));
                assert_eq!(codec.decode(&encoded).unwrap(), bytes, "len {}", len);
            }
        }
    }

    #[test]
    fn test_round_trip_all_zero_and_all_max() {
        for len in [1, 16, 31, 32, 33, 64, 100] {
            for fill in [0x00, 0xFF] {
                let bytes = vec![fill; len];
                assert_eq!(BASE48.decode(&BASE48.encode(&bytes)).unwrap(), bytes);
                assert_eq!(BASE62.decode(&BASE62.encode(&bytes)).unwrap(), bytes);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(BASE48.encode(&[]), "");
        assert_eq!(BASE62.decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_zero_pads_with_zero_symbol() {
        assert_eq!(BASE62.encode(&[0, 0]), "000");
        assert_eq!(BASE48.encode(&[0]), "22");
    }

    #[test]
    fn test_rejects_foreign_characters() {
        let err = BASE48.decode("22a2").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidCharacter {
                character: 'a',
                position: 2
            }
        ));

        // Excluded look-alikes
        assert!(BASE48.decode("10").is_err());
        assert!(BASE48.decode("lL").is_err());
        assert!(BASE62.decode("ab-c").is_err());
        assert!(BASE62.decode("ééé").is_err());
    }

    #[test]
    fn test_rejects_impossible_lengths() {
        // base62: 1 byte -> 2 chars, 2 bytes -> 3 chars, no layout uses 1 char
        let err = BASE62.decode("Z").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLength { length: 1 }));
    }

    #[test]
    fn test_rejects_overlong_chunk() {
        // "zz" in base62 is 61*62+61 = 3843 > 255
        let err = BASE62.decode("zz").unwrap_err();
        assert!(matches!(err, DecodeError::Overflow { chunk: 0 }));

        // Largest canonical single byte still decodes
        let max = BASE62.encode(&[0xFF]);
        assert_eq!(BASE62.decode(&max).unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_order_across_boundary_values() {
        let a = [0u8; 16];
        let mut b = [0u8; 16];
        b[15] = 1;
        let mut c = [0u8; 16];
        c[0] = 1;
        for codec in [&*BASE48, &*BASE62] {
            assert!(codec.encode(&a) < codec.encode(&b));
            assert!(codec.encode(&b) < codec.encode(&c));
            assert!(codec.encode(&c) < codec.encode(&[0xFF; 16]));
        }
    }

    proptest! {
        #[test]
        fn prop_order_preserved_16_bytes(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
            prop_assume!(a != b);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(BASE48.encode(&lo) < BASE48.encode(&hi));
            prop_assert!(BASE62.encode(&lo) < BASE62.encode(&hi));
        }

        #[test]
        fn prop_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            prop_assert_eq!(BASE48.decode(&BASE48.encode(&bytes)).unwrap(), bytes.clone());
            prop_assert_eq!(BASE62.decode(&BASE62.encode(&bytes)).unwrap(), bytes);
        }
    }
}
