//! Size-bounded byte accumulator.

use crate::core::CapturedBody;

use super::BodyMode;

/// Smallest allocation made once the first byte arrives.
const INITIAL_CAPACITY: usize = 256;

/// Accumulates streamed chunks up to a fixed byte limit.
///
/// Tracks the true number of bytes written regardless of the limit. Storage
/// grows geometrically but never past the limit. A limit of 0 captures
/// nothing and only counts.
///
/// Not synchronized: one buffer belongs to one capture pipeline.
#[derive(Debug)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    limit: usize,
    total: u64,
    truncated: bool,
}

impl BoundedBuffer {
    /// Create a buffer that keeps at most `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            total: 0,
            truncated: false,
        }
    }

    /// Append a chunk. Bytes past the limit are counted, not stored.
    pub fn write(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.total = self.total.saturating_add(chunk.len() as u64);

        let room = self.limit - self.data.len();
        if room == 0 {
            self.truncated = true;
            return;
        }

        let take = chunk.len().min(room);
        if take < chunk.len() {
            self.truncated = true;
        }

        self.reserve_for(take);
        self.data.extend_from_slice(&chunk[..take]);
    }

    /// Grow storage geometrically, capped at the limit.
    fn reserve_for(&mut self, additional: usize) {
        let needed = self.data.len() + additional;
        let capacity = self.data.capacity();
        if needed <= capacity {
            return;
        }
        let target = capacity
            .saturating_mul(2)
            .max(INITIAL_CAPACITY)
            .max(needed)
            .min(self.limit);
        self.data.reserve_exact(target - self.data.len());
    }

    /// Bytes captured so far (never more than the limit).
    #[inline]
    pub fn captured(&self) -> &[u8] {
        &self.data
    }

    /// Total bytes ever written, including those past the limit.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Whether any written byte was dropped.
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Configured limit.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Mark the capture incomplete (e.g. the source failed mid-stream).
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Snapshot the capture as a log body.
    pub fn to_captured_body(&self, mode: BodyMode) -> CapturedBody {
        CapturedBody::from_parts(&self.data, self.total, self.truncated, mode)
    }

    /// Consume the buffer into a log body.
    pub fn into_captured_body(self, mode: BodyMode) -> CapturedBody {
        self.to_captured_body(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_write_keeps_prefix() {
        let mut buf = BoundedBuffer::new(10);
        buf.write(&[1; 6]);
        buf.write(&[2; 6]);

        assert_eq!(buf.captured().len(), 10);
        assert_eq!(buf.total_bytes(), 12);
        assert!(buf.truncated());
        assert_eq!(&buf.captured()[6..], &[2, 2, 2, 2]);
    }

    #[test]
    fn test_zero_limit_counts_only() {
        let mut buf = BoundedBuffer::new(0);
        buf.write(b"hello");

        assert!(buf.captured().is_empty());
        assert!(buf.truncated());
        assert_eq!(buf.total_bytes(), 5);
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let mut buf = BoundedBuffer::new(4);
        buf.write(b"ab");
        buf.write(b"cd");
        assert!(!buf.truncated());
        assert_eq!(buf.captured(), b"abcd");

        buf.write(b"e");
        assert!(buf.truncated());
        assert_eq!(buf.total_bytes(), 5);
    }

    #[test]
    fn test_empty_writes_are_ignored() {
        let mut buf = BoundedBuffer::new(0);
        buf.write(b"");
        assert!(!buf.truncated());
        assert_eq!(buf.total_bytes(), 0);
    }

    #[test]
    fn test_capacity_never_exceeds_limit() {
        let mut buf = BoundedBuffer::new(1000);
        for _ in 0..100 {
            buf.write(&[7; 33]);
            assert!(buf.data.capacity() <= 1000);
        }
        assert_eq!(buf.captured().len(), 1000);
        assert_eq!(buf.total_bytes(), 3300);
    }

    #[test]
    fn test_small_limit_allocation() {
        let mut buf = BoundedBuffer::new(8);
        buf.write(b"x");
        assert!(buf.data.capacity() <= 8);
    }

    #[test]
    fn test_into_captured_body() {
        let mut buf = BoundedBuffer::new(3);
        buf.write(b"abcdef");
        let body = buf.into_captured_body(BodyMode::Text);

        assert_eq!(body.total_bytes, 6);
        assert!(body.truncated);
        assert_eq!(body.value.as_deref(), Some("abc"));
    }
}
