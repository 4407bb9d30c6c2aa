//! Segment completion bitmap.

/// One bit per segment (LSB of byte 0 = segment 0).
///
/// Bits are only ever set. The byte layout is what the segment table persists,
/// so a single mark is written back as the one byte [`SegmentBitmap::set_completed`] returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBitmap {
    bytes: Vec<u8>,
}

impl SegmentBitmap {
    /// New empty bitmap with room for `segment_count` bits.
    pub fn new(segment_count: u64) -> Self {
        SegmentBitmap {
            bytes: vec![0u8; byte_len(segment_count)],
        }
    }

    /// Rebuild from persisted bytes. Extra bytes are ignored; missing bytes read as 0.
    pub fn from_bytes(bytes: &[u8], segment_count: u64) -> Self {
        let len = byte_len(segment_count);
        let mut b = vec![0u8; len];
        let copy = bytes.len().min(len);
        b[..copy].copy_from_slice(&bytes[..copy]);
        let mut bitmap = SegmentBitmap { bytes: b };
        bitmap.clear_tail(segment_count);
        bitmap
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits currently backed by storage.
    pub fn bit_len(&self) -> u64 {
        self.bytes.len() as u64 * 8
    }

    /// Mark segment `index` complete. Returns `(byte_index, byte)` to persist,
    /// or `None` if the bit was already set.
    pub fn set_completed(&mut self, index: u64) -> Option<(usize, u8)> {
        let (byte_idx, mask) = locate(index);
        if byte_idx >= self.bytes.len() {
            self.bytes.resize(byte_idx + 1, 0);
        }
        if self.bytes[byte_idx] & mask != 0 {
            return None;
        }
        self.bytes[byte_idx] |= mask;
        Some((byte_idx, self.bytes[byte_idx]))
    }

    pub fn is_completed(&self, index: u64) -> bool {
        let (byte_idx, mask) = locate(index);
        self.bytes
            .get(byte_idx)
            .map(|&b| b & mask != 0)
            .unwrap_or(false)
    }

    /// True if every segment in `[0, segment_count)` is completed.
    pub fn all_completed(&self, segment_count: u64) -> bool {
        let full_bytes = (segment_count / 8) as usize;
        let remainder_bits = (segment_count % 8) as u32;
        if self.bytes.len() < byte_len(segment_count) {
            return false;
        }
        if self.bytes[..full_bytes].iter().any(|&b| b != 0xFF) {
            return false;
        }
        if remainder_bits > 0 {
            let expected = (1u8 << remainder_bits) - 1;
            return self.bytes[full_bytes] & expected == expected;
        }
        true
    }

    /// Number of completed segments in `[0, segment_count)`.
    pub fn count_completed(&self, segment_count: u64) -> u64 {
        (0..segment_count).filter(|&i| self.is_completed(i)).count() as u64
    }

    /// Lowest incomplete index below `segment_count`.
    pub fn first_incomplete(&self, segment_count: u64) -> Option<u64> {
        (0..segment_count).find(|&i| !self.is_completed(i))
    }

    // Bits past the last segment are meaningless; drop them so counts stay exact.
    fn clear_tail(&mut self, segment_count: u64) {
        let remainder_bits = (segment_count % 8) as u32;
        if remainder_bits > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= (1u8 << remainder_bits) - 1;
            }
        }
    }
}

fn byte_len(segment_count: u64) -> usize {
    segment_count.div_ceil(8) as usize
}

fn locate(index: u64) -> (usize, u8) {
    ((index / 8) as usize, 1u8 << (index % 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_set_and_query() {
        let mut b = SegmentBitmap::new(10);
        assert!(!b.all_completed(10));
        assert_eq!(b.set_completed(0), Some((0, 0b0000_0001)));
        assert_eq!(b.set_completed(3), Some((0, 0b0000_1001)));
        assert_eq!(b.set_completed(9), Some((1, 0b0000_0010)));
        assert!(b.is_completed(0));
        assert!(!b.is_completed(1));
        assert!(b.is_completed(3));
        assert!(b.is_completed(9));
        assert_eq!(b.count_completed(10), 3);
        assert_eq!(b.first_incomplete(10), Some(1));
    }

    #[test]
    fn duplicate_mark_reports_nothing_to_persist() {
        let mut b = SegmentBitmap::new(4);
        assert!(b.set_completed(2).is_some());
        assert!(b.set_completed(2).is_none());
        assert_eq!(b.count_completed(4), 1);
    }

    #[test]
    fn bitmap_all_completed() {
        let mut b = SegmentBitmap::new(5);
        for i in 0..5 {
            assert!(!b.all_completed(5));
            b.set_completed(i);
        }
        assert!(b.all_completed(5));
        assert_eq!(b.first_incomplete(5), None);
    }

    #[test]
    fn zero_segments_is_trivially_complete() {
        let b = SegmentBitmap::new(0);
        assert!(b.all_completed(0));
        assert_eq!(b.first_incomplete(0), None);
    }

    #[test]
    fn from_bytes_ignores_extra_and_tail_bits() {
        let b = SegmentBitmap::from_bytes(&[0xFF, 0xFF], 5);
        assert!(b.all_completed(5));
        assert_eq!(b.as_bytes(), &[0b0001_1111]);
        assert_eq!(b.count_completed(5), 5);
    }

    #[test]
    fn from_bytes_short_reads_as_incomplete() {
        let b = SegmentBitmap::from_bytes(&[0xFF], 16);
        assert!(b.is_completed(7));
        assert!(!b.is_completed(8));
        assert!(!b.all_completed(16));
    }
}
