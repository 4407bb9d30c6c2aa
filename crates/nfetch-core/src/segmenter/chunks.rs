//! Chunk arithmetic: final segment index and byte spans.

/// Byte span `[start, end)` of one segment inside the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub index: u64,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl SegmentSpan {
    /// Span of segment `index` for content of `total_size` bytes, or `None`
    /// when the segment lies past the end.
    pub fn for_index(index: u64, chunk_size: u64, total_size: u64) -> Option<Self> {
        let start = segment_offset(index, chunk_size)?;
        if start >= total_size {
            return None;
        }
        let end = start.saturating_add(chunk_size).min(total_size);
        Some(SegmentSpan { index, start, end })
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index of the final segment: `ceil(size / chunk_size) - 1`, or `-1` for
/// empty content (zero segments).
pub fn final_segment_for_size(size: u64, chunk_size: u64) -> i64 {
    if size == 0 || chunk_size == 0 {
        return -1;
    }
    (size.div_ceil(chunk_size) as i64) - 1
}

/// Number of segments for a final segment index (`-1` gives 0).
pub fn segment_count(final_segment: i64) -> u64 {
    if final_segment < 0 {
        0
    } else {
        final_segment as u64 + 1
    }
}

/// Byte offset of segment `index`; `None` on overflow.
pub fn segment_offset(index: u64, chunk_size: u64) -> Option<u64> {
    index.checked_mul(chunk_size)
}
