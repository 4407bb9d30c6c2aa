//! Segment math and completion bitmaps.
//!
//! Content is cut into fixed-size chunks numbered from 0; only the final
//! chunk may be shorter. The bitmap records which segments are on disk.

mod bitmap;
mod chunks;

pub use bitmap::SegmentBitmap;
pub use chunks::{final_segment_for_size, segment_count, segment_offset, SegmentSpan};
