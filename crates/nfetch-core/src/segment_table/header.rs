//! On-disk header of a `.sgt` file.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic "NSGT" | version u8 | chunk_size u32 | final_segment i64 | name_len u32 | name | bitmap
//! ```

use crate::name::ContentName;

pub(crate) const MAGIC: &[u8; 4] = b"NSGT";
pub(crate) const VERSION: u8 = 1;

/// Magic, version, chunk size, final segment, name length.
const FIXED_LEN: usize = 4 + 1 + 4 + 8 + 4;

/// What a segment table describes: which content, cut how, ending where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub qualified_name: ContentName,
    pub chunk_size: u32,
    /// Index of the last segment, `-1` while unknown (or for empty content
    /// before the first response).
    pub final_segment: i64,
}

impl TableLayout {
    pub fn new(qualified_name: ContentName, chunk_size: u32, final_segment: Option<u64>) -> Self {
        TableLayout {
            qualified_name,
            chunk_size,
            final_segment: final_segment.map(|f| f as i64).unwrap_or(-1),
        }
    }

    pub fn final_segment(&self) -> Option<u64> {
        u64::try_from(self.final_segment).ok()
    }

    /// Whether a table with this layout can continue a download described by `other`.
    pub fn resumes(&self, qualified_name: &ContentName, chunk_size: u32) -> bool {
        self.qualified_name == *qualified_name && self.chunk_size == chunk_size
    }
}

pub(crate) fn encode(layout: &TableLayout) -> Vec<u8> {
    let name = layout.qualified_name.to_string();
    let mut out = Vec::with_capacity(FIXED_LEN + name.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&layout.chunk_size.to_le_bytes());
    out.extend_from_slice(&layout.final_segment.to_le_bytes());
    out.extend_from_slice(&(name.len() as u32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

/// Parse a header; returns the layout and the offset where the bitmap starts.
/// `None` for anything unrecognized (the caller treats it as an empty table).
pub(crate) fn decode(buf: &[u8]) -> Option<(TableLayout, usize)> {
    if buf.len() < FIXED_LEN || &buf[..4] != MAGIC || buf[4] != VERSION {
        return None;
    }
    let chunk_size = u32::from_le_bytes(buf[5..9].try_into().ok()?);
    let final_segment = i64::from_le_bytes(buf[9..17].try_into().ok()?);
    let name_len = u32::from_le_bytes(buf[17..21].try_into().ok()?) as usize;
    if chunk_size == 0 || final_segment < -1 {
        return None;
    }
    let name_end = FIXED_LEN.checked_add(name_len)?;
    let name = std::str::from_utf8(buf.get(FIXED_LEN..name_end)?).ok()?;
    let layout = TableLayout {
        qualified_name: ContentName::parse(name),
        chunk_size,
        final_segment,
    };
    Some((layout, name_end))
}
