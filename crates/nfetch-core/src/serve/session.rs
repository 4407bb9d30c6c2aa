use crate::name::ContentName;
use crate::transport::{Authority, Data};

use super::source::SegmentSource;
use super::ServeError;

/// Serves one piece of content under `prefix`, cut into `chunk_size` segments.
#[derive(Debug)]
pub struct ServeSession<S> {
    prefix: ContentName,
    source: S,
    chunk_size: u32,
}

impl<S: SegmentSource> ServeSession<S> {
    pub fn new(prefix: ContentName, source: S, chunk_size: u32) -> Self {
        ServeSession {
            prefix,
            source,
            chunk_size,
        }
    }

    pub fn prefix(&self) -> &ContentName {
        &self.prefix
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Bytes of segment `index`: exactly `chunk_size` except for the last.
    pub fn get_segment(&mut self, index: u64) -> Result<Vec<u8>, ServeError> {
        self.source
            .read_segment(index, self.chunk_size)?
            .ok_or(ServeError::NotFound(index))
    }

    /// `ceil(size / chunk_size) - 1`; `-1` for empty content.
    pub fn final_segment(&mut self) -> Result<i64, ServeError> {
        self.source.final_segment(self.chunk_size)
    }

    /// Final segment if known without reading further.
    pub fn known_final(&self) -> Option<i64> {
        self.source.known_final(self.chunk_size)
    }

    /// Answer an interest for `prefix` (segment 0) or `prefix/<segment>`.
    pub fn respond(&mut self, name: &ContentName) -> Option<Data> {
        let index = self.segment_for(name)?;
        let content = match self.get_segment(index) {
            Ok(content) => content,
            Err(ServeError::NotFound(_)) if index == 0 && self.known_final() == Some(-1) => {
                // Empty content: one empty, final segment.
                Vec::new()
            }
            Err(ServeError::NotFound(_)) => return None,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "cannot serve segment");
                return None;
            }
        };
        let final_block_id = self
            .known_final()
            .map(|f| u64::try_from(f).unwrap_or(0));
        tracing::trace!(segment = index, bytes = content.len(), "serving segment");
        Some(
            Data::new(self.prefix.clone().append_segment(index), content)
                .with_final_block_id(final_block_id),
        )
    }

    fn segment_for(&self, name: &ContentName) -> Option<u64> {
        if !self.prefix.is_prefix_of(name) {
            return None;
        }
        match name.len() - self.prefix.len() {
            0 => Some(0),
            1 => name.segment(),
            _ => None,
        }
    }
}

impl<S: SegmentSource> Authority for ServeSession<S> {
    fn serve(&mut self, name: &ContentName) -> Option<Data> {
        self.respond(name)
    }
}
