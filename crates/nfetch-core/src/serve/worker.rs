//! Streamed delivery: push consecutive segments into a writer shared with
//! the consumer instead of answering one interest at a time.

use std::io::{Seek, SeekFrom, Write};

use super::source::SegmentSource;
use super::{ServeError, ServeSession};

/// Which segments are in the shared file so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    pub first_segment: u64,
    pub last_segment: u64,
    /// Set once the producer knows where the content ends.
    pub final_segment: Option<u64>,
}

pub struct StreamWorker<'a, S> {
    session: &'a mut ServeSession<S>,
}

impl<'a, S: SegmentSource> StreamWorker<'a, S> {
    pub fn new(session: &'a mut ServeSession<S>) -> Self {
        StreamWorker { session }
    }

    /// Write segments `first_segment..=final` at their offsets in `writer`,
    /// calling `on_progress` every `progress_every` segments and once at the
    /// end. Returns the final segment index.
    pub fn run<W, P>(
        &mut self,
        writer: &mut W,
        first_segment: u64,
        progress_every: u64,
        mut on_progress: P,
    ) -> Result<u64, ServeError>
    where
        W: Write + Seek,
        P: FnMut(StreamProgress),
    {
        let chunk = self.session.chunk_size() as u64;
        let every = progress_every.max(1);
        let io_err = |source| ServeError::Io {
            path: "<shared stream>".into(),
            source,
        };
        writer
            .seek(SeekFrom::Start(first_segment * chunk))
            .map_err(io_err)?;
        tracing::info!(prefix = %self.session.prefix(), first_segment, "streaming segments");

        let mut index = first_segment;
        let mut written = 0u64;
        loop {
            let buf = match self.session.get_segment(index) {
                Ok(buf) => buf,
                Err(ServeError::NotFound(_)) => break,
                Err(e) => return Err(e),
            };
            writer.write_all(&buf).and_then(|_| writer.flush()).map_err(io_err)?;
            written += 1;
            let known = self.session.known_final().and_then(|f| u64::try_from(f).ok());
            if known == Some(index) {
                index += 1;
                break;
            }
            if written % every == 0 {
                on_progress(StreamProgress {
                    first_segment,
                    last_segment: index,
                    final_segment: known,
                });
            }
            index += 1;
        }

        // Empty content is one empty, final segment 0.
        let final_segment = if written == 0 && first_segment == 0 {
            0
        } else if written == 0 {
            return Err(ServeError::NotFound(first_segment));
        } else {
            index - 1
        };
        on_progress(StreamProgress {
            first_segment,
            last_segment: final_segment,
            final_segment: Some(final_segment),
        });
        tracing::info!(final_segment, "stream finished");
        Ok(final_segment)
    }
}
