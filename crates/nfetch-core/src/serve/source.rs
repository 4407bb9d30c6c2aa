//! Byte sources a producer can cut into segments.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::segmenter::{final_segment_for_size, SegmentSpan};

use super::ServeError;

/// Random access to segment bytes.
pub trait SegmentSource {
    /// Bytes of segment `index`, or `None` past the end.
    fn read_segment(&mut self, index: u64, chunk_size: u32) -> Result<Option<Vec<u8>>, ServeError>;

    /// Final segment index if already known (`-1` for empty content).
    fn known_final(&self, chunk_size: u32) -> Option<i64>;

    /// Final segment index, reading as far as needed to learn it.
    fn final_segment(&mut self, chunk_size: u32) -> Result<i64, ServeError>;
}

/// A regular file; size comes from its metadata.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, ServeError> {
        let io_err = |source| ServeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len();
        Ok(FileSource {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl SegmentSource for FileSource {
    fn read_segment(&mut self, index: u64, chunk_size: u32) -> Result<Option<Vec<u8>>, ServeError> {
        let Some(span) = SegmentSpan::for_index(index, chunk_size as u64, self.size) else {
            return Ok(None);
        };
        let mut buf = vec![0u8; span.len() as usize];
        self.file
            .seek(SeekFrom::Start(span.start))
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|source| ServeError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(buf))
    }

    fn known_final(&self, chunk_size: u32) -> Option<i64> {
        Some(final_segment_for_size(self.size, chunk_size as u64))
    }

    fn final_segment(&mut self, chunk_size: u32) -> Result<i64, ServeError> {
        Ok(final_segment_for_size(self.size, chunk_size as u64))
    }
}

/// A forward-only reader (pipe, socket, decompressor). Chunks are kept in
/// memory once read. Reads run one chunk ahead of the caller, so the end is
/// known by the time the last segment is handed out.
pub struct StreamSource<R> {
    reader: R,
    chunks: Vec<Vec<u8>>,
    eof: bool,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        StreamSource {
            reader,
            chunks: Vec::new(),
            eof: false,
        }
    }

    /// Read forward until segment `index + 1` is cached or the stream ends.
    fn fill_to(&mut self, index: u64, chunk_size: u32) -> Result<(), ServeError> {
        let want = index.saturating_add(1);
        while !self.eof && self.chunks.len() as u64 <= want {
            let mut chunk = Vec::with_capacity(chunk_size as usize);
            (&mut self.reader)
                .take(chunk_size as u64)
                .read_to_end(&mut chunk)
                .map_err(|source| ServeError::Io {
                    path: PathBuf::from("<stream>"),
                    source,
                })?;
            if (chunk.len() as u64) < chunk_size as u64 {
                self.eof = true;
            }
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
        Ok(())
    }
}

impl<R: Read> SegmentSource for StreamSource<R> {
    fn read_segment(&mut self, index: u64, chunk_size: u32) -> Result<Option<Vec<u8>>, ServeError> {
        self.fill_to(index, chunk_size)?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| self.chunks.get(i))
            .cloned())
    }

    fn known_final(&self, _chunk_size: u32) -> Option<i64> {
        self.eof.then(|| self.chunks.len() as i64 - 1)
    }

    fn final_segment(&mut self, chunk_size: u32) -> Result<i64, ServeError> {
        self.fill_to(u64::MAX, chunk_size)?;
        Ok(self.chunks.len() as i64 - 1)
    }
}

impl<R> std::fmt::Debug for StreamSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("cached", &self.chunks.len())
            .field("eof", &self.eof)
            .finish()
    }
}
