//! Storage side of a fetch: the locked segment table plus the part file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::name::ContentName;
use crate::progress::FetchProgress;
use crate::segment_table::{SegmentTable, TableLayout};
use crate::storage::{part_path, PartFile, PartFileBuilder};

use super::FetchError;

#[derive(Debug)]
pub(crate) struct Download {
    path: PathBuf,
    table: SegmentTable,
    part: PartFile,
    chunk_size: u32,
    bytes_received: u64,
    started: Instant,
}

impl Download {
    /// Pick up a previous run for `path` when the table holds a usable layout
    /// and the part file is still there.
    pub(crate) fn resume(
        path: &Path,
        table: SegmentTable,
        chunk_size: u32,
    ) -> Result<Result<Self, SegmentTable>, FetchError> {
        let usable = table
            .layout()
            .is_some_and(|l| l.chunk_size == chunk_size && !l.qualified_name.is_empty());
        let part = part_path(path);
        if !usable || !part.exists() {
            return Ok(Err(table));
        }
        let part = PartFile::open_existing(&part)?;
        tracing::info!(
            path = %path.display(),
            done = table.completed_count(),
            "resuming download"
        );
        Ok(Ok(Self::with(path, table, part, chunk_size)))
    }

    /// Storage for `qualified_name` at `path`. Keeps earlier progress when the
    /// table already describes the same content; otherwise starts over,
    /// overwriting any stale part file.
    pub(crate) fn prepare(
        path: &Path,
        mut table: SegmentTable,
        qualified_name: &ContentName,
        chunk_size: u32,
        final_segment: Option<u64>,
    ) -> Result<Self, FetchError> {
        let part = part_path(path);
        let resumable = table
            .layout()
            .is_some_and(|l| l.resumes(qualified_name, chunk_size))
            && part.exists();
        if resumable {
            let mut download = Self::with(path, table, PartFile::open_existing(&part)?, chunk_size);
            tracing::info!(
                path = %path.display(),
                done = download.table.completed_count(),
                "resuming download"
            );
            if let Some(f) = final_segment {
                download.learn_final(f)?;
            }
            return Ok(download);
        }

        table.reset(TableLayout::new(qualified_name.clone(), chunk_size, final_segment))?;
        let mut builder = PartFileBuilder::create(&part)?;
        if let Some(f) = final_segment {
            builder.preallocate(f.saturating_mul(chunk_size as u64))?;
        }
        Ok(Self::with(path, table, builder.build(), chunk_size))
    }

    fn with(path: &Path, table: SegmentTable, part: PartFile, chunk_size: u32) -> Self {
        Download {
            path: path.to_path_buf(),
            table,
            part,
            chunk_size,
            bytes_received: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn qualified_name(&self) -> Option<&ContentName> {
        self.table.layout().map(|l| &l.qualified_name)
    }

    pub(crate) fn final_segment(&self) -> Option<u64> {
        self.table.layout().and_then(TableLayout::final_segment)
    }

    pub(crate) fn learn_final(&mut self, final_segment: u64) -> Result<(), FetchError> {
        self.table.set_final_segment(final_segment)?;
        Ok(())
    }

    pub(crate) fn is_complete(&self, index: u64) -> bool {
        self.table.is_complete(index)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.table.is_full()
    }

    pub(crate) fn first_incomplete(&self) -> Option<u64> {
        self.table.first_incomplete()
    }

    pub(crate) fn completed_count(&self) -> u64 {
        self.table.completed_count()
    }

    /// Write segment `index` at its offset, then mark it. Returns `false`
    /// for a segment already on disk.
    pub(crate) fn store(&mut self, index: u64, content: &[u8]) -> Result<bool, FetchError> {
        if self.table.is_complete(index) {
            return Ok(false);
        }
        let chunk = self.chunk_size as u64;
        let got = content.len() as u64;
        let short_ok = match self.final_segment() {
            Some(f) => index >= f,
            None => true,
        };
        if got > chunk || (got < chunk && !short_ok) {
            return Err(FetchError::SegmentSize {
                index,
                expected: chunk,
                got,
            });
        }
        self.part.write_at(index * chunk, content)?;
        self.table.mark_complete(index)?;
        self.bytes_received += got;
        tracing::debug!(segment = index, bytes = got, "stored segment");
        Ok(true)
    }

    pub(crate) fn progress(&self) -> FetchProgress {
        FetchProgress {
            segments_done: self.table.completed_count(),
            segment_count: self.table.segment_count(),
            bytes_received: self.bytes_received,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Sync, rename the part file into place, then drop the table. Watchers
    /// see the table vanish only after the final file exists.
    pub(crate) fn finalize(self) -> Result<PathBuf, FetchError> {
        let Download {
            path, table, part, ..
        } = self;
        part.sync()?;
        part.finalize(&path)?;
        table.delete_and_unlock()?;
        tracing::info!(path = %path.display(), "download complete");
        Ok(path)
    }

    /// Stop without finishing: flush what we have and release the lock.
    pub(crate) fn abandon(self) {
        if let Err(e) = self.part.sync() {
            tracing::warn!(error = %e, "sync of part file failed");
        }
        self.table.release();
    }
}
