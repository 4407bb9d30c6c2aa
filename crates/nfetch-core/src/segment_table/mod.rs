//! Segment table: the persisted, lockable record of which segments of a
//! download are on disk.
//!
//! Lives next to the target as `<target>.sgt`. While a session downloads, it
//! holds an exclusive advisory lock on the file; other processes that find
//! the lock taken become watchers instead of downloading the same content.
//! Every completion is written back before the next segment is accepted, so
//! a crash loses at most the segment being written.

mod header;

pub use header::TableLayout;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt as _;

use crate::segmenter::{segment_count, SegmentBitmap};
use crate::storage::{table_path, StorageError};

/// How many times `open` retries when the file is unlinked under it.
const MAX_REOPEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("segment table {} has no layout yet", .0.display())]
    NoLayout(PathBuf),
    #[error("segment {index} is past final segment {final_segment}")]
    OutOfRange { index: u64, final_segment: u64 },
    #[error("segment table {} keeps being replaced while locking", .0.display())]
    Unstable(PathBuf),
}

/// Result of [`SegmentTable::open`]. A held lock is an expected outcome, not an error.
#[derive(Debug)]
pub enum Opened {
    Locked(SegmentTable),
    Conflict,
}

/// Lock state of a table file as seen by an outside observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockProbe {
    /// No `.sgt` file.
    Missing,
    /// Exists and some session holds the lock.
    Held,
    /// Exists but nobody holds the lock (abandoned).
    Free,
}

/// Read-only view of a table file, taken without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub layout: TableLayout,
    pub completed: u64,
    /// Total segment count; `None` while the final segment is unknown.
    pub total: Option<u64>,
}

/// A locked segment table. Dropping it closes the file and releases the lock.
#[derive(Debug)]
pub struct SegmentTable {
    file: File,
    path: PathBuf,
    layout: Option<TableLayout>,
    bitmap: SegmentBitmap,
    bitmap_offset: u64,
}

impl SegmentTable {
    /// Open (creating if absent) and lock the table for `target_path`.
    pub fn open(target_path: &Path) -> Result<Opened, TableError> {
        let path = table_path(target_path);
        for _ in 0..MAX_REOPEN {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)
                .map_err(StorageError::at("open", &path))?;

            if !try_lock(&file, &path)? {
                tracing::debug!(path = %path.display(), "segment table locked elsewhere");
                return Ok(Opened::Conflict);
            }

            // The previous holder may have unlinked the file after we opened it.
            if !still_linked(&file, &path)? {
                tracing::debug!(path = %path.display(), "segment table replaced while locking, reopening");
                continue;
            }
            return Ok(Opened::Locked(Self::load(file, path)?));
        }
        Err(TableError::Unstable(path))
    }

    fn load(file: File, path: PathBuf) -> Result<Self, TableError> {
        let mut buf = Vec::new();
        (&file)
            .read_to_end(&mut buf)
            .map_err(StorageError::at("read", &path))?;

        let (layout, bitmap, bitmap_offset) = match header::decode(&buf) {
            Some((layout, offset)) => {
                let bits = &buf[offset..];
                let count = match layout.final_segment() {
                    Some(f) => f + 1,
                    None => bits.len() as u64 * 8,
                };
                let bitmap = SegmentBitmap::from_bytes(bits, count);
                (Some(layout), bitmap, offset as u64)
            }
            None => {
                if !buf.is_empty() {
                    tracing::warn!(path = %path.display(), "unrecognized segment table, ignoring its contents");
                }
                (None, SegmentBitmap::default(), 0)
            }
        };
        Ok(SegmentTable {
            file,
            path,
            layout,
            bitmap,
            bitmap_offset,
        })
    }

    /// Check the lock on the table for `target_path` without keeping it.
    pub fn probe(target_path: &Path) -> Result<LockProbe, TableError> {
        let path = table_path(target_path);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockProbe::Missing),
            Err(e) => return Err(StorageError::new("open", &path, e).into()),
        };
        if try_lock(&file, &path)? {
            let _ = fs2::FileExt::unlock(&file);
            Ok(LockProbe::Free)
        } else {
            Ok(LockProbe::Held)
        }
    }

    /// Read the table for `target_path` without locking it. `None` when the
    /// file is missing or unrecognized.
    pub fn inspect(target_path: &Path) -> Result<Option<TableSnapshot>, TableError> {
        let path = table_path(target_path);
        let buf = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::new("read", &path, e).into()),
        };
        let Some((layout, offset)) = header::decode(&buf) else {
            return Ok(None);
        };
        let total = layout.final_segment().map(|f| f + 1);
        let bits = &buf[offset..];
        let count = total.unwrap_or(bits.len() as u64 * 8);
        let completed = SegmentBitmap::from_bytes(bits, count).count_completed(count);
        Ok(Some(TableSnapshot {
            layout,
            completed,
            total,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layout persisted in the header, if the file held a valid one.
    pub fn layout(&self) -> Option<&TableLayout> {
        self.layout.as_ref()
    }

    /// Discard all completion state and start over with `layout`.
    pub fn reset(&mut self, layout: TableLayout) -> Result<(), TableError> {
        let count = segment_count(layout.final_segment);
        self.bitmap = SegmentBitmap::new(count);
        self.bitmap_offset = header::encode(&layout).len() as u64;
        self.layout = Some(layout);
        self.rewrite()
    }

    /// Record the final segment once it becomes known.
    pub fn set_final_segment(&mut self, final_segment: u64) -> Result<(), TableError> {
        let layout = self
            .layout
            .as_mut()
            .ok_or_else(|| TableError::NoLayout(self.path.clone()))?;
        if layout.final_segment() == Some(final_segment) {
            return Ok(());
        }
        layout.final_segment = final_segment as i64;
        self.bitmap = SegmentBitmap::from_bytes(self.bitmap.as_bytes(), final_segment + 1);
        self.rewrite()
    }

    /// Mark segment `index` complete and persist the touched byte. Returns
    /// `false` if it was already marked.
    pub fn mark_complete(&mut self, index: u64) -> Result<bool, TableError> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| TableError::NoLayout(self.path.clone()))?;
        if let Some(final_segment) = layout.final_segment() {
            if index > final_segment {
                return Err(TableError::OutOfRange {
                    index,
                    final_segment,
                });
            }
        }
        let Some((byte_idx, value)) = self.bitmap.set_completed(index) else {
            return Ok(false);
        };
        let offset = self.bitmap_offset + byte_idx as u64;
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .and_then(|_| f.write_all(&[value]))
            .and_then(|_| self.file.sync_data())
            .map_err(StorageError::at("write", &self.path))?;
        Ok(true)
    }

    pub fn is_complete(&self, index: u64) -> bool {
        self.bitmap.is_completed(index)
    }

    /// True once the final segment is known and every segment up to it is marked.
    pub fn is_full(&self) -> bool {
        match self.layout.as_ref().and_then(TableLayout::final_segment) {
            Some(f) => self.bitmap.all_completed(f + 1),
            None => false,
        }
    }

    /// Known segment count: `final + 1`, or `None` while the final is unknown.
    pub fn segment_count(&self) -> Option<u64> {
        self.layout
            .as_ref()
            .and_then(TableLayout::final_segment)
            .map(|f| f + 1)
    }

    pub fn completed_count(&self) -> u64 {
        let bits = self.segment_count().unwrap_or_else(|| self.bitmap.bit_len());
        self.bitmap.count_completed(bits)
    }

    /// Lowest segment not yet marked. `None` when the table is full; with an
    /// unknown final segment there is always an answer.
    pub fn first_incomplete(&self) -> Option<u64> {
        match self.segment_count() {
            Some(count) => self.bitmap.first_incomplete(count),
            None => {
                let bits = self.bitmap.bit_len();
                Some(self.bitmap.first_incomplete(bits).unwrap_or(bits))
            }
        }
    }

    /// Unlink the table file, then release the lock. Watchers see the file
    /// disappear and know the download finished.
    pub fn delete_and_unlock(self) -> Result<(), TableError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::new("remove", &self.path, e).into()),
        }
        self.release();
        Ok(())
    }

    /// Release the lock and keep the file for a later attempt.
    pub fn release(self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::debug!(path = %self.path.display(), error = %e, "unlock failed; closing releases it");
        }
    }

    fn rewrite(&mut self) -> Result<(), TableError> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| TableError::NoLayout(self.path.clone()))?;
        let mut bytes = header::encode(layout);
        bytes.extend_from_slice(self.bitmap.as_bytes());
        let mut f = &self.file;
        f.set_len(0)
            .and_then(|_| f.seek(SeekFrom::Start(0)))
            .and_then(|_| f.write_all(&bytes))
            .and_then(|_| f.sync_data())
            .map_err(StorageError::at("write", &self.path))?;
        Ok(())
    }
}

/// Non-blocking exclusive advisory lock. `false` when someone else holds it.
fn try_lock(file: &File, path: &Path) -> Result<bool, TableError> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(StorageError::new("lock", path, e).into()),
    }
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> Result<bool, TableError> {
    use std::os::unix::fs::MetadataExt;
    let held = file.metadata().map_err(StorageError::at("stat", path))?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::new("stat", path, e).into()),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> Result<bool, TableError> {
    Ok(path.exists())
}
