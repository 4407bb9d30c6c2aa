//! Consumer for streamed delivery: the producer writes consecutive segments
//! into a shared file and reports which ones are there.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;

use crate::name::ContentName;
use crate::segment_table::{Opened, SegmentTable};
use crate::serve::StreamProgress;
use crate::storage::StorageError;
use crate::target::Target;

use super::download::Download;
use super::{FetchError, FetchEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowStatus {
    Pending,
    Complete(PathBuf),
}

/// Copies reported segments out of the shared file into the target.
pub struct StreamFollower {
    shared: File,
    download: Option<Download>,
    chunk_size: u32,
    /// Next segment to copy.
    current: u64,
    events: UnboundedSender<FetchEvent>,
}

impl StreamFollower {
    /// Lock the target's table and prepare its part file. `None` when another
    /// session holds the lock.
    pub fn open(
        target: &dyn Target,
        qualified_name: &ContentName,
        chunk_size: u32,
        final_segment: Option<u64>,
        shared: File,
        events: UnboundedSender<FetchEvent>,
    ) -> Result<Option<Self>, FetchError> {
        let path = target.resolve(qualified_name)?;
        let table = match SegmentTable::open(&path)? {
            Opened::Locked(table) => table,
            Opened::Conflict => return Ok(None),
        };
        let download = Download::prepare(&path, table, qualified_name, chunk_size, final_segment)?;
        Ok(Some(StreamFollower {
            shared,
            download: Some(download),
            chunk_size,
            current: 0,
            events,
        }))
    }

    /// Copy every segment up to `progress.last_segment` not yet on disk.
    pub fn on_progress(&mut self, progress: &StreamProgress) -> Result<FollowStatus, FetchError> {
        let Some(download) = self.download.as_mut() else {
            return Err(FetchError::InvalidState(super::FetchState::Complete));
        };
        if let Some(f) = progress.final_segment {
            download.learn_final(f)?;
        }
        let mut index = self.current.max(progress.first_segment);
        while index <= progress.last_segment {
            if !download.is_complete(index) {
                let buf = read_chunk(&self.shared, index, self.chunk_size)
                    .map_err(StorageError::at("read stream for", download.path()))?;
                let is_final = download.final_segment() == Some(index);
                let whole = buf.len() == self.chunk_size as usize
                    || (is_final && (!buf.is_empty() || index == 0));
                if !whole {
                    tracing::warn!(segment = index, bytes = buf.len(), "reported segment not in stream yet");
                    break;
                }
                if download.store(index, &buf)? {
                    let _ = self.events.send(FetchEvent::Progress(download.progress()));
                }
            }
            index += 1;
        }
        self.current = index;

        if !download.is_full() {
            return Ok(FollowStatus::Pending);
        }
        let Some(download) = self.download.take() else {
            return Ok(FollowStatus::Pending);
        };
        let path = download.finalize()?;
        let _ = self.events.send(FetchEvent::Complete { path: path.clone() });
        Ok(FollowStatus::Complete(path))
    }

    /// Stop following; what has been copied stays for a later attempt.
    pub fn cancel(mut self) {
        if let Some(download) = self.download.take() {
            download.abandon();
        }
    }
}

fn read_chunk(shared: &File, index: u64, chunk_size: u32) -> std::io::Result<Vec<u8>> {
    let mut f = shared;
    f.seek(SeekFrom::Start(index * chunk_size as u64))?;
    let mut buf = Vec::with_capacity(chunk_size as usize);
    f.take(chunk_size as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
