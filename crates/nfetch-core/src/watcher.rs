//! Waits for another process's download of the same target to end.
//!
//! A session that finds the segment table locked does not download. It
//! watches the table instead and restarts once the holder is gone, either
//! because it finished (the table was deleted) or because it died (the
//! table is still there but nobody holds the lock).

use std::path::{Path, PathBuf};

use crate::segment_table::{LockProbe, SegmentTable, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The table file was removed.
    Removed,
    /// The table file remains but its lock is free.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    Pending,
    Released(ReleaseReason),
}

#[derive(Debug, Clone)]
pub struct CompletionWatcher {
    target: PathBuf,
}

impl CompletionWatcher {
    pub fn watch(target_path: &Path) -> Self {
        tracing::info!(target = %target_path.display(), "download in progress elsewhere, watching");
        CompletionWatcher {
            target: target_path.to_path_buf(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn poll(&self) -> Result<WatchStatus, TableError> {
        let status = match SegmentTable::probe(&self.target)? {
            LockProbe::Held => WatchStatus::Pending,
            LockProbe::Missing => WatchStatus::Released(ReleaseReason::Removed),
            LockProbe::Free => {
                tracing::warn!(target = %self.target.display(), "segment table abandoned by its holder");
                WatchStatus::Released(ReleaseReason::Abandoned)
            }
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_table::Opened;

    #[test]
    fn pending_while_held_then_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file");
        let Opened::Locked(table) = SegmentTable::open(&target).unwrap() else {
            panic!("expected lock");
        };
        let w = CompletionWatcher::watch(&target);
        assert_eq!(w.poll().unwrap(), WatchStatus::Pending);
        table.delete_and_unlock().unwrap();
        assert_eq!(w.poll().unwrap(), WatchStatus::Released(ReleaseReason::Removed));
    }

    #[test]
    fn released_when_holder_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file");
        let Opened::Locked(table) = SegmentTable::open(&target).unwrap() else {
            panic!("expected lock");
        };
        let w = CompletionWatcher::watch(&target);
        drop(table);
        assert_eq!(w.poll().unwrap(), WatchStatus::Released(ReleaseReason::Abandoned));
    }
}
