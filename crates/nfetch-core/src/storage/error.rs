//! Storage failure type.

use std::io;
use std::path::{Path, PathBuf};

/// Disk write/lock/rename failure with the operation and path that failed.
#[derive(Debug, thiserror::Error)]
#[error("{op} {}: {source}", path.display())]
pub struct StorageError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl StorageError {
    pub fn new(op: &'static str, path: &Path, source: io::Error) -> Self {
        StorageError {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Adapter for `map_err`: `file.sync_all().map_err(StorageError::at("sync", path))`.
    pub fn at<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> StorageError + 'a {
        move |source| StorageError::new(op, path, source)
    }
}
