//! Disk I/O and file lifecycle for in-progress downloads.
//!
//! A download writes into `<target>.part` at segment offsets (pwrite-style,
//! out of order) and is atomically renamed to `<target>` once every segment
//! is present. The companion `<target>.sgt` holds the segment table.

mod builder;
mod error;
mod writer;

pub use builder::PartFileBuilder;
pub use error::StorageError;
pub use writer::PartFile;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix of the in-progress output file.
pub const PART_SUFFIX: &str = ".part";

/// Suffix of the persisted segment table.
pub const TABLE_SUFFIX: &str = ".sgt";

/// Path of the part file: appends `.part` (e.g. `file.iso` → `file.iso.part`).
pub fn part_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, PART_SUFFIX)
}

/// Path of the segment table: appends `.sgt`.
pub fn table_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, TABLE_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o: OsString = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}
