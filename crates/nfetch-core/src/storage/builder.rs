//! Builder for creating and preallocating part files.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::error::StorageError;
use super::writer::PartFile;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Builder for a fresh part file. Call `preallocate` (optional) then `build`.
pub struct PartFileBuilder {
    file: File,
    path: PathBuf,
}

impl PartFileBuilder {
    /// Create the part file at `path` (e.g. `destination.part`), truncating
    /// whatever a previous attempt left there.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(StorageError::at("create", path))?;
        Ok(PartFileBuilder {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Reserve `size` bytes. On Unix tries `posix_fallocate`; falls back to
    /// `set_len`. Only the bytes before the final segment are known up front,
    /// so callers pass `final_segment * chunk_size`.
    pub fn preallocate(&mut self, size: u64) -> Result<(), StorageError> {
        if size == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(size)
            .map_err(StorageError::at("preallocate", &self.path))
    }

    pub fn build(self) -> PartFile {
        PartFile::from_file_and_path(self.file, self.path)
    }
}
