//! Offset writer for part files.

use std::fs::File;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use super::error::StorageError;

/// Mode of a finished download.
#[cfg(unix)]
const FINAL_MODE: u32 = 0o644;

/// In-progress output file. Writes are positioned and never move a cursor,
/// so segments can land in any order.
#[derive(Debug)]
pub struct PartFile {
    file: File,
    path: PathBuf,
}

impl PartFile {
    pub(crate) fn from_file_and_path(file: File, path: PathBuf) -> Self {
        Self { file, path }
    }

    /// Open an existing part file for resume (read+write, no truncation).
    pub fn open_existing(path: &Path) -> Result<Self, StorageError> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .map_err(StorageError::at("open", path))?;
        Ok(PartFile {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Write all of `data` at `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all_at(data, offset)
            .map_err(StorageError::at("write", &self.path))
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .and_then(|_| f.write_all(data))
            .map_err(StorageError::at("write", &self.path))
    }

    /// Read up to `buf.len()` bytes at `offset`; returns the count read.
    #[cfg(unix)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read_at(&mut buf[filled..], offset + filled as u64)
                .map_err(StorageError::at("read", &self.path))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    #[cfg(not(unix))]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        use std::io::{Read, Seek, SeekFrom};
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .map_err(StorageError::at("read", &self.path))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = f
                .read(&mut buf[filled..])
                .map_err(StorageError::at("read", &self.path))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    pub fn sync(&self) -> Result<(), StorageError> {
        self.file
            .sync_all()
            .map_err(StorageError::at("sync", &self.path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename to `final_path` (replacing any existing file) and set mode 0644.
    /// Consumes and closes the file. Fails across filesystems.
    pub fn finalize(self, final_path: &Path) -> Result<(), StorageError> {
        let PartFile { file, path } = self;
        drop(file);

        std::fs::rename(&path, final_path).map_err(StorageError::at("rename", &path))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(final_path, std::fs::Permissions::from_mode(FINAL_MODE))
                .map_err(StorageError::at("chmod", final_path))?;
        }
        Ok(())
    }
}
