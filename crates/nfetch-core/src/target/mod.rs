//! Where a fetched file lands on disk.
//!
//! A [`FileTarget`] writes to a path fixed by the caller. A [`DirTarget`]
//! derives the path from the qualified name the producer answers with,
//! sanitized so the result always stays inside the directory.

mod sanitize;

pub use sanitize::{relative_components, sanitize_component};

use std::io;
use std::path::{Path, PathBuf};

use crate::name::ContentName;

/// Fallback file name when a qualified name has no usable component.
pub const DEFAULT_FILENAME: &str = "download.bin";

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("{} resolves outside {}", path.display(), root.display())]
    PathEscape { path: PathBuf, root: PathBuf },
    #[error("cannot prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Output location for a fetch.
pub trait Target {
    /// Path known before any response arrives. `Some` enables locking and
    /// resume at start time.
    fn known_path(&self) -> Option<&Path>;

    /// Final path for content answered under `qualified_name`. Creates any
    /// missing parent directories.
    fn resolve(&self, qualified_name: &ContentName) -> Result<PathBuf, TargetError>;
}

/// Fixed output file.
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTarget { path: path.into() }
    }
}

impl Target for FileTarget {
    fn known_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn resolve(&self, _qualified_name: &ContentName) -> Result<PathBuf, TargetError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dirs(parent)?;
        }
        Ok(self.path.clone())
    }
}

/// Output directory; the file name comes from the producer.
#[derive(Debug, Clone)]
pub struct DirTarget {
    dir: PathBuf,
}

impl DirTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirTarget { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Target for DirTarget {
    fn known_path(&self) -> Option<&Path> {
        None
    }

    fn resolve(&self, qualified_name: &ContentName) -> Result<PathBuf, TargetError> {
        let parts = relative_components(qualified_name);
        let sanitized: String = parts.join("/");
        let path = if parts.is_empty() {
            self.dir.join(DEFAULT_FILENAME)
        } else {
            parts.iter().fold(self.dir.clone(), |p, c| p.join(c))
        };
        let raw = qualified_name.without_segment().to_string();
        if raw.trim_start_matches('/') != sanitized {
            tracing::warn!(name = %raw, path = %path.display(), "rewrote unsafe qualified name");
        }

        let parent = path.parent().unwrap_or(&self.dir);
        create_dirs(parent)?;

        // Parent directories may be symlinks planted inside the directory.
        let root = canonical(&self.dir)?;
        let real_parent = canonical(parent)?;
        if !real_parent.starts_with(&root) {
            return Err(TargetError::PathEscape { path, root });
        }
        if is_symlink(&path) {
            return Err(TargetError::PathEscape { path, root });
        }
        Ok(path)
    }
}

fn create_dirs(dir: &Path) -> Result<(), TargetError> {
    std::fs::create_dir_all(dir).map_err(|source| TargetError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn canonical(path: &Path) -> Result<PathBuf, TargetError> {
    path.canonicalize().map_err(|source| TargetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
