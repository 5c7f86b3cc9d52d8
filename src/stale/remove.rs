//! Removal of a single stale file.
//!
//! # Safety
//!
//! Every removal is scoped to the cache root of the sweep: a path that
//! does not lie under the root is refused before the filesystem is
//! touched, and only regular files are ever removed.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Error type for stale file removal.
#[derive(Debug, Error)]
pub enum RemoveError {
    /// File was not found (may have been removed by someone else).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to remove.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path lies outside the cache root being swept.
    #[error("refusing to remove {path}: not under cache root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RemoveError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::NotAFile(p)
            | Self::OutsideRoot { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Something that can remove a stale file.
///
/// The reconciler calls [`remove`](FileRemover::remove) from worker
/// threads, once per stale file.
pub trait FileRemover: Send + Sync {
    /// Remove `path`, which the walk found under `root`. Returns the number
    /// of bytes freed.
    ///
    /// # Errors
    ///
    /// Returns [`RemoveError`] if the file could not be removed.
    fn remove(&self, root: &Path, path: &Path) -> Result<u64, RemoveError>;
}

/// Permanently removes files with [`fs::remove_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PermanentRemover;

impl FileRemover for PermanentRemover {
    fn remove(&self, root: &Path, path: &Path) -> Result<u64, RemoveError> {
        remove_stale_file(root, path)
    }
}

/// Permanently remove a regular file that lies under `root`.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `OutsideRoot` if `path` is not below `root`
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if removal is not allowed
/// - `NotAFile` if the path is a directory, symlink or special file
pub fn remove_stale_file(root: &Path, path: &Path) -> Result<u64, RemoveError> {
    // Only the part below the root is untrusted
    let inside = path.strip_prefix(root).is_ok_and(|rest| {
        !rest.as_os_str().is_empty()
            && !rest.components().any(|c| matches!(c, Component::ParentDir))
    });
    if !inside {
        return Err(RemoveError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        });
    }

    let metadata = fs::symlink_metadata(path).map_err(|e| RemoveError::from_io(path, e))?;
    if !metadata.file_type().is_file() {
        return Err(RemoveError::NotAFile(path.to_path_buf()));
    }
    let size = metadata.len();

    fs::remove_file(path).map_err(|e| RemoveError::from_io(path, e))?;

    log::debug!("Removed stale file: {} ({} bytes)", path.display(), size);
    Ok(size)
}
