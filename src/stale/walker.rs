//! Recursive discovery of derived files under a cache root.
//!
//! # Overview
//!
//! [`DirectoryWalker`] walks a directory tree with [`walkdir`] and yields
//! every regular file whose name ends with a given extension. The walk is
//! single-threaded and never follows symbolic links, so it cannot leave
//! the root it was given.
//!
//! A directory whose own name ends with the extension is skipped entirely:
//! it is not a candidate for deletion and is not descended into.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::keepers::absolute;

/// Error raised while reading a directory during the walk.
#[derive(Debug, Error)]
#[error("failed to read {path}: {source}")]
pub struct WalkError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Walker yielding files with one extension under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    extension: String,
}

impl DirectoryWalker {
    /// Create a walker for files ending in `extension` below `root`.
    ///
    /// The root is made absolute so yielded paths compare equal to the
    /// absolute paths recorded by live patches.
    #[must_use]
    pub fn new(root: &Path, extension: &str) -> Self {
        Self {
            root: absolute(root),
            extension: extension.to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(&self, name: &std::ffi::OsStr) -> bool {
        name.to_str()
            .is_some_and(|n| n.ends_with(self.extension.as_str()))
    }

    /// Walk the tree, yielding matching regular files.
    ///
    /// Unreadable directories are yielded as [`WalkError`] values and the
    /// walk continues with the rest of the tree.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, WalkError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !(entry.file_type().is_dir() && self.matches(entry.file_name()))
            })
            .filter_map(move |result| match result {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.matches(entry.file_name()) {
                        log::trace!("Candidate: {}", entry.path().display());
                        Some(Ok(entry.into_path()))
                    } else {
                        None
                    }
                }
                Err(source) => {
                    let path = source
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Failed to read {}: {}", path.display(), source);
                    Some(Err(WalkError { path, source }))
                }
            })
    }
}
