//! Collection of the files still referenced by live patches.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::project::LiveProject;

use super::kind::FileKind;

/// Absolute paths of every file of `kind` referenced from `project`.
///
/// The set is built completely before any sweep starts and never changes
/// while the sweep runs.
#[must_use]
pub fn collect_keepers(project: &dyn LiveProject, kind: &dyn FileKind) -> HashSet<PathBuf> {
    let mut keepers = HashSet::new();
    let mut patches = 0usize;
    for layer in project.layers() {
        for patch in layer.patches() {
            patches += 1;
            if let Some(path) = kind.referenced_path(patch) {
                keepers.insert(absolute(path));
            }
        }
    }
    log::debug!(
        "Collected {} {} keepers from {} patches",
        keepers.len(),
        kind.name(),
        patches
    );
    keepers
}

/// Lexically absolute form of `path` with `.` and `..` folded away,
/// without resolving symlinks.
///
/// Keepers, the walk root and therefore every walked path go through this,
/// so the same file always compares equal however it was spelled.
/// Falls back to the path as given if the working directory is unavailable.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match clean.components().next_back() {
                Some(Component::Normal(_)) => {
                    clean.pop();
                }
                // `..` above the filesystem root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => clean.push(component),
            },
            other => clean.push(other),
        }
    }
    clean
}
