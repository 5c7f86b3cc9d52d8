//! Kinds of derived files the reconciler knows how to sweep.

use std::path::Path;

use crate::project::{CacheFolders, PatchRefs};

/// Strategy describing one kind of derived file.
///
/// A kind says which file a patch references, which extension the files
/// carry on disk, and which loader folder they are written to.
pub trait FileKind: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// File extension including the leading dot.
    fn extension(&self) -> &'static str;

    /// The file of this kind referenced by `patch`, if any.
    fn referenced_path<'a>(&self, patch: &'a dyn PatchRefs) -> Option<&'a Path>;

    /// The folder files of this kind are stored in, if the loader has one.
    fn folder<'a>(&self, loader: &'a dyn CacheFolders) -> Option<&'a Path>;
}

/// Cached coordinate transforms (`.ct`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateTransformPath;

impl FileKind for CoordinateTransformPath {
    fn name(&self) -> &'static str {
        "coordinate-transform"
    }

    fn extension(&self) -> &'static str {
        ".ct"
    }

    fn referenced_path<'a>(&self, patch: &'a dyn PatchRefs) -> Option<&'a Path> {
        patch.coordinate_transform_path()
    }

    fn folder<'a>(&self, loader: &'a dyn CacheFolders) -> Option<&'a Path> {
        loader.coordinate_transforms_folder()
    }
}

/// Zipped alpha masks (`.zip`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaMaskPath;

impl FileKind for AlphaMaskPath {
    fn name(&self) -> &'static str {
        "alpha-mask"
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn referenced_path<'a>(&self, patch: &'a dyn PatchRefs) -> Option<&'a Path> {
        patch.alpha_mask_path()
    }

    fn folder<'a>(&self, loader: &'a dyn CacheFolders) -> Option<&'a Path> {
        loader.masks_folder()
    }
}

/// Selector for the built-in kinds, used by configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSelector {
    CoordinateTransforms,
    AlphaMasks,
}

impl KindSelector {
    /// The strategy for this kind.
    #[must_use]
    pub fn kind(self) -> &'static dyn FileKind {
        match self {
            Self::CoordinateTransforms => &CoordinateTransformPath,
            Self::AlphaMasks => &AlphaMaskPath,
        }
    }
}
