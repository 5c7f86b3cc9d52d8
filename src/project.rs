//! Read-only view of a project's live object graph.
//!
//! The reconciler only needs three things from a project: its layers, the
//! patches in each layer with the derived files they reference, and the
//! directories those derived files are written to. Those are modelled as
//! traits so any project representation can be swept.
//!
//! [`ProjectManifest`] is a plain serde implementation of the traits, used
//! by the command line tool and by tests.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accessors for the derived files a patch references.
pub trait PatchRefs {
    /// Id of the patch, also used as its image cache id.
    fn id(&self) -> i64;

    /// Cached coordinate transform file, if the patch has one.
    fn coordinate_transform_path(&self) -> Option<&Path>;

    /// Cached alpha mask file, if the patch has one.
    fn alpha_mask_path(&self) -> Option<&Path>;
}

/// A layer of the project.
pub trait LiveLayer {
    fn patches(&self) -> Box<dyn Iterator<Item = &dyn PatchRefs> + '_>;
}

/// Directories holding each kind of derived file.
pub trait CacheFolders {
    fn coordinate_transforms_folder(&self) -> Option<&Path>;
    fn masks_folder(&self) -> Option<&Path>;
}

/// A project whose live patches can be enumerated.
pub trait LiveProject {
    fn layers(&self) -> Box<dyn Iterator<Item = &dyn LiveLayer> + '_>;

    /// Loader that knows where derived files are stored.
    fn loader(&self) -> &dyn CacheFolders;
}

/// Error type for manifest loading.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A patch as listed in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_transform_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_mask_path: Option<PathBuf>,
}

impl PatchRecord {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_coordinate_transform(mut self, path: impl Into<PathBuf>) -> Self {
        self.coordinate_transform_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_alpha_mask(mut self, path: impl Into<PathBuf>) -> Self {
        self.alpha_mask_path = Some(path.into());
        self
    }
}

impl PatchRefs for PatchRecord {
    fn id(&self) -> i64 {
        self.id
    }

    fn coordinate_transform_path(&self) -> Option<&Path> {
        self.coordinate_transform_path.as_deref()
    }

    fn alpha_mask_path(&self) -> Option<&Path> {
        self.alpha_mask_path.as_deref()
    }
}

/// A layer as listed in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: i64,
    #[serde(default)]
    pub patches: Vec<PatchRecord>,
}

impl LiveLayer for LayerRecord {
    fn patches(&self) -> Box<dyn Iterator<Item = &dyn PatchRefs> + '_> {
        Box::new(self.patches.iter().map(|p| p as &dyn PatchRefs))
    }
}

/// Where a project keeps its derived files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_transforms: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masks: Option<PathBuf>,
}

impl CacheFolders for FolderRecord {
    fn coordinate_transforms_folder(&self) -> Option<&Path> {
        self.coordinate_transforms.as_deref()
    }

    fn masks_folder(&self) -> Option<&Path> {
        self.masks.as_deref()
    }
}

/// Serializable snapshot of a project's live references.
///
/// ```json
/// {
///   "folders": { "coordinate_transforms": "/data/proj/trakem2.ct" },
///   "layers": [
///     { "id": 1, "patches": [ { "id": 10, "coordinate_transform_path": "/data/proj/trakem2.ct/10.ct" } ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(default)]
    pub folders: FolderRecord,
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
}

impl ProjectManifest {
    /// Read a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the file can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Self =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!(
            "Loaded manifest {} with {} layers",
            path.display(),
            manifest.layers.len()
        );
        Ok(manifest)
    }

    /// Number of patches over all layers.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.layers.iter().map(|l| l.patches.len()).sum()
    }
}

impl LiveProject for ProjectManifest {
    fn layers(&self) -> Box<dyn Iterator<Item = &dyn LiveLayer> + '_> {
        Box::new(self.layers.iter().map(|l| l as &dyn LiveLayer))
    }

    fn loader(&self) -> &dyn CacheFolders {
        &self.folders
    }
}
