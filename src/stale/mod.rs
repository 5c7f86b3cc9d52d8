//! Reconciliation of derived files on disk against a live project.
//!
//! Patches cache derived data (coordinate transforms, alpha masks) as files
//! in per-project folders. When patches are removed or regenerated, files
//! nobody references any more accumulate; this module removes them.
//!
//! # Architecture
//!
//! * [`kind`]: the [`FileKind`] strategy for each kind of derived file.
//! * [`keepers`]: collects the referenced paths before anything is removed.
//! * [`walker`]: recursive discovery of candidate files.
//! * [`remove`]: root-scoped removal of a single file.
//! * [`pool`]: bounded worker pool running removals concurrently.
//! * [`reconcile`]: the sweep tying these together.

pub mod keepers;
pub mod kind;
pub mod pool;
pub mod reconcile;
pub mod remove;
pub mod walker;

pub use keepers::collect_keepers;
pub use kind::{AlphaMaskPath, CoordinateTransformPath, FileKind, KindSelector};
pub use pool::{worker_count, DeletionPool, DrainOutcome, MIN_WORKERS};
pub use reconcile::{
    delete_alpha_masks, delete_coordinate_transforms, delete_stale, Reconciler, SweepError,
    SweepOptions, SweepReport, DEFAULT_DRAIN_TIMEOUT,
};
pub use remove::{remove_stale_file, FileRemover, PermanentRemover, RemoveError};
pub use walker::{DirectoryWalker, WalkError};
