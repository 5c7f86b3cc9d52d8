//! Mark-and-sweep of derived files no live patch references.
//!
//! # Overview
//!
//! A sweep runs in three steps:
//!
//! 1. **Mark**: collect the absolute paths of every file of the kind that a
//!    live patch references (the keepers). The set is complete before
//!    anything is deleted.
//! 2. **Walk**: enumerate files with the kind's extension under the cache
//!    root. Files not in the keeper set are stale.
//! 3. **Sweep**: stale files are removed on a fixed-size worker pool while
//!    the walk continues; the pool is drained once the walk ends.
//!
//! A failed removal never stops the others. The sweep succeeds when no
//! removal failed; the failures are left for a later pass.
//!
//! With a shutdown flag attached ([`Reconciler::with_shutdown_flag`]) the
//! walk stops submitting and the drain stops waiting once the flag is set.
//! The report is then marked `interrupted`.
//!
//! # Example
//!
//! ```no_run
//! use mipcache::project::ProjectManifest;
//! use mipcache::stale::{delete_coordinate_transforms, delete_alpha_masks};
//! use std::path::Path;
//!
//! let project = ProjectManifest::load(Path::new("project.json")).unwrap();
//! let ok = delete_coordinate_transforms(&project) & delete_alpha_masks(&project);
//! println!("sweep {}", if ok { "succeeded" } else { "left files behind" });
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::SweepConfig;
use crate::project::LiveProject;

use super::keepers::{absolute, collect_keepers};
use super::kind::{AlphaMaskPath, CoordinateTransformPath, FileKind};
use super::pool::{worker_count, DeletionPool};
use super::remove::{FileRemover, PermanentRemover};
use super::walker::DirectoryWalker;

/// How long a sweep waits for its removals by default: one day.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Error that prevents a sweep from running at all.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to start removal workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Tuning for a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
    /// Removal workers; defaults to the available parallelism.
    pub workers: Option<usize>,
    /// Upper bound on the wait for submitted removals.
    pub drain_timeout: Duration,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            workers: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl SweepOptions {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

impl From<&SweepConfig> for SweepOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            workers: config.workers,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        }
    }
}

/// What a sweep found and did.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Kind of derived file swept.
    pub kind: &'static str,
    /// Absolute cache root, or `None` when the project has none.
    pub root: Option<PathBuf>,
    /// Files referenced by live patches.
    pub keepers: usize,
    /// Matching files left in place because they are referenced.
    pub kept: usize,
    /// Stale files submitted for removal.
    pub scheduled: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Directories that could not be read.
    pub walk_errors: usize,
    pub bytes_freed: u64,
    /// Whether every removal finished before the drain timeout.
    pub drained: bool,
    /// Whether shutdown was requested before the sweep completed.
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    fn empty(kind: &dyn FileKind, root: Option<PathBuf>, started_at: DateTime<Utc>) -> Self {
        Self {
            kind: kind.name(),
            root,
            keepers: 0,
            kept: 0,
            scheduled: 0,
            deleted: 0,
            failed: 0,
            walk_errors: 0,
            bytes_freed: 0,
            drained: true,
            interrupted: false,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Whether no removal failed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable summary of the sweep.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: deleted {} stale file(s), kept {}, freed {}",
            self.kind,
            self.deleted,
            self.kept,
            ByteSize(self.bytes_freed)
        );
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        if self.walk_errors > 0 {
            line.push_str(&format!(", {} unreadable dir(s)", self.walk_errors));
        }
        if self.interrupted {
            line.push_str(", interrupted");
        }
        if !self.drained {
            line.push_str(", some removals still pending");
        }
        line
    }
}

/// Sweeps stale derived files of one kind at a time.
pub struct Reconciler {
    options: SweepOptions,
    remover: Arc<dyn FileRemover>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.options)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(SweepOptions::default())
    }
}

impl Reconciler {
    /// Reconciler that permanently removes stale files.
    #[must_use]
    pub fn new(options: SweepOptions) -> Self {
        Self {
            options,
            remover: Arc::new(PermanentRemover),
            shutdown: None,
        }
    }

    /// Replace the strategy used to remove individual files.
    #[must_use]
    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Stop the sweep early once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Sweep the folder the project's loader assigns to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError`] if the removal workers can't be started.
    pub fn sweep_kind(
        &self,
        project: &dyn LiveProject,
        kind: &dyn FileKind,
    ) -> Result<SweepReport, SweepError> {
        self.sweep(project, kind.folder(project.loader()), kind)
    }

    /// Remove every file of `kind` under `root` that no live patch of
    /// `project` references.
    ///
    /// A missing `root` means there is nothing to reconcile.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError`] if the removal workers can't be started.
    pub fn sweep(
        &self,
        project: &dyn LiveProject,
        root: Option<&Path>,
        kind: &dyn FileKind,
    ) -> Result<SweepReport, SweepError> {
        let started_at = Utc::now();

        let Some(root) = root else {
            log::debug!("No {} folder, nothing to reconcile", kind.name());
            return Ok(SweepReport::empty(kind, None, started_at));
        };
        let root = absolute(root);
        if !root.is_dir() {
            log::info!(
                "{} folder {} does not exist, nothing to reconcile",
                kind.name(),
                root.display()
            );
            return Ok(SweepReport::empty(kind, Some(root), started_at));
        }

        let keepers = collect_keepers(project, kind);

        let workers = worker_count(self.options.workers);
        let mut pool = DeletionPool::new(workers, root.clone(), Arc::clone(&self.remover))?;
        if let Some(flag) = &self.shutdown {
            pool = pool.with_shutdown_flag(Arc::clone(flag));
        }
        log::info!(
            "Sweeping stale {} files under {} with {} workers",
            kind.name(),
            root.display(),
            workers
        );

        let walker = DirectoryWalker::new(&root, kind.extension());
        let mut kept = 0;
        let mut walk_errors = 0;
        let mut walk_interrupted = false;
        for result in walker.walk() {
            if self.shutdown_requested() {
                log::warn!("Interrupted, no further {} files will be scheduled", kind.name());
                walk_interrupted = true;
                break;
            }
            match result {
                Ok(path) if keepers.contains(&path) => kept += 1,
                Ok(path) => pool.submit(path),
                Err(_) => walk_errors += 1,
            }
        }
        let scheduled = pool.submitted();
        log::debug!(
            "Walk done: {} stale, {} kept, {} unreadable",
            scheduled,
            kept,
            walk_errors
        );

        let outcome = pool.finish(self.options.drain_timeout);

        let report = SweepReport {
            kind: kind.name(),
            root: Some(root),
            keepers: keepers.len(),
            kept,
            scheduled,
            deleted: outcome.deleted,
            failed: outcome.failed,
            walk_errors,
            bytes_freed: outcome.bytes_freed,
            drained: outcome.drained,
            interrupted: walk_interrupted || outcome.interrupted,
            started_at,
            finished_at: Utc::now(),
        };

        if report.failed > 0 {
            log::error!(
                "Failed to delete {} {} files. See the log for details.",
                report.failed,
                kind.name()
            );
        }
        log::info!("{}", report.summary());
        Ok(report)
    }
}

/// Remove stale files of `kind` under `root` with default options.
///
/// Returns `true` when nothing failed, including when `root` is `None`.
pub fn delete_stale(project: &dyn LiveProject, root: Option<&Path>, kind: &dyn FileKind) -> bool {
    match Reconciler::default().sweep(project, root, kind) {
        Ok(report) => report.succeeded(),
        Err(e) => {
            log::error!("Stale {} sweep did not run: {}", kind.name(), e);
            false
        }
    }
}

/// Remove coordinate transform files no patch references any more.
pub fn delete_coordinate_transforms(project: &dyn LiveProject) -> bool {
    let kind = CoordinateTransformPath;
    delete_stale(project, kind.folder(project.loader()), &kind)
}

/// Remove alpha mask files no patch references any more.
pub fn delete_alpha_masks(project: &dyn LiveProject) -> bool {
    let kind = AlphaMaskPath;
    delete_stale(project, kind.folder(project.loader()), &kind)
}
