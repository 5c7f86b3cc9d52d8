//! Fixed-size pool running stale file removals.
//!
//! Submission never blocks: each removal is spawned onto a dedicated rayon
//! pool. Once the walk is over the coordinator calls
//! [`DeletionPool::finish`], which stops accepting work and waits, up to a
//! timeout, for every submitted removal to complete.
//!
//! Workers share nothing but atomic counters, read once by the
//! coordinator after the drain. A removal that panics is counted as a
//! failure.
//!
//! The drain also watches an optional shutdown flag and gives up early
//! once it is set.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::remove::FileRemover;

/// Minimum number of removal workers.
pub const MIN_WORKERS: usize = 2;

/// How often the drain checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Worker count for a pool: the requested size, or the available
/// parallelism, never fewer than [`MIN_WORKERS`].
#[must_use]
pub fn worker_count(requested: Option<usize>) -> usize {
    let wanted = requested.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(MIN_WORKERS)
    });
    wanted.max(MIN_WORKERS)
}

#[derive(Debug, Default)]
struct Counters {
    deleted: AtomicUsize,
    failed: AtomicUsize,
    bytes_freed: AtomicU64,
}

/// Result of draining a [`DeletionPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Removals submitted.
    pub submitted: usize,
    /// Removals that finished before the drain ended.
    pub completed: usize,
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
    /// Whether every submitted removal finished before the timeout.
    pub drained: bool,
    /// Whether the drain stopped because shutdown was requested.
    pub interrupted: bool,
}

/// Pool of workers removing stale files under one cache root.
pub struct DeletionPool {
    pool: rayon::ThreadPool,
    root: PathBuf,
    remover: Arc<dyn FileRemover>,
    counters: Arc<Counters>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
    shutdown: Option<Arc<AtomicBool>>,
    submitted: usize,
}

impl std::fmt::Debug for DeletionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionPool")
            .field("workers", &self.pool.current_num_threads())
            .field("root", &self.root)
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

impl DeletionPool {
    /// Build a pool of `workers` threads removing files under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker threads can't be spawned.
    pub fn new(
        workers: usize,
        root: PathBuf,
        remover: Arc<dyn FileRemover>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("stale-file-remover-{}", i))
            .build()?;
        let (done_tx, done_rx) = mpsc::channel();
        Ok(Self {
            pool,
            root,
            remover,
            counters: Arc::new(Counters::default()),
            done_tx,
            done_rx,
            shutdown: None,
            submitted: 0,
        })
    }

    /// Stop draining early once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Queue the removal of `path` and return immediately.
    pub fn submit(&mut self, path: PathBuf) {
        let root = self.root.clone();
        let remover = Arc::clone(&self.remover);
        let counters = Arc::clone(&self.counters);
        let done = self.done_tx.clone();
        self.submitted += 1;

        self.pool.spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(|| remover.remove(&root, &path))) {
                Ok(Ok(bytes)) => {
                    counters.deleted.fetch_add(1, Ordering::Relaxed);
                    counters.bytes_freed.fetch_add(bytes, Ordering::Relaxed);
                }
                Ok(Err(e)) => {
                    log::warn!("Failed to delete {}: {}", path.display(), e);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    log::error!("Removal of {} panicked", path.display());
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            let _ = done.send(());
        });
    }

    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Stop accepting removals and wait for the submitted ones to finish.
    ///
    /// Waits at most `timeout`, and stops early if the shutdown flag is
    /// set. Removals still running after that keep running in the
    /// background; the outcome reports what had finished.
    pub fn finish(self, timeout: Duration) -> DrainOutcome {
        let Self {
            pool,
            counters,
            done_tx,
            done_rx,
            shutdown,
            submitted,
            ..
        } = self;
        drop(done_tx);
        let shutdown_requested = || {
            shutdown
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
        };

        let deadline = Instant::now() + timeout;
        let mut completed = 0;
        let mut interrupted = false;
        while completed < submitted {
            // Count whatever already finished before checking the flag
            while let Ok(()) = done_rx.try_recv() {
                completed += 1;
            }
            if completed == submitted {
                break;
            }
            if shutdown_requested() {
                log::warn!(
                    "Interrupted with {} of {} removals pending",
                    submitted - completed,
                    submitted
                );
                interrupted = true;
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!(
                    "Timed out after {:?} waiting for {} of {} removals",
                    timeout,
                    submitted - completed,
                    submitted
                );
                break;
            }
            match done_rx.recv_timeout(remaining.min(SHUTDOWN_POLL)) {
                Ok(()) => completed += 1,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!(
                        "{} of {} removals ended without reporting",
                        submitted - completed,
                        submitted
                    );
                    break;
                }
            }
        }
        // Dropping the pool lets its threads exit once queued work is done
        drop(pool);

        DrainOutcome {
            submitted,
            completed,
            deleted: counters.deleted.load(Ordering::Acquire),
            failed: counters.failed.load(Ordering::Acquire),
            bytes_freed: counters.bytes_freed.load(Ordering::Acquire),
            drained: completed == submitted,
            interrupted,
        }
    }
}
