//! mipcache - multi-level image tile cache and stale derived file cleanup.
//!
//! Two independent pieces:
//!
//! * [`cache`]: an LRU cache of decoded images keyed by owner id and mipmap
//!   level, evicted by count or by bytes, with a mutex-guarded budgeted
//!   [`TileStore`](cache::TileStore) on top.
//! * [`stale`]: a reconciler that deletes derived files (coordinate
//!   transforms, alpha masks) no live patch of a [`project`] references.
//!
//! The remaining modules back the `mipcache` command line tool.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod project;
pub mod signal;
pub mod stale;

pub use app::run_app;
