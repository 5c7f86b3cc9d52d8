//! Ctrl+C handling.
//!
//! A sweep polls a shared [`AtomicBool`] while it walks and while it waits
//! for pending removals. The Ctrl+C handler sets the flag, the sweep stops
//! submitting work, reports what finished, and the process exits with
//! [`ExitCode::Interrupted`](crate::error::ExitCode::Interrupted).
//!
//! ```rust,no_run
//! use mipcache::signal::install_handler;
//! use mipcache::stale::Reconciler;
//!
//! let handler = install_handler();
//! let reconciler = Reconciler::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared flag set once shutdown has been requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Handle on the flag for the sweep.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or return the installed one.
///
/// If the hook can't be registered the returned handler still works for
/// [`request_shutdown`](ShutdownHandler::request_shutdown); it just never
/// fires on Ctrl+C.
pub fn install_handler() -> ShutdownHandler {
    GLOBAL_HANDLER
        .get_or_init(|| {
            let handler = ShutdownHandler::new();
            let flag = handler.flag();
            let hooked = ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
                let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing pending removals...");
                log::info!("Shutdown signal received");
            });
            if let Err(e) = hooked {
                log::debug!("Ctrl+C handler not installed: {}", e);
            }
            handler
        })
        .clone()
}
