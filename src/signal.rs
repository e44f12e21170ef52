//! Signal handling for graceful shutdown.
//!
//! A Ctrl+C (or SIGTERM, via the `termination` feature of `ctrlc`) sets a
//! shared atomic flag that the walk, hash and resolve loops poll between
//! units of work, then flushes and closes the metadata journal before the
//! process exits with code 130. A journal flush only guarantees metadata
//! durability: an in-flight move/link sequence is not atomic across a hard
//! kill, and the resolver's "already consolidated / already a link" checks
//! absorb whatever state the crash left behind on the next run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::MetaJournal;
use crate::error::ExitCode;

/// Error installing the signal handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// Shared shutdown flag for worker threads.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with the flag initially unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone the flag for passing into worker components.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Install the process signal handler.
///
/// On interrupt the handler sets the shared flag, flushes and closes the
/// journal, and exits with code 130.
///
/// # Errors
///
/// Returns [`SignalError`] if a handler is already installed or the
/// platform refuses one.
pub fn install_handler(journal: Arc<MetaJournal>) -> Result<ShutdownHandler, SignalError> {
    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    ctrlc::set_handler(move || {
        log::info!("Interrupt detected! Shutting down gracefully.");
        flag.store(true, Ordering::SeqCst);
        journal.close();
        std::process::exit(ExitCode::Interrupted.as_i32());
    })?;

    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_unset() {
        let handler = ShutdownHandler::new();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_request_shutdown_sets_flag() {
        let handler = ShutdownHandler::new();
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());
        assert!(handler.get_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_flag_is_shared_between_clones() {
        let handler = ShutdownHandler::new();
        let clone = handler.clone();
        clone.request_shutdown();
        assert!(handler.is_shutdown_requested());
    }
}
