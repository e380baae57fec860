use crate::error::{PbapDumpError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative Ctrl+C handling. The extraction loop polls
/// `check_shutdown` between phases so a half-finished OBEX session
/// is not left dangling.
pub struct GracefulShutdown {
    shutdown_requested: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown_requested);

        ctrlc::set_handler(move || {
            if flag.load(Ordering::SeqCst) {
                // Second Ctrl+C: stop waiting for the session to unwind.
                eprintln!("\nForced shutdown");
                std::process::exit(130);
            }
            eprintln!("\nShutdown requested, finishing current step...");
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PbapDumpError::Config {
            message: format!("Failed to install signal handler: {}", e),
        })?;

        Ok(Self { shutdown_requested })
    }

    /// Handler-free variant for unit tests.
    pub fn new_for_test() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if self.is_shutdown_requested() {
            Err(PbapDumpError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clear() {
        let shutdown = GracefulShutdown::new_for_test();
        assert!(!shutdown.is_shutdown_requested());
        assert!(shutdown.check_shutdown().is_ok());
    }

    #[test]
    fn test_request_flips_state() {
        let shutdown = GracefulShutdown::new_for_test();
        shutdown.request_shutdown();
        assert!(shutdown.is_shutdown_requested());
        assert!(matches!(
            shutdown.check_shutdown(),
            Err(PbapDumpError::Cancelled)
        ));
    }
}
