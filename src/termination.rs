//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Cheap cloneable handle that lets a caller stop a running computation.
///
/// Phases check the flag at partition and pass boundaries; once stopped,
/// the run aborts promptly with [`Error::Cancelled`] and no partial
/// result is returned.
#[derive(Debug, Clone)]
pub struct TerminationFlag {
    running: Arc<AtomicBool>,
}

impl TerminationFlag {
    /// Create a flag in the running state.
    pub fn running() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True while the computation may keep going.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Error out if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::running()
    }
}
