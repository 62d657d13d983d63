//! Cooperative session control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Abort and skip signals for a running session.
///
/// Clones share the same flags, so one clone can live in a UI thread
/// while the session loop polls another at each frame boundary.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    abort: Arc<AtomicBool>,
    skip: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session to stop after the current frame.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Request the current calibration point to end early.
    pub fn skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    /// Consume a pending skip request.
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    /// Clear both flags.
    pub fn reset(&self) {
        self.abort.store(false, Ordering::SeqCst);
        self.skip.store(false, Ordering::SeqCst);
    }
}
