//! Progress reporting and cancellation.
//!
//! The pipeline is synchronous and knows nothing about threads. Callers that
//! drive it from a worker pass a [`PatchSink`] that forwards events to
//! wherever they are displayed, and keep a clone of the
//! [`CancellationToken`] to stop the run between two items.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Receiver of user-facing log lines and progress updates
pub trait PatchSink {
    /// One log line
    fn on_log(&self, message: &str);

    /// Injection progress in `0.0..=1.0`
    fn on_progress(&self, fraction: f64);
}

/// Sink that writes everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl PatchSink for TracingSink {
    fn on_log(&self, message: &str) {
        info!("{}", message);
    }

    fn on_progress(&self, fraction: f64) {
        debug!("Progress: {:.1}%", fraction * 100.0);
    }
}

/// Cooperative cancellation flag shared between a run and its caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
