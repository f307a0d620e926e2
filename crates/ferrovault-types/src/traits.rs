//! Core traits for FerroVault operations
//!
//! Observers and cancellation hooks shared by the backup pipeline, the sync
//! engine and the command line front end.

use crate::{Error, ProgressUpdate};
use std::path::Path;

/// Shared token observed by workers between files
pub use tokio_util::sync::CancellationToken;

/// Observer notified as a backup run advances
///
/// Purely observational: implementations must not fail the run.
pub trait ProgressListener: Send + Sync {
    /// Called after every processed file
    fn on_progress(&self, update: &ProgressUpdate);

    /// Called when a single file could not be backed up
    fn on_file_failed(&self, _path: &Path, _error: &Error) {}

    /// Called once when the run has finished
    fn on_complete(&self, _update: &ProgressUpdate) {}
}

/// Listener that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ProgressListener for NoopListener {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Trait for operation cancellation
pub trait Cancellable {
    /// Cancel the operation
    fn cancel(&self);

    /// Check if the operation is cancelled
    fn is_cancelled(&self) -> bool;
}

impl Cancellable for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}
