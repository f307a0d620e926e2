//! Per-run counters and progress snapshots

use ferrovault_types::{Error, ProgressListener, ProgressUpdate};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Counters shared by the workers of one backup run
#[derive(Debug, Default)]
pub struct RunCounters {
    total_files: AtomicU64,
    files_processed: AtomicU64,
    bytes_processed: AtomicU64,
    objects_written: AtomicU64,
    objects_deduplicated: AtomicU64,
    files_failed: AtomicU64,
    bytes_stored: AtomicU64,
}

/// Plain copy of [`RunCounters`] at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Files discovered
    pub total_files: u64,
    /// Files finished, whatever the outcome
    pub files_processed: u64,
    /// Source bytes read
    pub bytes_processed: u64,
    /// Objects written to storage
    pub objects_written: u64,
    /// Files whose content was already stored
    pub objects_deduplicated: u64,
    /// Files that failed
    pub files_failed: u64,
    /// Payload bytes written to storage
    pub bytes_stored: u64,
}

impl RunCounters {
    /// Counters for a run over `total_files` files
    pub fn new(total_files: u64) -> Self {
        let counters = Self::default();
        counters.total_files.store(total_files, Ordering::Relaxed);
        counters
    }

    /// Record a file whose payload was written
    pub fn record_written(&self, source_bytes: u64, stored_bytes: u64) {
        self.objects_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(source_bytes, Ordering::Relaxed);
        self.bytes_stored.fetch_add(stored_bytes, Ordering::Relaxed);
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file whose content was already stored
    pub fn record_deduplicated(&self, source_bytes: u64) {
        self.objects_deduplicated.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(source_bytes, Ordering::Relaxed);
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed file
    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            objects_written: self.objects_written.load(Ordering::Relaxed),
            objects_deduplicated: self.objects_deduplicated.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
        }
    }

    /// Progress update naming `current_file`
    pub fn progress(&self, current_file: &Path) -> ProgressUpdate {
        let snapshot = self.snapshot();
        ProgressUpdate {
            bytes_processed: snapshot.bytes_processed,
            files_processed: snapshot.files_processed,
            total_files: snapshot.total_files,
            current_file: current_file.to_path_buf(),
        }
    }
}

/// Listener that forwards progress to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl ProgressListener for TracingListener {
    fn on_progress(&self, update: &ProgressUpdate) {
        debug!(
            "[{}/{}] {} ({} bytes so far)",
            update.files_processed,
            update.total_files,
            update.current_file.display(),
            update.bytes_processed
        );
    }

    fn on_file_failed(&self, path: &Path, error: &Error) {
        warn!("Failed to back up {}: {}", path.display(), error);
    }
}

/// Progress for the end of a run, with no current file
pub fn final_update(counters: &RunCounters) -> ProgressUpdate {
    counters.progress(&PathBuf::new())
}
