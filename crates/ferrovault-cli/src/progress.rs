//! Progress bar for backup runs

use console::style;
use ferrovault_types::{Error, ProgressListener, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Listener drawing an indicatif bar, or nothing in quiet mode
pub struct CliProgress {
    progress_bar: Option<ProgressBar>,
}

impl CliProgress {
    /// Create a new progress listener
    pub fn new(quiet: bool) -> Self {
        let progress_bar = if quiet {
            None
        } else {
            let pb = ProgressBar::new(0);
            let bar_style = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ");
            pb.set_style(bar_style);
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        };

        Self { progress_bar }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(pb) = &self.progress_bar {
            pb.finish_and_clear();
        }
    }
}

impl ProgressListener for CliProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        let Some(pb) = &self.progress_bar else {
            return;
        };
        let filename = update
            .current_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        pb.set_length(update.total_files);
        pb.set_position(update.files_processed);
        pb.set_message(format!("Backing up: {}", filename));
    }

    fn on_file_failed(&self, path: &Path, error: &Error) {
        let line = format!(
            "{} {}",
            style("⚠").yellow().bold(),
            style(format!("{}: {}", path.display(), error)).yellow()
        );
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    fn on_complete(&self, update: &ProgressUpdate) {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(update.files_processed);
            pb.finish_with_message("Backup finished");
        }
    }
}
