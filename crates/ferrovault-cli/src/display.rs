//! Console output for FerroVault results

use console::style;
use ferrovault_engine::{BackupResult, BackupStatus, RestoreResult};
use ferrovault_sync::{ConflictResolution, SyncResult};
use std::time::Duration;

/// Print a backup summary
pub fn print_backup_result(result: &BackupResult) {
    println!();
    println!("{}", style("Backup Statistics:").bold().underlined());
    println!("  Status: {}", status_style(result.status));
    println!("  Files: {}", style(result.total_files).cyan());
    println!("  Objects written: {}", style(result.objects_written).green());
    println!(
        "  Deduplicated: {}",
        style(result.objects_deduplicated).green()
    );
    println!(
        "  Failed: {}",
        if result.files_failed > 0 {
            style(result.files_failed).red()
        } else {
            style(result.files_failed).green()
        }
    );
    println!("  Read: {}", style(format_bytes(result.bytes_read)).green());
    println!(
        "  Stored: {}",
        style(format_bytes(result.bytes_stored)).green()
    );
    println!(
        "  Duration: {}",
        style(format_duration(result.duration)).blue()
    );
    println!(
        "  Throughput: {}",
        style(format!("{:.2} MB/s", result.throughput() / 1024.0 / 1024.0)).blue()
    );

    for failure in &result.failures {
        display_warning(&format!("{}: {}", failure.path.display(), failure.error));
    }
}

/// Print a sync summary
pub fn print_sync_result(result: &SyncResult) {
    println!();
    let title = if result.dry_run {
        "Sync Statistics (dry run):"
    } else {
        "Sync Statistics:"
    };
    println!("{}", style(title).bold().underlined());
    println!("  Files synced: {}", style(result.files_synced).green());
    println!("  Conflicts: {}", style(result.conflicts_count).yellow());
    println!("  Copied back: {}", style(result.copied_back).green());
    println!(
        "  Transferred: {}",
        style(format_bytes(result.bytes_transferred)).green()
    );
    println!(
        "  Errors: {}",
        if result.errors_count > 0 {
            style(result.errors_count).red()
        } else {
            style(result.errors_count).green()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(result.duration)).blue()
    );

    for conflict in &result.conflicts {
        let marker = match conflict.resolution {
            ConflictResolution::KeepTarget => style("=").dim(),
            ConflictResolution::KeepBoth => style("+").yellow(),
            ConflictResolution::UseSource | ConflictResolution::UseTarget => style("→").green(),
        };
        println!("    {} {}", marker, conflict.description());
    }
    for (path, error) in &result.errors {
        display_error(&format!("{}: {}", path.display(), error));
    }
}

/// Print a restore summary
pub fn print_restore_result(result: &RestoreResult) {
    println!();
    println!("{}", style("Restore Statistics:").bold().underlined());
    println!("  Files restored: {}", style(result.files_restored).green());
    println!(
        "  Bytes restored: {}",
        style(format_bytes(result.bytes_restored)).green()
    );
    println!(
        "  Failed: {}",
        if result.failures.is_empty() {
            style(result.failures.len()).green()
        } else {
            style(result.failures.len()).red()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(result.duration)).blue()
    );
    for (path, error) in &result.failures {
        display_error(&format!("{}: {}", path.display(), error));
    }
}

fn status_style(status: BackupStatus) -> console::StyledObject<String> {
    let text = status.to_string();
    match status {
        BackupStatus::Success => style(text).green().bold(),
        BackupStatus::PartialFailure | BackupStatus::Cancelled => style(text).yellow().bold(),
        BackupStatus::Failure => style(text).red().bold(),
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    println!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
