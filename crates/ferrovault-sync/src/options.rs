//! Options for a synchronization run

use ferrovault_config::SyncSettings;
use ferrovault_types::ConflictPolicy;
use serde::{Deserialize, Serialize};

/// Synchronization options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// How paths with differing content are resolved
    pub conflict_policy: ConflictPolicy,
    /// Copy target-only files back to the source and let a newer target
    /// overwrite the source under `KeepNewest`
    pub bidirectional: bool,
    /// Allow `KeepNewest` to overwrite the older side; otherwise conflicts
    /// are only reported
    pub overwrite_newer: bool,
    /// Give copies the modification time of the file they were copied from
    pub preserve_timestamps: bool,
    /// Report what would change without touching either tree
    pub dry_run: bool,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
}

impl SyncOptions {
    /// One-way sync where the newer side wins
    pub fn keep_newest() -> Self {
        Self::default()
    }

    /// One-way sync that never overwrites, writing conflict copies instead
    pub fn keep_both() -> Self {
        Self {
            conflict_policy: ConflictPolicy::KeepBoth,
            ..Self::default()
        }
    }

    /// Two-way sync where the newer side wins
    pub fn bidirectional() -> Self {
        Self {
            bidirectional: true,
            ..Self::default()
        }
    }

    /// Options from loaded settings
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            conflict_policy: settings.conflict_policy,
            bidirectional: settings.bidirectional,
            overwrite_newer: settings.overwrite_newer,
            preserve_timestamps: settings.preserve_timestamps,
            dry_run: settings.dry_run,
            follow_symlinks: false,
        }
    }

    /// Set dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::KeepNewest,
            bidirectional: false,
            overwrite_newer: true,
            preserve_timestamps: true,
            dry_run: false,
            follow_symlinks: false,
        }
    }
}
