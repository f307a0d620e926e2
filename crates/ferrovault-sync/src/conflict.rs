//! Conflict resolution for two-tree synchronization

use ferrovault_types::{ConflictPolicy, ContentFingerprint};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Marker inserted into the file name of a kept-both copy
pub const CONFLICT_MARKER: &str = ".conflict-";

/// What was done about a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// The source copy overwrote the target
    UseSource,
    /// The target copy overwrote the source
    UseTarget,
    /// Both sides were left as they were
    KeepTarget,
    /// The source copy was written beside the target under a conflict name
    KeepBoth,
}

impl ConflictResolution {
    /// Decide how to resolve a path whose content differs on both sides
    ///
    /// Equal modification times keep the target unchanged.
    pub fn decide(
        policy: ConflictPolicy,
        overwrite_newer: bool,
        bidirectional: bool,
        source_modified: SystemTime,
        target_modified: SystemTime,
    ) -> Self {
        match policy {
            ConflictPolicy::KeepBoth => Self::KeepBoth,
            ConflictPolicy::KeepNewest if !overwrite_newer => Self::KeepTarget,
            ConflictPolicy::KeepNewest => {
                if source_modified > target_modified {
                    Self::UseSource
                } else if target_modified > source_modified && bidirectional {
                    Self::UseTarget
                } else {
                    Self::KeepTarget
                }
            }
        }
    }

    /// Whether this resolution writes anything
    pub fn modifies(self) -> bool {
        !matches!(self, Self::KeepTarget)
    }
}

/// A path whose content differed between the two trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Path relative to both roots
    pub path: PathBuf,
    /// Fingerprint of the source copy
    pub source_fingerprint: ContentFingerprint,
    /// Fingerprint of the target copy
    pub target_fingerprint: ContentFingerprint,
    /// Modification time of the source copy
    pub source_modified: SystemTime,
    /// Modification time of the target copy
    pub target_modified: SystemTime,
    /// What was done
    pub resolution: ConflictResolution,
    /// Where the source copy was written for [`ConflictResolution::KeepBoth`]
    pub conflict_copy: Option<PathBuf>,
}

impl SyncConflict {
    /// Human readable description
    pub fn description(&self) -> String {
        match self.resolution {
            ConflictResolution::UseSource => {
                format!("'{}': source was newer and replaced the target", self.path.display())
            }
            ConflictResolution::UseTarget => {
                format!("'{}': target was newer and replaced the source", self.path.display())
            }
            ConflictResolution::KeepTarget => {
                format!("'{}': content differs, target kept", self.path.display())
            }
            ConflictResolution::KeepBoth => match &self.conflict_copy {
                Some(copy) => format!(
                    "'{}': source copy kept as '{}'",
                    self.path.display(),
                    copy.display()
                ),
                None => format!("'{}': source copy kept beside the target", self.path.display()),
            },
        }
    }
}

/// `<name>.conflict-<millis>`, with `-<n>` appended for `attempt > 0`
pub fn conflict_name(target: &Path, millis: i64, attempt: u32) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if attempt == 0 {
        format!("{}{}{}", name, CONFLICT_MARKER, millis)
    } else {
        format!("{}{}{}-{}", name, CONFLICT_MARKER, millis, attempt)
    };
    target.with_file_name(file_name)
}

/// Whether `path` names a kept-both copy
pub fn is_conflict_copy(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(index) = name.rfind(CONFLICT_MARKER) else {
        return false;
    };
    let suffix = &name[index + CONFLICT_MARKER.len()..];
    let mut parts = suffix.splitn(2, '-');
    let millis_ok = parts
        .next()
        .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    let counter_ok = parts
        .next()
        .map_or(true, |p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    millis_ok && counter_ok
}
