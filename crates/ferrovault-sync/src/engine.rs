//! Main synchronization engine

use crate::conflict::{conflict_name, is_conflict_copy, ConflictResolution, SyncConflict};
use crate::options::SyncOptions;
use chrono::Utc;
use ferrovault_crypto::ContentHasher;
use ferrovault_types::{Error, Result};
use filetime::FileTime;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Synchronization result
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// Source files visited without error, conflicted ones included
    pub files_synced: u64,
    /// Paths whose content differed on both sides
    pub conflicts_count: u64,
    /// Target-only files copied back to the source
    pub copied_back: u64,
    /// Bytes written to either tree
    pub bytes_transferred: u64,
    /// Files that could not be synchronized
    pub errors_count: u64,
    /// Per-file errors
    pub errors: Vec<(PathBuf, String)>,
    /// Every conflict and how it was resolved
    pub conflicts: Vec<SyncConflict>,
    /// Whether the run was a dry run
    pub dry_run: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

impl SyncResult {
    fn record_error(&mut self, path: &Path, error: &Error) {
        warn!("Failed to sync {}: {}", path.display(), error);
        self.errors_count += 1;
        self.errors.push((path.to_path_buf(), error.to_string()));
    }
}

/// Reconciles two directory trees by content
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    hasher: ContentHasher,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sync engine hashing with the given hasher
    pub fn with_hasher(hasher: ContentHasher) -> Self {
        Self { hasher }
    }

    /// Synchronize `target` with `source`
    ///
    /// Fails only when `source` cannot be enumerated or `target` cannot be
    /// created; every per-file problem is recorded in the result.
    pub async fn synchronize(
        &self,
        source: &Path,
        target: &Path,
        options: &SyncOptions,
    ) -> Result<SyncResult> {
        let start = Instant::now();
        info!(
            "Synchronizing {} -> {} ({}{})",
            source.display(),
            target.display(),
            options.conflict_policy,
            if options.bidirectional { ", bidirectional" } else { "" }
        );

        let listing = list_files(source, target, options.follow_symlinks).await?;
        if !options.dry_run {
            fs::create_dir_all(target)
                .await
                .map_err(|e| Error::sync(format!("cannot create '{}': {}", target.display(), e)))?;
        }

        let mut result = SyncResult {
            dry_run: options.dry_run,
            ..SyncResult::default()
        };

        for (relative, error) in &listing.unreadable {
            result.record_error(relative, error);
        }

        for relative in &listing.files {
            let source_path = source.join(relative);
            let target_path = target.join(relative);
            match self
                .sync_file(&source_path, &target_path, relative, options, &mut result)
                .await
            {
                Ok(()) => result.files_synced += 1,
                Err(e) => result.record_error(relative, &e),
            }
        }

        if options.bidirectional && target_exists(target).await {
            self.copy_back(source, target, options, &mut result).await;
        }

        result.duration = start.elapsed();
        info!(
            "Sync finished: {} synced, {} conflicts, {} copied back, {} errors",
            result.files_synced, result.conflicts_count, result.copied_back, result.errors_count
        );
        Ok(result)
    }

    async fn sync_file(
        &self,
        source: &Path,
        target: &Path,
        relative: &Path,
        options: &SyncOptions,
        result: &mut SyncResult,
    ) -> Result<()> {
        let target_meta = match fs::metadata(target).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Copying new file {}", relative.display());
                result.bytes_transferred += copy_file(source, target, options).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if !target_meta.is_file() {
            return Err(Error::sync(format!(
                "'{}' is not a regular file in the target",
                relative.display()
            )));
        }

        let source_fp = self.hasher.fingerprint_file(source).await?;
        let target_fp = self.hasher.fingerprint_file(target).await?;
        if source_fp == target_fp {
            return Ok(());
        }

        let source_modified = fs::metadata(source).await?.modified()?;
        let target_modified = target_meta.modified()?;
        let resolution = ConflictResolution::decide(
            options.conflict_policy,
            options.overwrite_newer,
            options.bidirectional,
            source_modified,
            target_modified,
        );
        result.conflicts_count += 1;

        let mut conflict_copy = None;
        match resolution {
            ConflictResolution::UseSource => {
                result.bytes_transferred += copy_file(source, target, options).await?;
            }
            ConflictResolution::UseTarget => {
                result.bytes_transferred += copy_file(target, source, options).await?;
            }
            ConflictResolution::KeepTarget => {}
            ConflictResolution::KeepBoth => {
                let copy = free_conflict_path(target).await?;
                result.bytes_transferred += copy_file(source, &copy, options).await?;
                conflict_copy = Some(copy);
            }
        }

        let conflict = SyncConflict {
            path: relative.to_path_buf(),
            source_fingerprint: source_fp,
            target_fingerprint: target_fp,
            source_modified,
            target_modified,
            resolution,
            conflict_copy,
        };
        info!("Conflict {}", conflict.description());
        result.conflicts.push(conflict);
        Ok(())
    }

    async fn copy_back(
        &self,
        source: &Path,
        target: &Path,
        options: &SyncOptions,
        result: &mut SyncResult,
    ) {
        // The forward pass has already written into the target, so a walk
        // failure here is recorded rather than returned
        let listing = match list_files(target, source, options.follow_symlinks).await {
            Ok(listing) => listing,
            Err(e) => {
                result.record_error(Path::new(""), &e);
                return;
            }
        };
        for (relative, error) in &listing.unreadable {
            result.record_error(relative, error);
        }

        for relative in listing.files {
            if is_conflict_copy(&relative) {
                continue;
            }
            let source_path = source.join(&relative);
            match fs::symlink_metadata(&source_path).await {
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    result.record_error(&relative, &Error::from(e));
                    continue;
                }
            }

            debug!("Copying {} back to the source", relative.display());
            match copy_file(&target.join(&relative), &source_path, options).await {
                Ok(bytes) => {
                    result.copied_back += 1;
                    result.bytes_transferred += bytes;
                }
                Err(e) => result.record_error(&relative, &e),
            }
        }
    }
}

async fn target_exists(target: &Path) -> bool {
    fs::metadata(target).await.is_ok_and(|m| m.is_dir())
}

/// Regular files found under a root, plus entries the walk could not read
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    unreadable: Vec<(PathBuf, Error)>,
}

/// Relative paths of the regular files under `root`, in walk order
///
/// `other` is the opposite tree; when it lies inside `root` it is skipped.
/// Only a root that cannot be read fails the listing.
async fn list_files(root: &Path, other: &Path, follow_symlinks: bool) -> Result<Listing> {
    let root = root.to_path_buf();
    let other = other.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let metadata =
            std::fs::metadata(&root).map_err(|e| Error::enumeration(&root, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::enumeration(&root, "not a directory"));
        }

        let skip = nested_tree(&root, &other);
        if let Some(skip) = &skip {
            debug!("Skipping {} nested inside {}", skip.display(), root.display());
        }

        let mut listing = Listing::default();
        let walker = WalkDir::new(&root)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| skip.as_deref() != Some(entry.path()));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Ok(relative) = entry.path().strip_prefix(&root) {
                        listing.files.push(relative.to_path_buf());
                    }
                }
                Ok(_) => {}
                Err(e) if e.depth() == 0 => {
                    return Err(Error::enumeration(&root, e.to_string()));
                }
                Err(e) => {
                    let relative = e
                        .path()
                        .and_then(|p| p.strip_prefix(&root).ok())
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    listing
                        .unreadable
                        .push((relative, Error::enumeration(&root, e.to_string())));
                }
            }
        }
        Ok(listing)
    })
    .await
    .map_err(|e| Error::sync(format!("Enumeration task failed: {}", e)))?
}

/// `other` expressed under `root`, when it is a strict descendant of `root`
fn nested_tree(root: &Path, other: &Path) -> Option<PathBuf> {
    let root_abs = root.canonicalize().ok()?;
    let other_abs = other.canonicalize().ok()?;
    let inside = other_abs.strip_prefix(&root_abs).ok()?;
    if inside.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(inside))
}

/// First `<name>.conflict-<millis>[-n]` beside `target` that does not exist
async fn free_conflict_path(target: &Path) -> Result<PathBuf> {
    let millis = Utc::now().timestamp_millis();
    let mut attempt = 0;
    loop {
        let candidate = conflict_name(target, millis, attempt);
        match fs::symlink_metadata(&candidate).await {
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(e.into()),
            Ok(_) => attempt += 1,
        }
    }
}

/// Copy through a temporary sibling and rename into place
async fn copy_file(from: &Path, to: &Path, options: &SyncOptions) -> Result<u64> {
    let from_meta = fs::metadata(from).await?;
    if options.dry_run {
        return Ok(from_meta.len());
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = to.with_file_name(format!(".{}.{}.fvsync", name, uuid::Uuid::new_v4()));

    let outcome = async {
        let bytes = fs::copy(from, &temp).await?;
        if options.preserve_timestamps {
            let modified = FileTime::from_system_time(from_meta.modified()?);
            filetime::set_file_mtime(&temp, modified)?;
        }
        fs::rename(&temp, to).await?;
        Ok::<u64, std::io::Error>(bytes)
    }
    .await;

    match outcome {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            Err(Error::io(format!(
                "copying '{}' to '{}' failed: {}",
                from.display(),
                to.display(),
                e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrovault_types::{ConflictPolicy, ErrorKind as FvErrorKind};
    use rstest::rstest;
    use std::fs as stdfs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn set_age(path: &Path, secs_ago: u64) {
        let when = SystemTime::now() - Duration::from_secs(secs_ago);
        filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
    }

    async fn modified(path: &Path) -> SystemTime {
        fs::metadata(path).await.unwrap().modified().unwrap()
    }

    fn conflict_copies(dir: &Path) -> Vec<PathBuf> {
        stdfs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| is_conflict_copy(p))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_source() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 0);
        assert_eq!(result.conflicts_count, 0);
    }

    #[tokio::test]
    async fn test_new_file_is_copied_with_mtime() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        set_age(&source.path().join("a.txt"), 3600);

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.conflicts_count, 0);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(
            modified(&source.path().join("a.txt")).await,
            modified(&target.path().join("a.txt")).await
        );
    }

    #[tokio::test]
    async fn test_missing_target_root_is_created() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let nested = target.path().join("deep").join("root");
        stdfs::create_dir_all(source.path().join("x")).unwrap();
        stdfs::write(source.path().join("x").join("y.txt"), b"y").unwrap();

        let result = SyncEngine::new()
            .synchronize(source.path(), &nested, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert!(nested.join("x").join("y.txt").is_file());
    }

    #[tokio::test]
    async fn test_identical_content_is_not_a_conflict() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"same").unwrap();
        stdfs::write(target.path().join("a.txt"), b"same").unwrap();
        set_age(&target.path().join("a.txt"), 600);

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.conflicts_count, 0);
        assert_eq!(result.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn test_keep_newest_source_wins() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();
        set_age(&target.path().join("a.txt"), 600);

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::keep_newest())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.conflicts_count, 1);
        assert_eq!(result.conflicts[0].resolution, ConflictResolution::UseSource);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"hello");
    }

    #[rstest]
    #[case(false, b"hello".as_slice())]
    #[case(true, b"world".as_slice())]
    #[tokio::test]
    async fn test_keep_newest_target_newer(
        #[case] bidirectional: bool,
        #[case] expected_source: &[u8],
    ) {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();
        set_age(&source.path().join("a.txt"), 600);

        let options = SyncOptions {
            bidirectional,
            ..SyncOptions::default()
        };
        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert_eq!(result.conflicts_count, 1);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"world");
        assert_eq!(
            stdfs::read(source.path().join("a.txt")).unwrap(),
            expected_source
        );
    }

    #[tokio::test]
    async fn test_keep_newest_report_only() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();
        set_age(&target.path().join("a.txt"), 600);

        let options = SyncOptions {
            overwrite_newer: false,
            ..SyncOptions::default()
        };
        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert_eq!(result.conflicts_count, 1);
        assert_eq!(result.conflicts[0].resolution, ConflictResolution::KeepTarget);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"world");
    }

    #[tokio::test]
    async fn test_keep_both_writes_conflict_copy() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();
        set_age(&target.path().join("a.txt"), 600);

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::keep_both())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.conflicts_count, 1);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"world");

        let copies = conflict_copies(target.path());
        assert_eq!(copies.len(), 1);
        assert_eq!(stdfs::read(&copies[0]).unwrap(), b"hello");
        assert_eq!(result.conflicts[0].conflict_copy.as_ref(), Some(&copies[0]));
    }

    #[tokio::test]
    async fn test_keep_both_never_reuses_a_name() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();

        let engine = SyncEngine::new();
        let options = SyncOptions::keep_both();
        engine
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();
        engine
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert_eq!(conflict_copies(target.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_bidirectional_copies_back_target_only_files() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"from source").unwrap();
        stdfs::create_dir_all(target.path().join("only")).unwrap();
        stdfs::write(target.path().join("only").join("b.txt"), b"from target").unwrap();
        stdfs::write(target.path().join("c.txt.conflict-1700000000000"), b"old copy").unwrap();

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::bidirectional())
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.copied_back, 1);
        assert_eq!(
            stdfs::read(source.path().join("only").join("b.txt")).unwrap(),
            b"from target"
        );
        assert!(!source.path().join("c.txt.conflict-1700000000000").exists());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("new.txt"), b"new").unwrap();
        stdfs::write(source.path().join("a.txt"), b"hello").unwrap();
        stdfs::write(target.path().join("a.txt"), b"world").unwrap();
        set_age(&target.path().join("a.txt"), 600);

        let options = SyncOptions::keep_newest().with_dry_run(true);
        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.files_synced, 2);
        assert_eq!(result.conflicts_count, 1);
        assert!(!target.path().join("new.txt").exists());
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"world");
    }

    #[tokio::test]
    async fn test_missing_source_is_enumeration_failure() {
        let dir = TempDir::new().unwrap();
        let err = SyncEngine::new()
            .synchronize(
                &dir.path().join("missing"),
                &dir.path().join("target"),
                &SyncOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FvErrorKind::Enumeration);
        assert!(!dir.path().join("target").exists());
    }

    #[tokio::test]
    async fn test_directory_in_target_is_recorded_error() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"file").unwrap();
        stdfs::write(source.path().join("b.txt"), b"fine").unwrap();
        stdfs::create_dir_all(target.path().join("a.txt")).unwrap();

        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(result.errors_count, 1);
        assert_eq!(result.files_synced, 1);
        assert_eq!(result.errors[0].0, PathBuf::from("a.txt"));
        assert_eq!(stdfs::read(target.path().join("b.txt")).unwrap(), b"fine");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_link_does_not_abort_sync() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("good.txt"), b"good").unwrap();
        std::os::unix::fs::symlink(source.path().join("gone"), source.path().join("dangling"))
            .unwrap();

        let options = SyncOptions {
            follow_symlinks: true,
            ..SyncOptions::default()
        };
        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.errors_count, 1);
        assert_eq!(result.errors[0].0, PathBuf::from("dangling"));
        assert_eq!(stdfs::read(target.path().join("good.txt")).unwrap(), b"good");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_link_in_target_during_copy_back() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        stdfs::write(source.path().join("a.txt"), b"forward").unwrap();
        stdfs::write(target.path().join("b.txt"), b"back").unwrap();
        std::os::unix::fs::symlink(target.path().join("gone"), target.path().join("dangling"))
            .unwrap();

        let options = SyncOptions {
            follow_symlinks: true,
            ..SyncOptions::bidirectional()
        };
        let result = SyncEngine::new()
            .synchronize(source.path(), target.path(), &options)
            .await
            .unwrap();

        assert_eq!(result.files_synced, 1);
        assert_eq!(result.copied_back, 1);
        assert_eq!(result.errors_count, 1);
        assert_eq!(stdfs::read(target.path().join("a.txt")).unwrap(), b"forward");
        assert_eq!(stdfs::read(source.path().join("b.txt")).unwrap(), b"back");
    }

    #[tokio::test]
    async fn test_target_inside_source_is_not_copied_into_itself() {
        let source = TempDir::new().unwrap();
        let target = source.path().join("mirror");
        stdfs::write(source.path().join("a.txt"), b"alpha").unwrap();

        let engine = SyncEngine::new();
        engine
            .synchronize(source.path(), &target, &SyncOptions::default())
            .await
            .unwrap();
        let second = engine
            .synchronize(source.path(), &target, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(second.files_synced, 1);
        assert_eq!(second.errors_count, 0);
        assert_eq!(stdfs::read(target.join("a.txt")).unwrap(), b"alpha");
        assert!(!target.join("mirror").exists());
    }

    #[test]
    fn test_policy_display_in_logs() {
        assert_eq!(ConflictPolicy::KeepBoth.to_string(), "keep-both");
    }
}
