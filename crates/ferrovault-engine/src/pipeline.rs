//! Deduplicating backup pipeline
//!
//! Files are discovered with `walkdir`, then processed by tokio tasks bounded
//! by a semaphore. Each task fingerprints its file, claims the fingerprint in
//! the [`DedupIndex`], and only writes a payload when no reference exists yet.

use crate::manifest::BackupManifest;
use crate::payload;
use crate::progress::{final_update, RunCounters, TracingListener};
use crate::task::{BackupConfig, BackupResult, BackupStatus, FileFailure};
use crate::throttle::{RateLimiter, ThrottledReader};
use ferrovault_compression::Compressor;
use ferrovault_crypto::{Cipher, ContentHasher};
use ferrovault_storage::{DedupIndex, LocalStorageProvider, StorageProvider};
use ferrovault_types::{
    Cancellable, CancellationToken, ContentFingerprint, Error, ProgressListener, Result,
    StoredObjectKey,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Backup pipeline writing into one storage provider
#[derive(Clone)]
pub struct BackupPipeline {
    provider: Arc<dyn StorageProvider>,
    listener: Arc<dyn ProgressListener>,
}

impl fmt::Debug for BackupPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupPipeline")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

/// A file that was stored or deduplicated
struct StoredFile {
    relative: PathBuf,
    fingerprint: ContentFingerprint,
    size: u64,
}

/// Files found by the walk, plus entries the walk could not read
struct Discovery {
    files: Vec<PathBuf>,
    unreadable: Vec<(PathBuf, Error)>,
}

impl BackupPipeline {
    /// Pipeline writing into `provider`, reporting progress through `tracing`
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            listener: Arc::new(TracingListener),
        }
    }

    /// Pipeline writing into a local directory at the configured destination
    pub fn open_local(config: &BackupConfig) -> Result<Self> {
        let provider = LocalStorageProvider::new(config.destination())?;
        Ok(Self::new(Arc::new(provider)))
    }

    /// Replace the progress listener
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Provider the pipeline writes into
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Start a run in the background
    pub fn execute(&self, config: BackupConfig) -> BackupHandle {
        let token = CancellationToken::new();
        let pipeline = self.clone();
        let run_token = token.clone();
        let task = tokio::spawn(async move { pipeline.run_with_token(&config, &run_token).await });
        BackupHandle { token, task }
    }

    /// Run a backup to completion
    pub async fn run(&self, config: &BackupConfig) -> BackupResult {
        self.run_with_token(config, &CancellationToken::new()).await
    }

    /// Run a backup, stopping before the next file once `token` is cancelled
    pub async fn run_with_token(
        &self,
        config: &BackupConfig,
        token: &CancellationToken,
    ) -> BackupResult {
        let start = Instant::now();
        info!(
            "Starting backup of {} into '{}'",
            config.source().display(),
            self.provider.name()
        );

        let cipher = match config.cipher() {
            Ok(cipher) => cipher,
            Err(e) => return BackupResult::failure(e.to_string(), start.elapsed()),
        };

        let source = config.source().to_path_buf();
        let destination = config.destination().to_path_buf();
        let follow = config.follow_symlinks();
        let discovery = match tokio::task::spawn_blocking(move || {
            discover(&source, &destination, follow)
        })
        .await
        {
            Ok(Ok(discovery)) => discovery,
            Ok(Err(e)) => {
                warn!("Backup aborted: {}", e);
                return BackupResult::failure(e.to_string(), start.elapsed());
            }
            Err(e) => {
                return BackupResult::failure(
                    format!("Enumeration task failed: {}", e),
                    start.elapsed(),
                )
            }
        };

        let total = (discovery.files.len() + discovery.unreadable.len()) as u64;
        let counters = Arc::new(RunCounters::new(total));
        let mut failures = Vec::new();
        for (path, error) in discovery.unreadable {
            self.record_failure(&counters, &path, &error);
            failures.push(FileFailure {
                path,
                error: error.to_string(),
            });
        }

        let worker = Arc::new(Worker {
            source: config.source().to_path_buf(),
            provider: Arc::clone(&self.provider),
            dedup: DedupIndex::new(Arc::clone(&self.provider)),
            deduplicate: config.deduplicate(),
            hasher: ContentHasher::new(),
            compressor: config.compressor(),
            cipher,
            limiter: RateLimiter::new(config.throttle().get()),
            counters: Arc::clone(&counters),
            listener: Arc::clone(&self.listener),
        });

        let semaphore = Arc::new(Semaphore::new(config.parallelism()));
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for path in discovery.files {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let worker = Arc::clone(&worker);
            tasks.spawn(async move {
                let _permit = permit;
                let relative = worker.relative(&path);
                let outcome = worker.process(&path, &relative).await;
                (relative, outcome)
            });
        }

        let mut manifest = BackupManifest::new(config.source());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(stored))) => {
                    manifest.insert(&stored.relative, stored.fingerprint, stored.size);
                }
                Ok((relative, Err(error))) => {
                    self.record_failure(&counters, &relative, &error);
                    failures.push(FileFailure {
                        path: relative,
                        error: error.to_string(),
                    });
                }
                Err(e) => {
                    let error = Error::other(format!("Backup worker failed: {}", e));
                    self.record_failure(&counters, Path::new(""), &error);
                    failures.push(FileFailure {
                        path: PathBuf::new(),
                        error: error.to_string(),
                    });
                }
            }
        }

        let snapshot = counters.snapshot();
        let mut status = if cancelled {
            BackupStatus::Cancelled
        } else if exceeds_ratio(snapshot.files_failed, total, config.max_failure_ratio()) {
            BackupStatus::PartialFailure
        } else {
            BackupStatus::Success
        };

        let mut message = format!(
            "{} written, {} deduplicated, {} failed of {} files",
            snapshot.objects_written, snapshot.objects_deduplicated, snapshot.files_failed, total
        );

        if config.write_manifest() && !cancelled {
            if let Err(e) = manifest.store(self.provider.as_ref()).await {
                warn!("Failed to store backup manifest: {}", e);
                message.push_str(&format!("; manifest not stored: {}", e));
                if status == BackupStatus::Success {
                    status = BackupStatus::PartialFailure;
                }
            }
        }

        self.listener.on_complete(&final_update(&counters));
        let duration = start.elapsed();
        info!("Backup {} in {:?}: {}", status, duration, message);

        BackupResult {
            status,
            message,
            objects_written: snapshot.objects_written,
            objects_deduplicated: snapshot.objects_deduplicated,
            files_failed: snapshot.files_failed,
            total_files: total,
            bytes_read: snapshot.bytes_processed,
            bytes_stored: snapshot.bytes_stored,
            duration,
            failures,
        }
    }

    fn record_failure(&self, counters: &RunCounters, path: &Path, error: &Error) {
        counters.record_failed();
        self.listener.on_file_failed(path, error);
        self.listener.on_progress(&counters.progress(path));
    }
}

fn exceeds_ratio(failed: u64, total: u64, max_ratio: f64) -> bool {
    total > 0 && failed as f64 / total as f64 > max_ratio
}

/// List regular files under `source`, skipping `destination` when it lies inside
fn discover(source: &Path, destination: &Path, follow_symlinks: bool) -> Result<Discovery> {
    let metadata = std::fs::metadata(source)
        .map_err(|e| Error::enumeration(source, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(Error::enumeration(source, "not a directory"));
    }

    let skip = nested_destination(source, destination);
    if let Some(skip) = &skip {
        debug!("Skipping destination {} inside source", skip.display());
    }

    let mut discovery = Discovery {
        files: Vec::new(),
        unreadable: Vec::new(),
    };
    let walker = WalkDir::new(source)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_entry(|entry| skip.as_deref() != Some(entry.path()));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                discovery.files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(Error::enumeration(source, e.to_string()));
            }
            Err(e) => {
                let path = e
                    .path()
                    .and_then(|p| p.strip_prefix(source).ok())
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                discovery
                    .unreadable
                    .push((path, Error::enumeration(source, e.to_string())));
            }
        }
    }

    debug!(
        "Discovered {} files under {}",
        discovery.files.len(),
        source.display()
    );
    Ok(discovery)
}

fn nested_destination(source: &Path, destination: &Path) -> Option<PathBuf> {
    let source_abs = source.canonicalize().ok()?;
    let destination_abs = destination.canonicalize().ok()?;
    let inside = destination_abs.strip_prefix(&source_abs).ok()?;
    if inside.as_os_str().is_empty() {
        return None;
    }
    Some(source.join(inside))
}

/// State shared by the tasks of one run
struct Worker {
    source: PathBuf,
    provider: Arc<dyn StorageProvider>,
    dedup: DedupIndex,
    deduplicate: bool,
    hasher: ContentHasher,
    compressor: Compressor,
    cipher: Option<Cipher>,
    limiter: Option<Arc<RateLimiter>>,
    counters: Arc<RunCounters>,
    listener: Arc<dyn ProgressListener>,
}

impl Worker {
    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.source)
            .unwrap_or(path)
            .to_path_buf()
    }

    async fn process(&self, path: &Path, relative: &Path) -> Result<StoredFile> {
        let fingerprint = self.hasher.fingerprint_file(path).await?;
        let key = StoredObjectKey::for_fingerprint(&fingerprint);

        let size = if self.deduplicate {
            let _claim = self.dedup.claim(&fingerprint).await;
            if self.dedup.has(&fingerprint).await? {
                let size = tokio::fs::metadata(path).await?.len();
                debug!(
                    "{} already stored as {}",
                    relative.display(),
                    fingerprint.short()
                );
                self.counters.record_deduplicated(size);
                size
            } else {
                let (size, stored) = self.store(path, &key).await?;
                self.dedup.put(&fingerprint, &key).await?;
                self.counters.record_written(size, stored);
                size
            }
        } else {
            let (size, stored) = self.store(path, &key).await?;
            self.counters.record_written(size, stored);
            size
        };

        self.listener.on_progress(&self.counters.progress(relative));
        Ok(StoredFile {
            relative: relative.to_path_buf(),
            fingerprint,
            size,
        })
    }

    /// Seal the file into a payload and write it; returns (source size, stored size)
    async fn store(&self, path: &Path, key: &StoredObjectKey) -> Result<(u64, u64)> {
        let path = path.to_path_buf();
        let compressor = self.compressor;
        let cipher = self.cipher.clone();
        let (size, sealed) = tokio::task::spawn_blocking(move || -> Result<(u64, Vec<u8>)> {
            let file = std::fs::File::open(&path)?;
            let size = file.metadata()?.len();
            let sealed = payload::seal(std::io::BufReader::new(file), &compressor, cipher.as_ref())?;
            Ok((size, sealed))
        })
        .await
        .map_err(|e| Error::other(format!("Payload task failed: {}", e)))??;

        let expected = sealed.len() as u64;
        let mut reader = ThrottledReader::new(sealed.as_slice(), self.limiter.clone());
        let stored = self.provider.put(key, &mut reader, expected).await?;
        debug!("Stored {} ({} -> {} bytes)", key, size, stored);
        Ok((size, stored))
    }
}

/// Handle to a backup started with [`BackupPipeline::execute`]
#[derive(Debug)]
pub struct BackupHandle {
    token: CancellationToken,
    task: JoinHandle<BackupResult>,
}

impl BackupHandle {
    /// Token observed by the run
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the run to finish
    pub async fn wait(self) -> BackupResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => BackupResult::failure(format!("Backup task failed: {}", e), Duration::ZERO),
        }
    }
}

impl Cancellable for BackupHandle {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
