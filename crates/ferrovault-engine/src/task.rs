//! Backup run configuration and results

use ferrovault_compression::Compressor;
use ferrovault_config::BackupSettings;
use ferrovault_crypto::Cipher;
use ferrovault_types::{
    CompressionAlgorithm, CompressionLevel, Error, Result, ThreadCount, ThrottleRate,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable configuration for one backup run
#[derive(Debug, Clone)]
pub struct BackupConfig {
    source: PathBuf,
    destination: PathBuf,
    parallelism: ThreadCount,
    key: Option<Vec<u8>>,
    throttle: ThrottleRate,
    compression: Option<CompressionLevel>,
    deduplicate: bool,
    max_failure_ratio: f64,
    follow_symlinks: bool,
    write_manifest: bool,
}

impl BackupConfig {
    /// Start building a configuration for `source` into `destination`
    pub fn builder<S: Into<PathBuf>, D: Into<PathBuf>>(
        source: S,
        destination: D,
    ) -> BackupConfigBuilder {
        BackupConfigBuilder::new(source, destination)
    }

    /// Build a configuration from loaded settings
    pub fn from_settings<S: Into<PathBuf>, D: Into<PathBuf>>(
        source: S,
        destination: D,
        settings: &BackupSettings,
    ) -> Result<Self> {
        let mut builder = Self::builder(source, destination)
            .parallelism(settings.parallelism)
            .throttle(settings.throttle_bytes_per_sec)
            .deduplicate(settings.deduplicate)
            .max_failure_ratio(settings.max_failure_ratio)
            .follow_symlinks(settings.follow_symlinks)
            .write_manifest(settings.write_manifest);
        builder = if settings.compress {
            builder.compression(settings.compression_algorithm, settings.compression_level)
        } else {
            builder.no_compression()
        };
        if let Some(key) = settings.encryption_key_bytes()? {
            builder = builder.key(key);
        }
        builder.build()
    }

    /// Root of the tree being backed up
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Root of the destination store
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Number of files processed concurrently
    pub fn parallelism(&self) -> usize {
        self.parallelism.get()
    }

    /// Cipher for the configured key, if encryption is enabled
    pub fn cipher(&self) -> Result<Option<Cipher>> {
        self.key.as_deref().map(Cipher::new).transpose()
    }

    /// Whether payloads are encrypted
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    /// Aggregate write limit
    pub fn throttle(&self) -> ThrottleRate {
        self.throttle
    }

    /// Compressor applied to payloads
    pub fn compressor(&self) -> Compressor {
        self.compression
            .map_or_else(Compressor::passthrough, Compressor::from_level)
    }

    /// Whether already stored content is skipped
    pub fn deduplicate(&self) -> bool {
        self.deduplicate
    }

    /// Portion of failed files tolerated before the run is a partial failure
    pub fn max_failure_ratio(&self) -> f64 {
        self.max_failure_ratio
    }

    /// Whether symbolic links are followed while walking the source
    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Whether the path manifest is stored after the run
    pub fn write_manifest(&self) -> bool {
        self.write_manifest
    }
}

/// Builder for [`BackupConfig`]
#[derive(Debug, Clone)]
pub struct BackupConfigBuilder {
    source: PathBuf,
    destination: PathBuf,
    parallelism: usize,
    key: Option<Vec<u8>>,
    throttle: u64,
    compression: Option<(CompressionAlgorithm, u8)>,
    deduplicate: bool,
    max_failure_ratio: f64,
    follow_symlinks: bool,
    write_manifest: bool,
}

impl BackupConfigBuilder {
    fn new<S: Into<PathBuf>, D: Into<PathBuf>>(source: S, destination: D) -> Self {
        let algorithm = CompressionAlgorithm::default();
        Self {
            source: source.into(),
            destination: destination.into(),
            parallelism: ThreadCount::DEFAULT,
            key: None,
            throttle: 0,
            compression: Some((algorithm, algorithm.default_level())),
            deduplicate: true,
            max_failure_ratio: 0.0,
            follow_symlinks: false,
            write_manifest: true,
        }
    }

    /// Set the number of files processed concurrently
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Encrypt payloads with a 16 or 32 byte key
    pub fn key<K: Into<Vec<u8>>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Limit aggregate writes to `bytes_per_sec` (0 for unbounded)
    pub fn throttle(mut self, bytes_per_sec: u64) -> Self {
        self.throttle = bytes_per_sec;
        self
    }

    /// Compress payloads with `algorithm` at `level`
    pub fn compression(mut self, algorithm: CompressionAlgorithm, level: u8) -> Self {
        self.compression = Some((algorithm, level));
        self
    }

    /// Store payloads uncompressed
    pub fn no_compression(mut self) -> Self {
        self.compression = None;
        self
    }

    /// Enable or disable deduplication
    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Portion of failed files tolerated before the run is a partial failure
    pub fn max_failure_ratio(mut self, ratio: f64) -> Self {
        self.max_failure_ratio = ratio;
        self
    }

    /// Follow symbolic links while walking the source
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Store the path manifest after the run
    pub fn write_manifest(mut self, write: bool) -> Self {
        self.write_manifest = write;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<BackupConfig> {
        let parallelism = ThreadCount::new(self.parallelism).map_err(Error::config)?;

        if !(0.0..=1.0).contains(&self.max_failure_ratio) {
            return Err(Error::config(format!(
                "max failure ratio must be between 0.0 and 1.0, got {}",
                self.max_failure_ratio
            )));
        }

        if let Some(key) = &self.key {
            Cipher::new(key)?;
        }

        let compression = match self.compression {
            Some((CompressionAlgorithm::None, _)) | None => None,
            Some((algorithm, level)) => {
                Some(CompressionLevel::new(algorithm, level).map_err(Error::config)?)
            }
        };

        Ok(BackupConfig {
            source: self.source,
            destination: self.destination,
            parallelism,
            key: self.key,
            throttle: ThrottleRate::new(self.throttle),
            compression,
            deduplicate: self.deduplicate,
            max_failure_ratio: self.max_failure_ratio,
            follow_symlinks: self.follow_symlinks,
            write_manifest: self.write_manifest,
        })
    }
}

/// Overall outcome of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackupStatus {
    /// Every file was stored or deduplicated, or failures stayed within tolerance
    Success,
    /// More files failed than the configured ratio allows
    PartialFailure,
    /// The run could not start or could not enumerate its source
    Failure,
    /// The run was cancelled before every file was scheduled
    Cancelled,
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialFailure => write!(f, "partial failure"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A file that could not be backed up
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    /// Path relative to the source root
    pub path: PathBuf,
    /// Error text
    pub error: String,
}

/// Result of a backup run
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    /// Overall status
    pub status: BackupStatus,
    /// Human readable summary
    pub message: String,
    /// Objects physically written to storage
    pub objects_written: u64,
    /// Files skipped because their content was already stored
    pub objects_deduplicated: u64,
    /// Files that failed
    pub files_failed: u64,
    /// Files discovered in the source tree
    pub total_files: u64,
    /// Bytes of source content read
    pub bytes_read: u64,
    /// Payload bytes written to storage
    pub bytes_stored: u64,
    /// Wall-clock duration of the run
    pub duration: Duration,
    /// Per-file failures
    pub failures: Vec<FileFailure>,
}

impl BackupResult {
    /// Result for a run that could not proceed
    pub fn failure<S: Into<String>>(message: S, duration: Duration) -> Self {
        Self {
            status: BackupStatus::Failure,
            message: message.into(),
            objects_written: 0,
            objects_deduplicated: 0,
            files_failed: 0,
            total_files: 0,
            bytes_read: 0,
            bytes_stored: 0,
            duration,
            failures: Vec::new(),
        }
    }

    /// Whether the run finished with [`BackupStatus::Success`]
    pub fn is_success(&self) -> bool {
        self.status == BackupStatus::Success
    }

    /// Read throughput in bytes per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_read as f64 / secs
        } else {
            0.0
        }
    }
}
