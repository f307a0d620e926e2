//! Configuration management system for FerroVault
//!
//! Configuration is layered: built-in defaults, then an optional YAML, TOML or
//! JSON file, then environment variables prefixed with `FERROVAULT` using `__`
//! as the section separator (for example `FERROVAULT__BACKUP__PARALLELISM=8`).
//!
//! # Examples
//!
//! ```rust
//! use ferrovault_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrovault.yaml")
//!     .add_env_prefix("FERROVAULT")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Workers: {}", config.backup.parallelism);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrovault_types::{CompressionAlgorithm, ConflictPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FERROVAULT";

/// Main configuration structure for FerroVault
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backup pipeline settings
    pub backup: BackupSettings,
    /// Sync engine settings
    pub sync: SyncSettings,
    /// Storage destination settings
    pub storage: StorageSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backup pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Number of files processed concurrently
    pub parallelism: usize,
    /// Compress payloads before storing
    pub compress: bool,
    /// Compression algorithm
    pub compression_algorithm: CompressionAlgorithm,
    /// Compression level for the algorithm
    pub compression_level: u8,
    /// Skip content that is already stored
    pub deduplicate: bool,
    /// Hex-encoded 16 or 32 byte AES key; unset disables encryption
    pub encryption_key: Option<String>,
    /// Aggregate write limit in bytes per second, 0 for unbounded
    pub throttle_bytes_per_sec: u64,
    /// Portion of failed files tolerated before a run is a partial failure
    pub max_failure_ratio: f64,
    /// Follow symbolic links while walking the source
    pub follow_symlinks: bool,
    /// Store the path manifest after each run
    pub write_manifest: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            parallelism: 4,
            compress: true,
            compression_algorithm: CompressionAlgorithm::Zstd,
            compression_level: 3,
            deduplicate: true,
            encryption_key: None,
            throttle_bytes_per_sec: 0,
            max_failure_ratio: 0.0,
            follow_symlinks: false,
            write_manifest: true,
        }
    }
}

impl BackupSettings {
    /// Decoded encryption key, if one is configured
    pub fn encryption_key_bytes(&self) -> ConfigResult<Option<Vec<u8>>> {
        let Some(hex_key) = self.encryption_key.as_deref() else {
            return Ok(None);
        };
        let key = hex::decode(hex_key.trim()).map_err(|e| {
            ConfigError::invalid_value("backup.encryption_key", format!("not valid hex: {}", e))
        })?;
        if key.len() != 16 && key.len() != 32 {
            return Err(ConfigError::invalid_value(
                "backup.encryption_key",
                format!("key must be 16 or 32 bytes, got {}", key.len()),
            ));
        }
        Ok(Some(key))
    }
}

/// Sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// How differing content is resolved
    pub conflict_policy: ConflictPolicy,
    /// Propagate newer target files back to the source
    pub bidirectional: bool,
    /// Allow `KeepNewest` to overwrite the older side
    pub overwrite_newer: bool,
    /// Keep source modification times on copies
    pub preserve_timestamps: bool,
    /// Report what would change without writing
    pub dry_run: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::KeepNewest,
            bidirectional: false,
            overwrite_newer: true,
            preserve_timestamps: true,
            dry_run: false,
        }
    }
}

/// Kind of storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Local directory
    #[default]
    Local,
    /// Local directory behaving like a cloud bucket
    MockCloud,
}

/// Storage destination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Backend used for backups
    pub provider: ProviderKind,
    /// Default destination root when none is given on the command line
    pub destination: Option<PathBuf>,
    /// Simulated per-request latency for the mock cloud, in milliseconds
    pub cloud_latency_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            destination: None,
            cloud_latency_ms: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            colored_output: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backup.parallelism, 4);
        assert!(config.backup.compress);
        assert!(config.backup.deduplicate);
        assert_eq!(config.sync.conflict_policy, ConflictPolicy::KeepNewest);
        assert!(!config.sync.bidirectional);
        assert!(config.sync.overwrite_newer);
        assert_eq!(config.storage.provider, ProviderKind::Local);
    }

    #[test]
    fn test_encryption_key_decoding() {
        let mut settings = BackupSettings::default();
        assert_eq!(settings.encryption_key_bytes().unwrap(), None);

        settings.encryption_key = Some("00".repeat(16));
        assert_eq!(settings.encryption_key_bytes().unwrap().unwrap().len(), 16);

        settings.encryption_key = Some("00".repeat(20));
        assert!(settings.encryption_key_bytes().is_err());

        settings.encryption_key = Some("xyz".to_string());
        assert!(settings.encryption_key_bytes().is_err());
    }
}
