//! Backup pipeline for FerroVault
//!
//! This crate walks a source tree and stores each file's content once per
//! provider, keyed by its SHA-256 fingerprint.
//!
//! # Features
//!
//! - **Deduplication**: identical content is written once, across files and runs
//! - **Bounded concurrency**: a semaphore caps the number of files in flight
//! - **Payload envelope**: compressed, optionally AES-GCM encrypted objects
//! - **Throttling**: one shared write budget for the whole run
//! - **Restore**: manifest-driven, fingerprint-verified restore
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrovault_engine::{BackupConfig, BackupPipeline};
//!
//! # async fn example() -> ferrovault_types::Result<()> {
//! let config = BackupConfig::builder("/data", "/backup")
//!     .parallelism(8)
//!     .build()?;
//! let result = BackupPipeline::open_local(&config)?.run(&config).await;
//! println!("{}: {}", result.status, result.message);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod manifest;
pub mod payload;
pub mod pipeline;
pub mod progress;
pub mod restore;
pub mod task;
pub mod throttle;

pub use manifest::{BackupManifest, ManifestEntry, MANIFEST_META_KEY};
pub use payload::PayloadHeader;
pub use pipeline::{BackupHandle, BackupPipeline};
pub use progress::{RunCounters, TracingListener};
pub use restore::{RestoreResult, Restorer};
pub use task::{BackupConfig, BackupConfigBuilder, BackupResult, BackupStatus, FileFailure};
pub use throttle::{RateLimiter, ThrottledReader};
