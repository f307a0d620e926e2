//! Storage providers and deduplication index for FerroVault
//!
//! This crate provides:
//!
//! - **[`StorageProvider`]**: the capability set every backend implements
//!   (atomic object writes, a small metadata namespace, dedup references)
//! - **[`LocalStorageProvider`]**: a directory on the local filesystem
//! - **[`MockCloudProvider`]**: a second local tree behaving like an object
//!   store, with a Content-Length style size check and optional latency
//! - **[`DedupIndex`]**: fingerprint lookups plus per-fingerprint claims that
//!   serialise check-then-write inside one process
//!
//! # On-disk layout
//!
//! ```text
//! <root>/<key>                  objects
//! <root>/_meta/<meta-key>       metadata, including ref-<fingerprint>
//! <root>/.tmp/                  in-flight writes
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrovault_storage::{LocalStorageProvider, StorageProvider};
//! use ferrovault_types::StoredObjectKey;
//!
//! # tokio_test::block_on(async {
//! let provider = LocalStorageProvider::new("/var/backups/vault")?;
//! let key = StoredObjectKey::new("docs/readme.txt")?;
//! let mut data: &[u8] = b"hello";
//! provider.put(&key, &mut data, 5).await?;
//! assert!(provider.exists(&key).await?);
//! # Ok::<(), ferrovault_types::Error>(())
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cloud;
pub mod dedup;
mod fs_util;
pub mod layout;
pub mod local;
pub mod provider;

pub use cloud::MockCloudProvider;
pub use dedup::{DedupIndex, FingerprintGuard};
pub use layout::StorageLayout;
pub use local::LocalStorageProvider;
pub use provider::{reference_meta_key, StorageProvider, REFERENCE_PREFIX};
