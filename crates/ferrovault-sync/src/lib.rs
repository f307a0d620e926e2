//! Two-tree synchronization for FerroVault
//!
//! This crate reconciles a source directory with a target directory:
//!
//! - **Content comparison**: files present on both sides are compared by SHA-256 fingerprint
//! - **Conflict policies**: keep the newer copy, or keep both under a conflict name
//! - **Bidirectional mode**: newer targets and target-only files flow back to the source
//! - **Atomic copies**: every write goes through a temporary sibling and a rename
//!
//! Every run walks both trees in full; nothing is cached between runs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrovault_sync::{SyncEngine, SyncOptions};
//! use std::path::Path;
//!
//! # async fn example() -> ferrovault_types::Result<()> {
//! let engine = SyncEngine::new();
//! let result = engine
//!     .synchronize(Path::new("source_dir"), Path::new("dest_dir"), &SyncOptions::keep_both())
//!     .await?;
//! println!("Synced {} files, {} conflicts", result.files_synced, result.conflicts_count);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod conflict;
pub mod engine;
pub mod options;

pub use conflict::{is_conflict_copy, ConflictResolution, SyncConflict, CONFLICT_MARKER};
pub use engine::{SyncEngine, SyncResult};
pub use options::SyncOptions;
