//! Payload compression for FerroVault
//!
//! The [`Compressor`] moves data from a reader to a writer in bounded chunks,
//! so payloads never need to be compressed as one buffer.
//!
//! # Supported Algorithms
//!
//! - **Zstandard (zstd)**: default, level 3
//! - **Gzip**: deflate with a gzip header, levels 1-9
//! - **None**: bytes pass through unchanged
//!
//! # Examples
//!
//! ```rust
//! use ferrovault_compression::Compressor;
//! use ferrovault_types::CompressionAlgorithm;
//!
//! let compressor = Compressor::new(CompressionAlgorithm::Gzip, 6).unwrap();
//! let mut packed = Vec::new();
//! compressor.compress(&b"hello hello hello"[..], &mut packed).unwrap();
//!
//! let mut unpacked = Vec::new();
//! compressor.decompress(packed.as_slice(), &mut unpacked).unwrap();
//! assert_eq!(unpacked, b"hello hello hello");
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod streaming;

pub use streaming::{Compressor, STREAM_BUFFER_SIZE};
