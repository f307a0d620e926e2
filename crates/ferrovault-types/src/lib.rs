//! Core type system and error handling for FerroVault
//!
//! This crate provides the foundational types shared by every FerroVault crate:
//!
//! - **Error handling**: a single error enum with kinds and severity levels
//! - **Content identity**: fingerprints and storage keys
//! - **Traits**: progress listeners and cancellation
//! - **Configuration**: validated value types
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrovault_types::{ContentFingerprint, StoredObjectKey, Result};
//!
//! fn locate(hex: &str) -> Result<StoredObjectKey> {
//!     let fingerprint = ContentFingerprint::parse(hex)?;
//!     Ok(StoredObjectKey::for_fingerprint(&fingerprint))
//! }
//!
//! let key = locate(&"0".repeat(64)).unwrap();
//! assert!(key.as_str().starts_with("objects/00/"));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{CompressionLevel, ThreadCount, ThrottleRate};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let config_error = Error::config("invalid config");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_fingerprint_key_relationship() {
        let fp = ContentFingerprint::parse(&"f".repeat(FINGERPRINT_HEX_LEN)).unwrap();
        let key = StoredObjectKey::for_fingerprint(&fp);
        assert!(StoredObjectKey::new(key.as_str()).is_ok());
    }
}
