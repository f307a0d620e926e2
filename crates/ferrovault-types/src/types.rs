//! Core data types for FerroVault
//!
//! Content identity (`ContentFingerprint`), object location (`StoredObjectKey`),
//! compression selection and progress snapshots shared by every crate.

use crate::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Directory (relative to a provider root) holding metadata entries
pub const META_DIR: &str = "_meta";

/// Directory (relative to a provider root) holding in-flight uploads
pub const TEMP_DIR: &str = ".tmp";

/// Prefix under which objects are stored by the backup pipeline
pub const OBJECTS_DIR: &str = "objects";

/// Length of a hex-encoded SHA-256 digest
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Hex digest identifying a byte sequence independently of its name or location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Build a fingerprint from raw digest bytes
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a hex fingerprint, rejecting wrong lengths and non-hex characters
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != FINGERPRINT_HEX_LEN {
            return Err(Error::integrity(format!(
                "fingerprint must be {} hex characters, got {}",
                FINGERPRINT_HEX_LEN,
                value.len()
            )));
        }
        let digest = hex::decode(value).map_err(|e| {
            Error::integrity(format!("fingerprint {} is not valid hex: {}", value, e))
        })?;
        Ok(Self::from_digest(&digest))
    }

    /// Get the fingerprint as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentFingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContentFingerprint> for String {
    fn from(fingerprint: ContentFingerprint) -> Self {
        fingerprint.0
    }
}

/// Opaque relative key locating an object inside one storage provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct StoredObjectKey(String);

impl StoredObjectKey {
    /// Create a key, rejecting absolute paths, parent traversal and reserved prefixes
    pub fn new<S: Into<String>>(key: S) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::other("object key must not be empty"));
        }

        let path = Path::new(&key);
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => {
                    return Err(Error::other(format!(
                        "object key must be a plain relative path: {}",
                        key
                    )))
                }
            }
        }

        let first = path.components().find_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        });
        if matches!(first, Some(META_DIR) | Some(TEMP_DIR)) {
            return Err(Error::other(format!(
                "object key uses a reserved namespace: {}",
                key
            )));
        }

        Ok(Self(key))
    }

    /// Key under which the pipeline stores content with this fingerprint
    pub fn for_fingerprint(fingerprint: &ContentFingerprint) -> Self {
        let hex = fingerprint.as_str();
        Self(format!("{}/{}/{}", OBJECTS_DIR, &hex[..2], &hex[2..]))
    }

    /// Get the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative filesystem path for this key
    pub fn to_relative_path(&self) -> PathBuf {
        self.0.split('/').filter(|part| !part.is_empty()).collect()
    }
}

impl fmt::Display for StoredObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StoredObjectKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StoredObjectKey> for String {
    fn from(key: StoredObjectKey) -> Self {
        key.0
    }
}

/// Compression algorithm applied to stored payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// Zstandard
    #[default]
    Zstd,
    /// Gzip (deflate)
    Gzip,
}

impl CompressionAlgorithm {
    /// Identifier written into the payload envelope
    pub fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zstd => 1,
            Self::Gzip => 2,
        }
    }

    /// Decode an envelope identifier
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Zstd),
            2 => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Default level for this algorithm
    pub fn default_level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zstd => 3,
            Self::Gzip => 6,
        }
    }

    /// Highest accepted level for this algorithm
    pub fn max_level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zstd => 22,
            Self::Gzip => 9,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zstd => write!(f, "zstd"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

/// How a sync resolves a path whose content differs on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConflictPolicy {
    /// The side with the strictly newer modification time wins
    #[default]
    KeepNewest,
    /// The source copy is written beside the target under a conflict name
    KeepBoth,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepNewest => write!(f, "keep-newest"),
            Self::KeepBoth => write!(f, "keep-both"),
        }
    }
}

/// Snapshot reported to a progress listener after each file
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressUpdate {
    /// Bytes of source content processed so far
    pub bytes_processed: u64,
    /// Files processed so far (written, deduplicated or failed)
    pub files_processed: u64,
    /// Files discovered in the source tree
    pub total_files: u64,
    /// File that was just finished, relative to the source root
    pub current_file: PathBuf,
}

impl ProgressUpdate {
    /// Percentage of files processed
    pub fn file_progress(&self) -> f64 {
        if self.total_files > 0 {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        } else {
            0.0
        }
    }
}
