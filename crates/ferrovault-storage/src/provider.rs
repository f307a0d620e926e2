//! The storage capability set

use async_trait::async_trait;
use ferrovault_types::{ContentFingerprint, Error, Result, StoredObjectKey};
use std::fmt::Debug;
use tokio::io::AsyncRead;

/// Metadata key prefix for dedup references
pub const REFERENCE_PREFIX: &str = "ref-";

/// Metadata key under which the reference for `fingerprint` is stored
pub fn reference_meta_key(fingerprint: &ContentFingerprint) -> String {
    format!("{}{}", REFERENCE_PREFIX, fingerprint)
}

/// A place objects and metadata can be written to and read back from
///
/// Absent objects and metadata are reported as `None`, never as errors.
#[async_trait]
pub trait StorageProvider: Send + Sync + Debug {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Durably and atomically store the stream under `key`, replacing any
    /// existing object. Returns the number of bytes written.
    async fn put(
        &self,
        key: &StoredObjectKey,
        data: &mut (dyn AsyncRead + Send + Unpin),
        expected_size: u64,
    ) -> Result<u64>;

    /// Read a whole object
    async fn get(&self, key: &StoredObjectKey) -> Result<Option<Vec<u8>>>;

    /// Whether an object is stored under `key`
    async fn exists(&self, key: &StoredObjectKey) -> Result<bool>;

    /// Store a small metadata entry, replacing any existing value
    async fn put_meta(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read a metadata entry
    async fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create a metadata entry only if none exists; `true` if this call created it
    async fn put_meta_if_absent(&self, key: &str, bytes: &[u8]) -> Result<bool>;

    /// Record that `fingerprint` is stored under `key`; the first writer wins
    async fn put_reference(
        &self,
        fingerprint: &ContentFingerprint,
        key: &StoredObjectKey,
    ) -> Result<bool> {
        self.put_meta_if_absent(&reference_meta_key(fingerprint), key.as_str().as_bytes())
            .await
    }

    /// Whether a reference exists for `fingerprint`
    async fn has_reference(&self, fingerprint: &ContentFingerprint) -> Result<bool> {
        Ok(self
            .get_meta(&reference_meta_key(fingerprint))
            .await?
            .is_some())
    }

    /// Stored key recorded for `fingerprint`
    async fn get_reference(
        &self,
        fingerprint: &ContentFingerprint,
    ) -> Result<Option<StoredObjectKey>> {
        match self.get_meta(&reference_meta_key(fingerprint)).await? {
            None => Ok(None),
            Some(bytes) => {
                let key = String::from_utf8(bytes).map_err(|_| {
                    Error::integrity(format!("reference for {} is not UTF-8", fingerprint))
                })?;
                StoredObjectKey::new(key).map(Some)
            }
        }
    }
}
