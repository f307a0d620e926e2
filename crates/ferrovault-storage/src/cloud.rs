//! Mock cloud object store
//!
//! A second local directory tree that behaves like a remote bucket: uploads
//! carry a declared size which must match the bytes received, and every
//! request can be delayed by a fixed simulated latency.

use crate::fs_util;
use crate::layout::StorageLayout;
use crate::provider::StorageProvider;
use async_trait::async_trait;
use ferrovault_types::{Error, Result, StoredObjectKey};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

const PROVIDER_NAME: &str = "mock-cloud";

/// Local stand-in for a remote object store
#[derive(Debug, Clone)]
pub struct MockCloudProvider {
    layout: StorageLayout,
    bucket: String,
    latency: Option<Duration>,
}

impl MockCloudProvider {
    /// Open (creating if needed) a bucket directory at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let layout = StorageLayout::new(root);
        layout.ensure().map_err(|e| {
            Error::storage(
                PROVIDER_NAME,
                format!("Cannot prepare bucket {}: {}", layout.root().display(), e),
            )
        })?;
        let bucket = layout
            .root()
            .file_name()
            .map_or_else(|| "bucket".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            layout,
            bucket,
            latency: None,
        })
    }

    /// Delay every request by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = (!latency.is_zero()).then_some(latency);
        self
    }

    /// Bucket name derived from the root directory
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Bucket root
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl StorageProvider for MockCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn put(
        &self,
        key: &StoredObjectKey,
        data: &mut (dyn AsyncRead + Send + Unpin),
        expected_size: u64,
    ) -> Result<u64> {
        self.round_trip().await;
        let temp = self.layout.temp_path();
        let received = fs_util::write_temp(PROVIDER_NAME, &temp, data).await?;
        if expected_size > 0 && received != expected_size {
            fs_util::abandon(&temp).await;
            warn!(
                "Rejected upload of {}: declared {} bytes, received {}",
                key, expected_size, received
            );
            return Err(Error::storage(
                PROVIDER_NAME,
                format!(
                    "Content-Length mismatch for {}: declared {}, received {}",
                    key, expected_size, received
                ),
            ));
        }
        fs_util::commit(PROVIDER_NAME, &temp, &self.layout.object_path(key)).await?;
        debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, received);
        Ok(received)
    }

    async fn get(&self, key: &StoredObjectKey) -> Result<Option<Vec<u8>>> {
        self.round_trip().await;
        fs_util::read_optional(PROVIDER_NAME, &self.layout.object_path(key)).await
    }

    async fn exists(&self, key: &StoredObjectKey) -> Result<bool> {
        self.round_trip().await;
        fs_util::file_exists(PROVIDER_NAME, &self.layout.object_path(key)).await
    }

    async fn put_meta(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.round_trip().await;
        let target = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::write_bytes_atomic(PROVIDER_NAME, &self.layout.temp_path(), &target, bytes).await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.round_trip().await;
        let path = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::read_optional(PROVIDER_NAME, &path).await
    }

    async fn put_meta_if_absent(&self, key: &str, bytes: &[u8]) -> Result<bool> {
        self.round_trip().await;
        let target = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::create_if_absent(PROVIDER_NAME, &self.layout.temp_path(), &target, bytes).await
    }
}
