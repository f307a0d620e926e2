//! Local filesystem storage provider

use crate::fs_util;
use crate::layout::StorageLayout;
use crate::provider::StorageProvider;
use async_trait::async_trait;
use ferrovault_types::{Error, Result, StoredObjectKey};
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tracing::debug;

const PROVIDER_NAME: &str = "local";

/// Stores objects as plain files under a root directory
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    layout: StorageLayout,
}

impl LocalStorageProvider {
    /// Open (creating if needed) a provider rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let layout = StorageLayout::new(root);
        layout.ensure().map_err(|e| {
            Error::storage(
                PROVIDER_NAME,
                format!("Cannot prepare {}: {}", layout.root().display(), e),
            )
        })?;
        Ok(Self { layout })
    }

    /// Provider root
    pub fn root(&self) -> &Path {
        self.layout.root()
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn put(
        &self,
        key: &StoredObjectKey,
        data: &mut (dyn AsyncRead + Send + Unpin),
        expected_size: u64,
    ) -> Result<u64> {
        let temp = self.layout.temp_path();
        let written = fs_util::write_temp(PROVIDER_NAME, &temp, data).await?;
        if expected_size > 0 && written != expected_size {
            debug!(
                "Object {} is {} bytes, caller expected {}",
                key, written, expected_size
            );
        }
        fs_util::commit(PROVIDER_NAME, &temp, &self.layout.object_path(key)).await?;
        debug!("Stored {} ({} bytes)", key, written);
        Ok(written)
    }

    async fn get(&self, key: &StoredObjectKey) -> Result<Option<Vec<u8>>> {
        fs_util::read_optional(PROVIDER_NAME, &self.layout.object_path(key)).await
    }

    async fn exists(&self, key: &StoredObjectKey) -> Result<bool> {
        fs_util::file_exists(PROVIDER_NAME, &self.layout.object_path(key)).await
    }

    async fn put_meta(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let target = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::write_bytes_atomic(PROVIDER_NAME, &self.layout.temp_path(), &target, bytes).await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::read_optional(PROVIDER_NAME, &path).await
    }

    async fn put_meta_if_absent(&self, key: &str, bytes: &[u8]) -> Result<bool> {
        let target = self.layout.meta_path(PROVIDER_NAME, key)?;
        fs_util::create_if_absent(PROVIDER_NAME, &self.layout.temp_path(), &target, bytes).await
    }
}
