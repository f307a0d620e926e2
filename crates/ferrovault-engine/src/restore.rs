//! Reading backed-up content back out of a provider

use crate::manifest::{relative_path, BackupManifest};
use crate::payload;
use ferrovault_crypto::{Cipher, ContentHasher};
use ferrovault_storage::StorageProvider;
use ferrovault_types::{ContentFingerprint, Error, Result, StoredObjectKey};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Outcome of restoring a whole tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreResult {
    /// Files written to the destination
    pub files_restored: u64,
    /// Bytes of original content written
    pub bytes_restored: u64,
    /// Entries that could not be restored, with the error text
    pub failures: Vec<(PathBuf, String)>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RestoreResult {
    /// Whether every entry was restored
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decodes stored payloads and verifies them against their fingerprint
#[derive(Debug, Clone)]
pub struct Restorer {
    provider: Arc<dyn StorageProvider>,
    cipher: Option<Cipher>,
}

impl Restorer {
    /// Restorer reading from `provider`, decrypting with `cipher` when given
    pub fn new(provider: Arc<dyn StorageProvider>, cipher: Option<Cipher>) -> Self {
        Self { provider, cipher }
    }

    /// Original content stored for `fingerprint`
    pub async fn restore_bytes(&self, fingerprint: &ContentFingerprint) -> Result<Vec<u8>> {
        // Runs without deduplication store objects but no reference
        let key = match self.provider.get_reference(fingerprint).await? {
            Some(key) => key,
            None => StoredObjectKey::for_fingerprint(fingerprint),
        };

        let stored = self.provider.get(&key).await?.ok_or_else(|| {
            Error::storage(
                self.provider.name(),
                format!("no object stored for {}", fingerprint),
            )
        })?;

        let mut content = Vec::new();
        payload::open(&stored, self.cipher.as_ref(), &mut content)?;

        let actual = ContentHasher::fingerprint_bytes(&content);
        if &actual != fingerprint {
            return Err(Error::integrity(format!(
                "content of {} hashes to {}",
                fingerprint.short(),
                actual.short()
            )));
        }
        Ok(content)
    }

    /// Write the original content for `fingerprint` to `writer`
    pub async fn restore_object<W>(&self, fingerprint: &ContentFingerprint, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let content = self.restore_bytes(fingerprint).await?;
        writer.write_all(&content).await?;
        writer.flush().await?;
        Ok(content.len() as u64)
    }

    /// Restore every file of the latest manifest under `destination`
    pub async fn restore_tree(&self, destination: &Path) -> Result<RestoreResult> {
        let start = Instant::now();
        let manifest = BackupManifest::load(self.provider.as_ref())
            .await?
            .ok_or_else(|| {
                Error::other(format!(
                    "no backup manifest found in '{}'",
                    self.provider.name()
                ))
            })?;

        info!(
            "Restoring {} files from {} into {}",
            manifest.len(),
            manifest.source.display(),
            destination.display()
        );
        tokio::fs::create_dir_all(destination).await?;

        let mut result = RestoreResult::default();
        for (entry_key, entry) in &manifest.entries {
            let outcome = match relative_path(entry_key) {
                Ok(relative) => {
                    let target = destination.join(&relative);
                    self.restore_file(&entry.fingerprint, &target)
                        .await
                        .map(|n| (relative, n))
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok((relative, n)) => {
                    debug!("Restored {} ({} bytes)", relative.display(), n);
                    result.files_restored += 1;
                    result.bytes_restored += n;
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", entry_key, e);
                    result.failures.push((PathBuf::from(entry_key), e.to_string()));
                }
            }
        }

        result.duration = start.elapsed();
        info!(
            "Restore finished: {} restored, {} failed",
            result.files_restored,
            result.failures.len()
        );
        Ok(result)
    }

    async fn restore_file(&self, fingerprint: &ContentFingerprint, target: &Path) -> Result<u64> {
        let content = self.restore_bytes(fingerprint).await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, &content).await?;
        Ok(content.len() as u64)
    }
}
