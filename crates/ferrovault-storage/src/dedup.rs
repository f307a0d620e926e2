//! Deduplication index over a provider's reference namespace
//!
//! Lookups and inserts go straight to the provider's reference metadata, so
//! the index survives across runs. [`DedupIndex::claim`] adds a per-fingerprint
//! async lock: while a guard is held no other task in this process can claim
//! the same fingerprint, which turns "has, then write, then put" into a single
//! critical section. Across processes, `put_meta_if_absent` still guarantees a
//! single reference.

use crate::provider::StorageProvider;
use ferrovault_types::{ContentFingerprint, Result, StoredObjectKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type LockTable = Mutex<HashMap<ContentFingerprint, Arc<tokio::sync::Mutex<()>>>>;

/// Fingerprint to stored-key index backed by a storage provider
pub struct DedupIndex {
    provider: Arc<dyn StorageProvider>,
    locks: Arc<LockTable>,
}

impl fmt::Debug for DedupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupIndex")
            .field("provider", &self.provider.name())
            .field("claimed", &self.claimed_count())
            .finish()
    }
}

impl DedupIndex {
    /// Index over `provider`'s references
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether content with `fingerprint` is already stored
    pub async fn has(&self, fingerprint: &ContentFingerprint) -> Result<bool> {
        self.provider.has_reference(fingerprint).await
    }

    /// Record `fingerprint` as stored under `key`; `false` if already recorded
    pub async fn put(&self, fingerprint: &ContentFingerprint, key: &StoredObjectKey) -> Result<bool> {
        let created = self.provider.put_reference(fingerprint, key).await?;
        if !created {
            debug!("Reference for {} already present", fingerprint.short());
        }
        Ok(created)
    }

    /// Key recorded for `fingerprint`
    pub async fn lookup(&self, fingerprint: &ContentFingerprint) -> Result<Option<StoredObjectKey>> {
        self.provider.get_reference(fingerprint).await
    }

    /// Wait for exclusive use of `fingerprint` within this process
    pub async fn claim(&self, fingerprint: &ContentFingerprint) -> FingerprintGuard {
        let lock = {
            let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(fingerprint.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        FingerprintGuard {
            fingerprint: fingerprint.clone(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of fingerprints currently claimed or awaited
    pub fn claimed_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Provider this index reads and writes
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }
}

/// Exclusive claim on one fingerprint, released on drop
pub struct FingerprintGuard {
    fingerprint: ContentFingerprint,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl FingerprintGuard {
    /// Fingerprint this guard holds
    pub fn fingerprint(&self) -> &ContentFingerprint {
        &self.fingerprint
    }
}

impl fmt::Debug for FingerprintGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintGuard")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl Drop for FingerprintGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table still points at the lock: nobody holds or awaits it.
        if table
            .get(&self.fingerprint)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.fingerprint);
        }
    }
}
