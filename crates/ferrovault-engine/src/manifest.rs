//! Path manifest of the latest backup run

use chrono::{DateTime, Utc};
use ferrovault_storage::StorageProvider;
use ferrovault_types::{ContentFingerprint, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Metadata key holding the manifest
pub const MANIFEST_META_KEY: &str = "backup-manifest.json";

/// Where one source file's content is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Fingerprint of the file content
    pub fingerprint: ContentFingerprint,
    /// Size of the original file
    pub size: u64,
}

/// Map of relative source paths to stored content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Source root of the run
    pub source: PathBuf,
    /// When the run finished
    pub created_at: DateTime<Utc>,
    /// Entries keyed by `/`-separated relative path
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl BackupManifest {
    /// Empty manifest for a run over `source`
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: source.into(),
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Record a file under its relative path
    pub fn insert(&mut self, relative: &Path, fingerprint: ContentFingerprint, size: u64) {
        self.entries
            .insert(manifest_path(relative), ManifestEntry { fingerprint, size });
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store the manifest, replacing the previous one
    pub async fn store(&self, provider: &dyn StorageProvider) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::other(format!("Failed to serialize manifest: {}", e)))?;
        provider.put_meta(MANIFEST_META_KEY, &bytes).await
    }

    /// Load the manifest of the latest run, if any
    pub async fn load(provider: &dyn StorageProvider) -> Result<Option<Self>> {
        match provider.get_meta(MANIFEST_META_KEY).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::integrity(format!("Manifest is unreadable: {}", e))),
        }
    }
}

fn manifest_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Turn a manifest key back into a relative path, rejecting anything that
/// would escape the restore root
pub fn relative_path(entry_key: &str) -> Result<PathBuf> {
    let path: PathBuf = entry_key.split('/').collect();
    let safe = !entry_key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(path)
    } else {
        Err(Error::integrity(format!(
            "manifest entry has an unsafe path: {}",
            entry_key
        )))
    }
}
