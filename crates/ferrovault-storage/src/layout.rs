//! Mapping of keys onto a provider's directory tree

use ferrovault_types::{Error, Result, StoredObjectKey, META_DIR, TEMP_DIR};
use std::path::{Path, PathBuf};

/// Directory layout shared by the filesystem-backed providers
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Provider root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding metadata entries
    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    /// Directory holding in-flight writes
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Create the root, metadata and temp directories
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.meta_dir())?;
        std::fs::create_dir_all(self.temp_dir())
    }

    /// Path of an object
    pub fn object_path(&self, key: &StoredObjectKey) -> PathBuf {
        self.root.join(key.to_relative_path())
    }

    /// Path of a metadata entry, rejecting keys that would leave `_meta/`
    pub fn meta_path(&self, provider: &str, meta_key: &str) -> Result<PathBuf> {
        if meta_key.is_empty()
            || meta_key == "."
            || meta_key == ".."
            || meta_key.contains(['/', '\\'])
        {
            return Err(Error::storage(
                provider,
                format!("invalid metadata key: {:?}", meta_key),
            ));
        }
        Ok(self.meta_dir().join(meta_key))
    }

    /// Fresh unique path inside the temp directory
    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir()
            .join(format!("{}.part", uuid::Uuid::new_v4().simple()))
    }
}
