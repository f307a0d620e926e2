//! Atomic file primitives shared by the filesystem-backed providers

use ferrovault_types::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

fn storage_err(provider: &str, action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::storage(
        provider,
        format!("Failed to {} {}: {}", action, path.display(), e),
    )
}

async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::debug!("Could not remove temp file {}: {}", temp.display(), e);
        }
    }
}

async fn ensure_parent(provider: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_err(provider, "create directory", parent, &e))?;
    }
    Ok(())
}

/// Stream `data` into `temp`, fsync it, and return the byte count
pub async fn write_temp(
    provider: &str,
    temp: &Path,
    data: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<u64> {
    ensure_parent(provider, temp).await?;
    let mut file = fs::File::create(temp)
        .await
        .map_err(|e| storage_err(provider, "create", temp, &e))?;

    let result = async {
        let written = tokio::io::copy(data, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<u64, std::io::Error>(written)
    }
    .await;
    drop(file);

    match result {
        Ok(written) => Ok(written),
        Err(e) => {
            discard(temp).await;
            Err(storage_err(provider, "write", temp, &e))
        }
    }
}

/// Move a completed temp file over `target`, replacing any existing file
pub async fn commit(provider: &str, temp: &Path, target: &Path) -> Result<()> {
    if let Err(e) = ensure_parent(provider, target).await {
        discard(temp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(temp, target).await {
        discard(temp).await;
        return Err(storage_err(provider, "rename into", target, &e));
    }
    Ok(())
}

/// Remove a temp file that will not be committed
pub async fn abandon(temp: &Path) {
    discard(temp).await;
}

/// Atomically replace `target` with `bytes`
pub async fn write_bytes_atomic(
    provider: &str,
    temp: &Path,
    target: &Path,
    bytes: &[u8],
) -> Result<()> {
    let mut reader = bytes;
    write_temp(provider, temp, &mut reader).await?;
    commit(provider, temp, target).await
}

/// Atomically create `target` with `bytes` unless it already exists
///
/// Returns `true` when this call created the file. The hard link fails with
/// `AlreadyExists` if another writer got there first.
pub async fn create_if_absent(
    provider: &str,
    temp: &Path,
    target: &Path,
    bytes: &[u8],
) -> Result<bool> {
    let mut reader = bytes;
    write_temp(provider, temp, &mut reader).await?;
    if let Err(e) = ensure_parent(provider, target).await {
        discard(temp).await;
        return Err(e);
    }
    let linked = fs::hard_link(temp, target).await;
    discard(temp).await;
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(storage_err(provider, "link", target, &e)),
    }
}

/// Read a whole file, mapping a missing file to `None`
pub async fn read_optional(provider: &str, path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(storage_err(provider, "read", path, &e)),
    }
}

/// Whether a regular file exists at `path`
pub async fn file_exists(provider: &str, path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(storage_err(provider, "stat", path, &e)),
    }
}
