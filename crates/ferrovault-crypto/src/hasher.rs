//! Streaming SHA-256 content fingerprints

use ferrovault_types::{ContentFingerprint, Error, Result};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Default read size for fingerprinting (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Computes content fingerprints by streaming input in fixed-size chunks
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ContentHasher {
    /// Create a hasher with the default chunk size
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher reading `chunk_size` bytes at a time
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Chunk size used for reads
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fingerprint a blocking reader, consuming it to the end
    pub fn fingerprint<R: Read>(&self, mut reader: R) -> Result<ContentFingerprint> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buffer[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(format!("Failed to read content: {}", e))),
            }
        }
        Ok(ContentFingerprint::from_digest(&hasher.finalize()))
    }

    /// Fingerprint an async reader, consuming it to the end
    pub async fn fingerprint_async<R>(&self, mut reader: R) -> Result<ContentFingerprint>
    where
        R: AsyncRead + Unpin,
    {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io(format!("Failed to read content: {}", e)))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(ContentFingerprint::from_digest(&hasher.finalize()))
    }

    /// Fingerprint the file at `path`
    pub async fn fingerprint_file(&self, path: &Path) -> Result<ContentFingerprint> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            Error::io(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let fingerprint = self.fingerprint_async(file).await?;
        debug!("Fingerprinted {} as {}", path.display(), fingerprint.short());
        Ok(fingerprint)
    }

    /// Fingerprint an in-memory buffer
    pub fn fingerprint_bytes(data: &[u8]) -> ContentFingerprint {
        ContentFingerprint::from_digest(&Sha256::digest(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[rstest]
    #[case(b"hello".as_slice(), HELLO_SHA256)]
    #[case(b"".as_slice(), EMPTY_SHA256)]
    fn test_known_digests(#[case] input: &[u8], #[case] expected: &str) {
        let fp = ContentHasher::new().fingerprint(Cursor::new(input)).unwrap();
        assert_eq!(fp.as_str(), expected);
        assert_eq!(ContentHasher::fingerprint_bytes(input).as_str(), expected);
    }

    proptest! {
        #[test]
        fn test_fingerprint_independent_of_chunk_size(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            chunk in 1usize..1024,
        ) {
            let small = ContentHasher::with_chunk_size(chunk)
                .fingerprint(Cursor::new(&data))
                .unwrap();
            let default = ContentHasher::new().fingerprint(Cursor::new(&data)).unwrap();
            prop_assert_eq!(small, default);
        }
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(ContentHasher::with_chunk_size(0).chunk_size(), 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_read_failure_is_io_error() {
        let err = ContentHasher::new().fingerprint(FailingReader).unwrap_err();
        assert_eq!(err.kind(), ferrovault_types::ErrorKind::Io);
        assert!(err.to_string().contains("device gone"));
    }

    #[tokio::test]
    async fn test_async_matches_blocking() {
        let data = vec![42u8; 200_000];
        let blocking = ContentHasher::new().fingerprint(Cursor::new(&data)).unwrap();
        let asynchronous = ContentHasher::with_chunk_size(4096)
            .fingerprint_async(data.as_slice())
            .await
            .unwrap();
        assert_eq!(blocking, asynchronous);
    }

    #[tokio::test]
    async fn test_fingerprint_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello").unwrap();
        let fp = ContentHasher::new().fingerprint_file(file.path()).await.unwrap();
        assert_eq!(fp.as_str(), HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_fingerprint_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContentHasher::new()
            .fingerprint_file(&dir.path().join("missing"))
            .await;
        assert!(result.is_err());
    }
}
