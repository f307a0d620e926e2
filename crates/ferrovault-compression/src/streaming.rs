//! Streaming compression and decompression
//!
//! Moves data from a reader to a writer without holding the whole input in
//! memory. Used by the backup pipeline (file to payload buffer) and by restore
//! (payload body to destination).

use ferrovault_types::{CompressionAlgorithm, CompressionLevel, Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use tracing::debug;

/// Buffer size for streaming copies (64KB)
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Writer adapter that counts bytes passed through it
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn io_failure(stage: &str, error: &io::Error) -> Error {
    Error::io(format!("{} failed: {}", stage, error))
}

/// Streaming compressor bound to one algorithm and level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
        }
    }
}

impl Compressor {
    /// Create a compressor, validating `level` for `algorithm`
    pub fn new(algorithm: CompressionAlgorithm, level: u8) -> Result<Self> {
        let level = CompressionLevel::new(algorithm, level).map_err(Error::compression)?;
        Ok(Self { level })
    }

    /// Create a compressor from an already validated level
    pub fn from_level(level: CompressionLevel) -> Self {
        Self { level }
    }

    /// Compressor that passes bytes through unchanged
    pub fn passthrough() -> Self {
        Self::from_level(CompressionLevel::default_for(CompressionAlgorithm::None))
    }

    /// Algorithm in use
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.level.algorithm()
    }

    /// Level in use
    pub fn level(&self) -> u8 {
        self.level.get()
    }

    /// Compress everything from `reader` into `writer`, returning bytes written
    pub fn compress<R: Read, W: Write>(&self, mut reader: R, writer: W) -> Result<u64> {
        let mut out = CountingWriter {
            inner: writer,
            written: 0,
        };
        match self.algorithm() {
            CompressionAlgorithm::None => {
                io::copy(&mut reader, &mut out).map_err(|e| io_failure("Copy", &e))?;
            }
            CompressionAlgorithm::Zstd => {
                zstd::stream::copy_encode(reader, &mut out, i32::from(self.level()))
                    .map_err(|e| io_failure("Zstd compression", &e))?;
            }
            CompressionAlgorithm::Gzip => {
                let mut encoder =
                    GzEncoder::new(&mut out, flate2::Compression::new(u32::from(self.level())));
                io::copy(&mut reader, &mut encoder)
                    .and_then(|_| encoder.finish().map(|_| ()))
                    .map_err(|e| io_failure("Gzip compression", &e))?;
            }
        }
        out.flush().map_err(|e| io_failure("Flush", &e))?;
        debug!("Compressed with {} into {} bytes", self.algorithm(), out.written);
        Ok(out.written)
    }

    /// Decompress everything from `reader` into `writer`, returning bytes written
    pub fn decompress<R: Read, W: Write>(&self, reader: R, writer: W) -> Result<u64> {
        decompress_with(self.algorithm(), reader, writer)
    }
}

/// Decompress `reader` with `algorithm` into `writer`, returning bytes written
pub fn decompress_with<R: Read, W: Write>(
    algorithm: CompressionAlgorithm,
    mut reader: R,
    writer: W,
) -> Result<u64> {
    let mut out = CountingWriter {
        inner: writer,
        written: 0,
    };
    match algorithm {
        CompressionAlgorithm::None => {
            io::copy(&mut reader, &mut out).map_err(|e| io_failure("Copy", &e))?;
        }
        CompressionAlgorithm::Zstd => {
            zstd::stream::copy_decode(reader, &mut out)
                .map_err(|e| Error::compression(format!("Zstd decompression failed: {}", e)))?;
        }
        CompressionAlgorithm::Gzip => {
            let mut decoder = GzDecoder::new(reader);
            io::copy(&mut decoder, &mut out)
                .map_err(|e| Error::compression(format!("Gzip decompression failed: {}", e)))?;
        }
    }
    out.flush().map_err(|e| io_failure("Flush", &e))?;
    Ok(out.written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(CompressionAlgorithm::None, 0)]
    #[case(CompressionAlgorithm::Zstd, 3)]
    #[case(CompressionAlgorithm::Zstd, 19)]
    #[case(CompressionAlgorithm::Gzip, 1)]
    #[case(CompressionAlgorithm::Gzip, 9)]
    fn test_stream_roundtrip(#[case] algorithm: CompressionAlgorithm, #[case] level: u8) {
        let compressor = Compressor::new(algorithm, level).unwrap();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();

        let mut packed = Vec::new();
        let written = compressor.compress(data.as_slice(), &mut packed).unwrap();
        assert_eq!(written, packed.len() as u64);

        let mut unpacked = Vec::new();
        let restored = compressor.decompress(packed.as_slice(), &mut unpacked).unwrap();
        assert_eq!(restored, data.len() as u64);
        assert_eq!(unpacked, data);
    }

    #[test]
    fn test_stream_output_is_standard_format() {
        let data = b"interchangeable ".repeat(64);

        let mut zst = Vec::new();
        Compressor::new(CompressionAlgorithm::Zstd, 3)
            .unwrap()
            .compress(data.as_slice(), &mut zst)
            .unwrap();
        assert_eq!(zstd::decode_all(zst.as_slice()).unwrap(), data);

        let mut gz = Vec::new();
        Compressor::new(CompressionAlgorithm::Gzip, 6)
            .unwrap()
            .compress(data.as_slice(), &mut gz)
            .unwrap();
        let mut unpacked = Vec::new();
        GzDecoder::new(gz.as_slice()).read_to_end(&mut unpacked).unwrap();
        assert_eq!(unpacked, data);
    }

    proptest! {
        #[test]
        fn test_roundtrip_any_input(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            id in 0u8..3,
        ) {
            let algorithm = CompressionAlgorithm::from_id(id).unwrap();
            let compressor = Compressor::from_level(CompressionLevel::default_for(algorithm));
            let mut packed = Vec::new();
            compressor.compress(data.as_slice(), &mut packed).unwrap();
            let mut unpacked = Vec::new();
            decompress_with(algorithm, packed.as_slice(), &mut unpacked).unwrap();
            prop_assert_eq!(unpacked, data);
        }
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = Compressor::new(CompressionAlgorithm::Gzip, 12).unwrap_err();
        assert_eq!(err.kind(), ferrovault_types::ErrorKind::Compression);
    }

    #[test]
    fn test_default_is_zstd_level_3() {
        let compressor = Compressor::default();
        assert_eq!(compressor.algorithm(), CompressionAlgorithm::Zstd);
        assert_eq!(compressor.level(), 3);
        assert_eq!(Compressor::passthrough().algorithm(), CompressionAlgorithm::None);
    }

    #[test]
    fn test_empty_input() {
        let compressor = Compressor::default();
        let mut packed = Vec::new();
        compressor.compress(&b""[..], &mut packed).unwrap();
        let mut unpacked = Vec::new();
        assert_eq!(compressor.decompress(packed.as_slice(), &mut unpacked).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_stream_is_compression_error() {
        let mut sink = Vec::new();
        let err = decompress_with(CompressionAlgorithm::Gzip, &b"nope"[..], &mut sink).unwrap_err();
        assert_eq!(err.kind(), ferrovault_types::ErrorKind::Compression);
    }
}
