//! Stored payload envelope
//!
//! ```text
//! +--------+---------+-------------+-------+------------------------------+
//! | "FVLT" | version | compression | flags | body                         |
//! | 4 B    | 1 B     | 1 B         | 1 B   | compressed, then encrypted   |
//! +--------+---------+-------------+-------+------------------------------+
//! ```
//!
//! Flag bit 0 marks an encrypted body, which is `nonce || ciphertext || tag`.

use ferrovault_compression::{streaming::decompress_with, Compressor};
use ferrovault_crypto::Cipher;
use ferrovault_types::{CompressionAlgorithm, Error, Result};
use std::io::{Read, Write};

/// Envelope magic bytes
pub const MAGIC: [u8; 4] = *b"FVLT";

/// Current envelope version
pub const VERSION: u8 = 1;

/// Envelope header length
pub const HEADER_LEN: usize = 7;

const FLAG_ENCRYPTED: u8 = 0b0000_0001;

/// Decoded envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Compression applied before encryption
    pub compression: CompressionAlgorithm,
    /// Whether the body is encrypted
    pub encrypted: bool,
}

impl PayloadHeader {
    fn encode(self) -> [u8; HEADER_LEN] {
        let flags = if self.encrypted { FLAG_ENCRYPTED } else { 0 };
        [
            MAGIC[0],
            MAGIC[1],
            MAGIC[2],
            MAGIC[3],
            VERSION,
            self.compression.id(),
            flags,
        ]
    }

    /// Parse the header at the start of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
            return Err(Error::integrity("payload does not start with a FerroVault header"));
        }
        if bytes[4] != VERSION {
            return Err(Error::integrity(format!(
                "unsupported payload version {}",
                bytes[4]
            )));
        }
        let compression = CompressionAlgorithm::from_id(bytes[5]).ok_or_else(|| {
            Error::integrity(format!("unknown compression id {}", bytes[5]))
        })?;
        if bytes[6] & !FLAG_ENCRYPTED != 0 {
            return Err(Error::integrity(format!("unknown payload flags {:#04x}", bytes[6])));
        }
        Ok(Self {
            compression,
            encrypted: bytes[6] & FLAG_ENCRYPTED != 0,
        })
    }
}

/// Compress then optionally encrypt everything from `reader` into an envelope
///
/// The whole envelope is built in memory since the cipher seals the body in one shot.
pub fn seal<R: Read>(reader: R, compressor: &Compressor, cipher: Option<&Cipher>) -> Result<Vec<u8>> {
    let header = PayloadHeader {
        compression: compressor.algorithm(),
        encrypted: cipher.is_some(),
    };

    let mut compressed = Vec::new();
    compressor.compress(reader, &mut compressed)?;

    let body = match cipher {
        Some(cipher) => cipher.encrypt(&compressed)?,
        None => compressed,
    };

    let mut payload = Vec::with_capacity(HEADER_LEN + body.len());
    payload.extend_from_slice(&header.encode());
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Decode an envelope, writing the original content to `writer`
pub fn open<W: Write>(payload: &[u8], cipher: Option<&Cipher>, writer: W) -> Result<u64> {
    let header = PayloadHeader::decode(payload)?;
    let body = &payload[HEADER_LEN..];

    let decrypted;
    let compressed = if header.encrypted {
        let cipher = cipher.ok_or_else(|| {
            Error::config("payload is encrypted but no encryption key was supplied")
        })?;
        decrypted = cipher.decrypt(body)?;
        decrypted.as_slice()
    } else {
        body
    };

    decompress_with(header.compression, compressed, writer)
}
