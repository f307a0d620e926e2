//! AES-GCM authenticated encryption
//!
//! Sealed output is `nonce || ciphertext || tag`. A 96-bit nonce is drawn from
//! the OS random source for every call, so the same plaintext never produces the
//! same output twice. Any modification of the sealed bytes, truncation, or use
//! of a different key is reported as [`Error::AuthenticationFailure`].

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use ferrovault_types::{Error, Result};
use std::fmt;

/// Nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Accepted key lengths in bytes (AES-128 and AES-256)
pub const KEY_LENGTHS: [usize; 2] = [16, 32];

#[derive(Clone)]
enum Sealer {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// Authenticated cipher bound to a validated key
#[derive(Clone)]
pub struct Cipher {
    sealer: Sealer,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}

fn invalid_key(actual: usize) -> Error {
    Error::InvalidKeyLength {
        expected: "16 or 32".to_string(),
        actual,
    }
}

impl Cipher {
    /// Create a cipher from raw key bytes (16 or 32 bytes)
    pub fn new(key: &[u8]) -> Result<Self> {
        let sealer = match key.len() {
            16 => Sealer::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|_| invalid_key(key.len()))?,
            )),
            32 => Sealer::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|_| invalid_key(key.len()))?,
            )),
            other => return Err(invalid_key(other)),
        };
        Ok(Self { sealer })
    }

    /// Key size in bits
    pub fn key_bits(&self) -> usize {
        match self.sealer {
            Sealer::Aes128(_) => 128,
            Sealer::Aes256(_) => 256,
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext || tag`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let (nonce, sealed) = match &self.sealer {
            Sealer::Aes128(c) => {
                let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
                (nonce, c.encrypt(&nonce, plaintext))
            }
            Sealer::Aes256(c) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                (nonce, c.encrypt(&nonce, plaintext))
            }
        };
        let sealed = sealed.map_err(|_| Error::other("encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt output produced by [`Cipher::encrypt`]
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::AuthenticationFailure);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let nonce = GenericArray::from_slice(nonce);
        let opened = match &self.sealer {
            Sealer::Aes128(c) => c.decrypt(nonce, sealed),
            Sealer::Aes256(c) => c.decrypt(nonce, sealed),
        };
        opened.map_err(|_| Error::AuthenticationFailure)
    }
}

/// Encrypt `plaintext` under `key`
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Cipher::new(key)?.encrypt(plaintext)
}

/// Decrypt `data` under `key`
pub fn decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Cipher::new(key)?.decrypt(data)
}

/// Decode a hex key string and check its length
pub fn parse_key_hex(hex_key: &str) -> Result<Vec<u8>> {
    let key = hex::decode(hex_key.trim())
        .map_err(|e| Error::config(format!("encryption key is not valid hex: {}", e)))?;
    if !KEY_LENGTHS.contains(&key.len()) {
        return Err(invalid_key(key.len()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrovault_types::ErrorKind;
    use proptest::prelude::*;
    use rstest::rstest;

    proptest! {
        #[test]
        fn test_roundtrip_any_plaintext(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            wide in any::<bool>(),
        ) {
            let key = if wide { vec![3u8; 32] } else { vec![5u8; 16] };
            let sealed = encrypt(&data, &key).unwrap();
            prop_assert_eq!(sealed.len(), data.len() + NONCE_LEN + TAG_LEN);
            prop_assert_eq!(decrypt(&sealed, &key).unwrap(), data);
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = Cipher::new(&[1u8; 32]).unwrap();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let sealed = encrypt(b"secret", &[1u8; 32]).unwrap();
        let err = decrypt(&sealed, &[2u8; 32]).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailure));
    }

    #[rstest]
    #[case(0)]
    #[case(NONCE_LEN)]
    #[case(NONCE_LEN + 3)]
    fn test_tampering_fails_authentication(#[case] index: usize) {
        let mut sealed = encrypt(b"secret payload", &[9u8; 16]).unwrap();
        sealed[index] ^= 0x01;
        assert!(matches!(
            decrypt(&sealed, &[9u8; 16]),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncation_fails_authentication() {
        let sealed = encrypt(b"secret payload", &[9u8; 32]).unwrap();
        for len in [0, NONCE_LEN, sealed.len() - 1] {
            assert!(matches!(
                decrypt(&sealed[..len], &[9u8; 32]),
                Err(Error::AuthenticationFailure)
            ));
        }
    }

    #[rstest]
    #[case(0)]
    #[case(15)]
    #[case(24)]
    #[case(33)]
    fn test_invalid_key_length(#[case] len: usize) {
        let err = Cipher::new(&vec![0u8; len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Crypto);
        assert!(matches!(err, Error::InvalidKeyLength { actual, .. } if actual == len));
    }

    #[test]
    fn test_key_bits() {
        assert_eq!(Cipher::new(&[0u8; 16]).unwrap().key_bits(), 128);
        assert_eq!(Cipher::new(&[0u8; 32]).unwrap().key_bits(), 256);
    }

    #[test]
    fn test_parse_key_hex() {
        let key = parse_key_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key.len(), 32);
        assert!(parse_key_hex("zz").is_err());
        assert!(matches!(
            parse_key_hex(&"ab".repeat(10)),
            Err(Error::InvalidKeyLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", Cipher::new(&[0x41u8; 16]).unwrap());
        assert!(debug.contains("128"));
        assert!(!debug.contains("65"));
    }
}
