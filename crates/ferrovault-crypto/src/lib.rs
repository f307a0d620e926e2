//! Content fingerprinting and authenticated encryption for FerroVault
//!
//! - [`ContentHasher`] streams a reader through SHA-256 in bounded chunks and
//!   yields a [`ContentFingerprint`](ferrovault_types::ContentFingerprint).
//! - [`Cipher`] seals payloads with AES-GCM, prepending a fresh random nonce.
//!
//! # Examples
//!
//! ```rust
//! use ferrovault_crypto::{Cipher, ContentHasher};
//!
//! let fingerprint = ContentHasher::fingerprint_bytes(b"hello");
//! assert_eq!(fingerprint.as_str().len(), 64);
//!
//! let cipher = Cipher::new(&[7u8; 32]).unwrap();
//! let sealed = cipher.encrypt(b"hello").unwrap();
//! assert_eq!(cipher.decrypt(&sealed).unwrap(), b"hello");
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cipher;
pub mod hasher;

pub use cipher::{decrypt, encrypt, parse_key_hex, Cipher, KEY_LENGTHS, NONCE_LEN, TAG_LEN};
pub use hasher::{ContentHasher, DEFAULT_CHUNK_SIZE};
