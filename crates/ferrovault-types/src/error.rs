//! Error types and handling for FerroVault
//!
//! Every fallible operation in the workspace reports one of the variants below.
//! Cryptographic failures are always fatal for the object they concern; I/O and
//! storage failures are scoped to a single file by the backup pipeline.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - the affected object must be abandoned
    High,
    /// Critical severity - the whole run cannot proceed
    Critical,
}

/// Main error type for FerroVault operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Reading or writing a file or stream failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// A storage provider could not complete an operation
    #[error("Storage failure in '{provider}': {message}")]
    Storage {
        /// Name of the provider that failed
        provider: String,
        /// Error message describing the failure
        message: String,
    },

    /// Ciphertext was tampered with, truncated, or decrypted with the wrong key
    #[error("Authentication failed: ciphertext was modified or the key is wrong")]
    AuthenticationFailure,

    /// Encryption key has a length the cipher does not accept
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Accepted key lengths
        expected: String,
        /// Length of the supplied key
        actual: usize,
    },

    /// A source tree could not be listed
    #[error("Cannot enumerate '{path}': {message}")]
    Enumeration {
        /// Root that could not be enumerated
        path: PathBuf,
        /// Error message describing the failure
        message: String,
    },

    /// Restored content does not match its recorded fingerprint or envelope
    #[error("Integrity check failed: {message}")]
    Integrity {
        /// Error message describing the mismatch
        message: String,
    },

    /// Compression or decompression failed
    #[error("Compression error: {message}")]
    Compression {
        /// Error message describing the compression issue
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Synchronization error
    #[error("Synchronization error: {message}")]
    Sync {
        /// Error message describing the synchronization issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Storage provider errors
    Storage,
    /// Cryptographic errors (authentication and key length)
    Crypto,
    /// Source enumeration errors
    Enumeration,
    /// Integrity errors
    Integrity,
    /// Compression errors
    Compression,
    /// Configuration errors
    Config,
    /// Synchronization errors
    Sync,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::AuthenticationFailure | Self::InvalidKeyLength { .. } => ErrorKind::Crypto,
            Self::Enumeration { .. } => ErrorKind::Enumeration,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Compression { .. } => ErrorKind::Compression,
            Self::Config { .. } => ErrorKind::Config,
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::Storage { .. } => ErrorSeverity::Medium,
            Self::AuthenticationFailure | Self::InvalidKeyLength { .. } => ErrorSeverity::High,
            Self::Enumeration { .. } => ErrorSeverity::Critical,
            Self::Integrity { .. } => ErrorSeverity::High,
            Self::Compression { .. } => ErrorSeverity::Medium,
            Self::Config { .. } => ErrorSeverity::High,
            Self::Sync { .. } => ErrorSeverity::Medium,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { message } | Self::Storage { message, .. } => {
                message.contains("Interrupted")
                    || message.contains("WouldBlock")
                    || message.contains("timed out")
            }
            Self::Sync { .. } | Self::Other { .. } => true,
            Self::AuthenticationFailure
            | Self::InvalidKeyLength { .. }
            | Self::Enumeration { .. }
            | Self::Integrity { .. }
            | Self::Compression { .. }
            | Self::Config { .. }
            | Self::Cancelled => false,
        }
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new storage error for the named provider
    pub fn storage<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::Storage {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new enumeration error
    pub fn enumeration<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Enumeration {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new integrity error
    pub fn integrity<S: Into<String>>(message: S) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(message: S) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new sync error
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
