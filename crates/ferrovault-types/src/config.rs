//! Configuration value types for FerroVault
//!
//! Validated newtypes used by run configurations. Each constructor rejects
//! out-of-range values so a built configuration is always usable.

use crate::CompressionAlgorithm;

/// Worker count with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadCount(usize);

impl ThreadCount {
    /// Minimum thread count
    pub const MIN: usize = 1;
    /// Maximum thread count
    pub const MAX: usize = 256;
    /// Default worker count
    pub const DEFAULT: usize = 4;

    /// Create a new thread count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Thread count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Thread count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the thread count value
    pub fn get(self) -> usize {
        self.0
    }

    /// Worker count matching the available cores
    pub fn optimal() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(Self::DEFAULT);
        Self(cpu_count.clamp(Self::MIN, Self::MAX))
    }
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Compression level checked against its algorithm's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionLevel {
    algorithm: CompressionAlgorithm,
    level: u8,
}

impl CompressionLevel {
    /// Create a level for the given algorithm
    pub fn new(algorithm: CompressionAlgorithm, level: u8) -> Result<Self, String> {
        let (min, max) = match algorithm {
            CompressionAlgorithm::None => (0, 0),
            CompressionAlgorithm::Zstd | CompressionAlgorithm::Gzip => (1, algorithm.max_level()),
        };
        if level < min || level > max {
            Err(format!(
                "Compression level {} for {} must be between {} and {}",
                level, algorithm, min, max
            ))
        } else {
            Ok(Self { algorithm, level })
        }
    }

    /// Default level for the algorithm
    pub fn default_for(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            level: algorithm.default_level(),
        }
    }

    /// Algorithm this level applies to
    pub fn algorithm(self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Get the level value
    pub fn get(self) -> u8 {
        self.level
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::default_for(CompressionAlgorithm::default())
    }
}

/// Aggregate write-rate limit in bytes per second, zero meaning unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleRate(u64);

impl ThrottleRate {
    /// No rate limit
    pub const UNBOUNDED: Self = Self(0);

    /// Create a limit of `bytes_per_sec`
    pub fn new(bytes_per_sec: u64) -> Self {
        Self(bytes_per_sec)
    }

    /// Get the limit in bytes per second
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether a limit is in force
    pub fn is_limited(self) -> bool {
        self.0 > 0
    }
}
