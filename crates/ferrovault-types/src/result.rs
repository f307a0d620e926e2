//! Result type alias for FerroVault operations

use crate::Error;

/// Result type alias for FerroVault operations
pub type Result<T> = std::result::Result<T, Error>;
