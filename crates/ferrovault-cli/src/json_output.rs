//! JSON output for FerroVault CLI

use serde::Serialize;

/// Operation metadata
#[derive(Debug, Serialize)]
pub struct OperationMetadata {
    /// FerroVault version
    pub version: String,
    /// Operation type
    pub operation: String,
    /// Timestamp when the report was produced
    pub timestamp: String,
}

/// Report wrapping the result of one command
#[derive(Debug, Serialize)]
pub struct JsonReport<'a, T: Serialize> {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Result of the operation
    pub result: &'a T,
}

impl<'a, T: Serialize> JsonReport<'a, T> {
    /// Wrap `result` of `operation`
    pub fn new(operation: &str, result: &'a T) -> Self {
        Self {
            metadata: OperationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                operation: operation.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            result,
        }
    }
}

/// Print `result` as a pretty JSON report
pub fn print_json<T: Serialize>(operation: &str, result: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonReport::new(operation, result))?
    );
    Ok(())
}
