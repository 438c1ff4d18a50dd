//! Error types for design operations.
//!
//! Document, history and hit-test operations are total and never fail; these
//! errors cover the edges where data enters or leaves the model.

use thiserror::Error;

/// Result type for design operations.
pub type DesignResult<T> = Result<T, DesignError>;

/// Errors that can occur when importing or exporting design data.
#[derive(Debug, Error)]
pub enum DesignError {
    /// Design serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A design identifier could not be parsed.
    #[error("Invalid design id: {0}")]
    InvalidId(String),
}
