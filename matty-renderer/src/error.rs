//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering, decoding and export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A raster surface could not be allocated.
    #[error("Surface error: {0}")]
    Surface(String),

    /// An image source could not be read or decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Encoding the rendered output failed.
    #[error("Export failed: {0}")]
    Export(String),
}
