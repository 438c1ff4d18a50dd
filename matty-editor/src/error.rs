//! Editor error types.

use matty_core::StoreError;
use matty_renderer::RenderError;
use thiserror::Error;

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors surfaced by the editor.
///
/// Editing intents never fail; only persistence and rendering collaborators
/// can.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The design repository rejected or failed the request.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    /// Surface allocation or encoding failed.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}
