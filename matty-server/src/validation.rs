//! Input validation for untrusted data.
//!
//! All user-supplied input MUST be validated before use.
//! This module provides validators for owners, design ids and design bodies.

use matty_core::{DesignId, DesignPayload, DesignUpdate, Element, ElementKind};
use thiserror::Error;

/// Maximum length for owner IDs.
pub const MAX_OWNER_ID_LEN: usize = 128;
/// Maximum length for design IDs (UUIDs are 36 chars).
pub const MAX_DESIGN_ID_LEN: usize = 64;
/// Maximum design title length.
pub const MAX_TITLE_LEN: usize = 256;
/// Maximum text content length in elements.
pub const MAX_TEXT_CONTENT_LEN: usize = 1_048_576; // 1MB
/// Maximum length of an image `src`, data URIs included.
pub const MAX_IMAGE_SRC_LEN: usize = 16 * 1_048_576; // 16MB
/// Maximum elements per design.
pub const MAX_ELEMENTS_PER_DESIGN: usize = 10_000;

/// Validation error types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Owner ID exceeds maximum length.
    #[error("owner id too long (max {MAX_OWNER_ID_LEN} chars)")]
    OwnerIdTooLong,
    /// Owner ID is empty or contains invalid characters.
    #[error("owner id contains invalid characters")]
    OwnerIdInvalidChars,
    /// Design ID is not a UUID.
    #[error("Invalid design id")]
    InvalidDesignId,
    /// Title exceeds maximum length.
    #[error("title too long (max {MAX_TITLE_LEN} chars)")]
    TitleTooLong,
    /// Text content exceeds maximum length.
    #[error("text content too long (max {MAX_TEXT_CONTENT_LEN} bytes)")]
    TextContentTooLong,
    /// Image source exceeds maximum length.
    #[error("image src too long (max {MAX_IMAGE_SRC_LEN} bytes)")]
    ImageSrcTooLong,
    /// Too many elements in design.
    #[error("too many elements (max {MAX_ELEMENTS_PER_DESIGN})")]
    TooManyElements,
}

impl ValidationError {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OwnerIdTooLong | Self::OwnerIdInvalidChars => "owner_id",
            Self::InvalidDesignId => "design_id",
            Self::TitleTooLong => "title",
            Self::TextContentTooLong => "text_content",
            Self::ImageSrcTooLong => "image_src",
            Self::TooManyElements => "element_count",
        }
    }
}

/// Check if a character is valid for owner IDs.
fn is_valid_owner_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')
}

/// Validate an owner ID.
///
/// Valid owner IDs:
/// - 1-128 characters
/// - Alphanumeric, hyphen, underscore, dot or `@` only
///
/// # Errors
///
/// Returns [`ValidationError::OwnerIdTooLong`] if the ID exceeds 128 characters.
/// Returns [`ValidationError::OwnerIdInvalidChars`] if the ID is empty or contains invalid characters.
pub fn validate_owner_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_OWNER_ID_LEN {
        return Err(ValidationError::OwnerIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_owner_char) {
        return Err(ValidationError::OwnerIdInvalidChars);
    }
    Ok(())
}

/// Validate and parse a design ID from a path segment.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDesignId`] if the segment is not a UUID.
pub fn validate_design_id(id: &str) -> Result<DesignId, ValidationError> {
    if id.len() > MAX_DESIGN_ID_LEN {
        return Err(ValidationError::InvalidDesignId);
    }
    DesignId::parse(id).map_err(|_| ValidationError::InvalidDesignId)
}

/// Validate a design title.
///
/// # Errors
///
/// Returns [`ValidationError::TitleTooLong`] if the title exceeds 256 characters.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Validate text content length.
///
/// # Errors
///
/// Returns [`ValidationError::TextContentTooLong`] if the text exceeds 1MB.
pub fn validate_text_content(text: &str) -> Result<(), ValidationError> {
    if text.len() > MAX_TEXT_CONTENT_LEN {
        return Err(ValidationError::TextContentTooLong);
    }
    Ok(())
}

/// Validate image source length.
///
/// # Errors
///
/// Returns [`ValidationError::ImageSrcTooLong`] if the source exceeds 16MB.
pub fn validate_image_src(src: &str) -> Result<(), ValidationError> {
    if src.len() > MAX_IMAGE_SRC_LEN {
        return Err(ValidationError::ImageSrcTooLong);
    }
    Ok(())
}

/// Validate element count in a design.
///
/// # Errors
///
/// Returns [`ValidationError::TooManyElements`] if the count exceeds the limit.
pub fn validate_element_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_ELEMENTS_PER_DESIGN {
        return Err(ValidationError::TooManyElements);
    }
    Ok(())
}

/// Validate a list of elements: count, text lengths and image sources.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_elements(elements: &[Element]) -> Result<(), ValidationError> {
    validate_element_count(elements.len())?;
    for element in elements {
        match &element.kind {
            ElementKind::Text { content, .. } => validate_text_content(content)?,
            ElementKind::Image { src, .. } => validate_image_src(src)?,
            ElementKind::Rectangle { .. } | ElementKind::Circle { .. } => {}
        }
    }
    Ok(())
}

/// Validate a create request body.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_payload(payload: &DesignPayload) -> Result<(), ValidationError> {
    validate_title(&payload.title)?;
    validate_elements(&payload.elements)
}

/// Validate an update request body. Absent fields are not checked.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_update(update: &DesignUpdate) -> Result<(), ValidationError> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(elements) = &update.elements {
        validate_elements(elements)?;
    }
    if let Some(url) = &update.thumbnail_url {
        validate_image_src(url)?;
    }
    Ok(())
}
