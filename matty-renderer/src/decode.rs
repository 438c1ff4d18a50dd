//! Image decoding.
//!
//! Element sources are usually base64 `data:` URIs. They are turned into raw
//! bytes here and decoded off the caller's thread by an [`ImageDecoder`].

use async_trait::async_trait;
use base64::Engine;
use matty_core::ImageHandle;

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// GIF (first frame only).
    Gif,
    /// WebP (alpha support).
    WebP,
    /// Windows bitmap.
    Bmp,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::WebP,
            "image/bmp" => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }
        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }
        if data.starts_with(b"BM") {
            return Self::Bmp;
        }
        Self::Unknown
    }

    /// The MIME type for this format.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Async image decoding collaborator.
///
/// Implementations must not block the caller; completions are applied by
/// whoever awaits the returned future.
#[async_trait]
pub trait ImageDecoder: Send + Sync {
    /// Decode encoded image bytes into premultiplied RGBA pixels.
    async fn decode(&self, bytes: Vec<u8>) -> RenderResult<ImageHandle>;
}

/// [`ImageDecoder`] backed by the `image` crate, run on a blocking task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

#[async_trait]
impl ImageDecoder for ImageCrateDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> RenderResult<ImageHandle> {
        tokio::task::spawn_blocking(move || decode_image_bytes(&bytes))
            .await
            .map_err(|e| RenderError::Decode(format!("decode task failed: {e}")))?
    }
}

/// Decode image bytes synchronously.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn decode_image_bytes(data: &[u8]) -> RenderResult<ImageHandle> {
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Decode(format!("{:?}: {e}", ImageFormat::from_magic_bytes(data))))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixels = rgba.into_raw();
    premultiply(&mut pixels);

    ImageHandle::from_premultiplied_rgba(width, height, pixels)
        .ok_or_else(|| RenderError::Decode(format!("unusable dimensions {width}x{height}")))
}

/// Convert straight RGBA to premultiplied RGBA in place.
fn premultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            // (c * a + 127) / 255 never exceeds 255
            #[allow(clippy::cast_possible_truncation)]
            {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
    }
}

/// Extract the raw bytes of an image source.
///
/// Supports `data:` URIs, both base64 (`data:image/png;base64,...`) and
/// percent-encoded.
///
/// # Errors
///
/// Returns an error if the source is not a data URI or is malformed.
pub fn decode_data_uri(uri: &str) -> RenderResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Decode("Not a data URI".to_string()))?;

    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Decode("Invalid data URI: missing comma".to_string()))?;

    if metadata.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| RenderError::Decode(format!("Failed to decode base64: {e}")))
    } else {
        percent_decode(payload)
    }
}

/// Build a base64 data URI for encoded image bytes, sniffing the MIME type.
#[must_use]
pub fn data_uri_from_bytes(bytes: &[u8]) -> String {
    let mime = ImageFormat::from_magic_bytes(bytes).mime();
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Decode("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    Ok(result)
}
