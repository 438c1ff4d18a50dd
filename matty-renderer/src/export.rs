//! Document export to raster images.
//!
//! Export always paints onto its own offscreen surface, never the live one,
//! and never draws the selection outline. Every image that has no decoded
//! pixels is decoded first; images that fail to decode are left unpainted.

use futures::future::join_all;
use matty_core::{Document, ElementId, ImageHandle};
use serde::Deserialize;

use crate::error::{RenderError, RenderResult};
use crate::decode::{decode_data_uri, ImageDecoder};
use crate::{Renderer, RendererConfig};

/// Export output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG image.
    #[default]
    Png,
    /// JPEG image, transparency composited onto white.
    Jpeg,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type of the encoded output.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(RenderError::Export(format!("unsupported format: {other}"))),
        }
    }
}

/// Configuration for export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output width in pixels (default: 800).
    pub width: u32,
    /// Output height in pixels (default: 600).
    pub height: u32,
    /// JPEG quality 1-100 (default: 85).
    pub jpeg_quality: u8,
    /// Load system fonts for text.
    pub load_system_fonts: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            jpeg_quality: 85,
            load_system_fonts: true,
        }
    }
}

/// Exports documents to encoded images.
#[derive(Debug)]
pub struct Exporter {
    config: ExportConfig,
    renderer: Renderer,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Exporter {
    /// Create a new exporter with the given configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        let renderer = Renderer::new(RendererConfig {
            width: config.width,
            height: config.height,
            load_system_fonts: config.load_system_fonts,
            ..RendererConfig::default()
        });
        Self { config, renderer }
    }

    /// Create an exporter that reuses the fonts already loaded by `renderer`.
    ///
    /// `config.load_system_fonts` is ignored.
    #[must_use]
    pub fn with_renderer(config: ExportConfig, renderer: &Renderer) -> Self {
        let renderer = renderer.resized(config.width, config.height);
        Self { config, renderer }
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// Get the export configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Decode pending images, then paint and encode the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be allocated or encoding fails.
    /// Image decode failures are not errors.
    pub async fn export(
        &self,
        document: &Document,
        format: ExportFormat,
        decoder: &dyn ImageDecoder,
    ) -> RenderResult<Vec<u8>> {
        let prepared = decode_pending(document, decoder).await;
        self.encode(&prepared, format)
    }

    /// Paint and encode the document as it is, without decoding anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be allocated or encoding fails.
    pub fn encode(&self, document: &Document, format: ExportFormat) -> RenderResult<Vec<u8>> {
        let (surface, stats) = self.renderer.render_to_surface(document, None)?;
        if stats.pending_images > 0 {
            tracing::debug!("Exporting with {} unpainted images", stats.pending_images);
        }
        match format {
            ExportFormat::Png => surface.encode_png(),
            ExportFormat::Jpeg => surface.encode_jpeg(self.config.jpeg_quality),
        }
    }
}

/// Decode every image element that has no pixels yet.
///
/// Decodes run concurrently. Returns a copy of `document` with the
/// successful results attached; failures are logged and skipped.
pub async fn decode_pending(document: &Document, decoder: &dyn ImageDecoder) -> Document {
    let pending: Vec<(ElementId, String)> = document
        .pending_images()
        .filter_map(|e| e.image_src().map(|src| (e.id, src.to_string())))
        .collect();
    if pending.is_empty() {
        return document.clone();
    }

    let decodes = pending.into_iter().map(|(id, src)| async move {
        let result = decode_source(&src, decoder).await;
        (id, result)
    });

    let mut prepared = document.clone();
    for (id, result) in join_all(decodes).await {
        match result {
            Ok(handle) => prepared = prepared.attach_image(id, handle),
            Err(e) => tracing::warn!("Image {id} left unpainted: {e}"),
        }
    }
    prepared
}

/// Resolve an element `src` to bytes and decode it.
///
/// # Errors
///
/// Returns [`RenderError::Decode`] if the source is unreadable or the bytes
/// do not decode.
pub async fn decode_source(src: &str, decoder: &dyn ImageDecoder) -> RenderResult<ImageHandle> {
    let bytes = decode_data_uri(src)?;
    decoder.decode(bytes).await
}

/// File name for an exported design: `"<title>.<ext>"`.
///
/// An empty title becomes `design`. Characters that are unsafe in file names
/// are replaced with `_`.
#[must_use]
pub fn export_filename(title: &str, format: ExportFormat) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "design"
    } else {
        cleaned.as_str()
    };
    format!("{stem}.{}", format.extension())
}
