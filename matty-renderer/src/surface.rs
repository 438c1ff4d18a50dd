//! Owned raster surface.

use image::ImageEncoder;
use tiny_skia::Pixmap;

use crate::error::{RenderError, RenderResult};

/// An owned RGBA raster that documents are painted onto.
///
/// Pixels are stored premultiplied; [`Surface::pixel`] returns straight
/// RGBA.
#[derive(Debug, Clone)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if either dimension is zero or the
    /// size overflows.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        Pixmap::new(width, height)
            .map(|pixmap| Self { pixmap })
            .ok_or_else(|| RenderError::Surface(format!("cannot allocate {width}x{height} surface")))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight (non-premultiplied) RGBA at `(x, y)`, or `None` out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Raw premultiplied RGBA bytes, row-major.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Encode the surface as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Export`] if encoding fails.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))
    }

    /// Encode the surface as JPEG, compositing transparency onto white.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Export`] if encoding fails.
    pub fn encode_jpeg(&self, quality: u8) -> RenderResult<Vec<u8>> {
        let (width, height) = (self.width(), self.height());
        let mut rgb_data = Vec::with_capacity(width as usize * height as usize * 3);
        // Premultiplied over white: c + 255 * (1 - a)
        for pixel in self.pixmap.data().chunks_exact(4) {
            let inv = 255 - pixel[3];
            rgb_data.push(pixel[0].saturating_add(inv));
            rgb_data.push(pixel[1].saturating_add(inv));
            rgb_data.push(pixel[2].saturating_add(inv));
        }

        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder
            .write_image(&rgb_data, width, height, image::ExtendedColorType::Rgb8)
            .map_err(|e| RenderError::Export(format!("JPEG encoding failed: {e}")))?;

        Ok(buf.into_inner())
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
}
