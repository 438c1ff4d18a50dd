//! # Matty Renderer
//!
//! CPU raster renderer for Matty designs, built on tiny-skia with resvg for
//! text.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Renderer::render(Document)          │
//! ├─────────────────────────────────────────────┤
//! │ 1. background fill                          │
//! │ 2. elements in paint order                  │
//! │    text → usvg/resvg   shapes → tiny-skia   │
//! │    images → decoded handle, scaled          │
//! │ 3. dashed selection outline                 │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod color;
pub mod error;
pub mod export;
pub mod decode;
mod paint;
pub mod surface;

use std::sync::Arc;

pub use cache::{ImageCache, ImageCacheConfig};
pub use error::{RenderError, RenderResult};
pub use export::{
    decode_pending, decode_source, export_filename, ExportConfig, ExportFormat, Exporter,
};
pub use decode::{decode_data_uri, data_uri_from_bytes, ImageCrateDecoder, ImageDecoder};
pub use surface::Surface;

use matty_core::{Document, ElementId, ElementKind, DEFAULT_BACKGROUND};

/// Outline colour for the selected element.
pub const SELECTION_COLOR: &str = "#3b82f6";

/// Installed families tried, in order, for the generic `sans-serif` family.
const SANS_SERIF_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
];

/// Point the generic `sans-serif` family at a face that is actually loaded.
///
/// fontdb maps `sans-serif` to Arial, which many Linux hosts lack; without a
/// match usvg drops the text entirely.
fn resolve_sans_serif(fontdb: &mut usvg::fontdb::Database) {
    let has_family =
        |name: &str| fontdb.faces().any(|face| face.families.iter().any(|(f, _)| f == name));
    let family = SANS_SERIF_FAMILIES
        .iter()
        .copied()
        .find(|name| has_family(*name))
        .map(str::to_string)
        .or_else(|| {
            fontdb
                .faces()
                .find_map(|face| face.families.first().map(|(f, _)| f.clone()))
        });
    if let Some(family) = family {
        tracing::debug!("Using {family} for sans-serif text");
        fontdb.set_sans_serif_family(family);
    }
}

/// Configuration for the renderer.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Fill used when the document's background is not a valid colour.
    pub background: String,
    /// Load system fonts for text. Without fonts, text paints nothing.
    pub load_system_fonts: bool,
    /// Outline colour for the selected element.
    pub selection_color: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: DEFAULT_BACKGROUND.to_string(),
            load_system_fonts: true,
            selection_color: SELECTION_COLOR.to_string(),
        }
    }
}

/// What a single [`Renderer::render`] call painted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Elements that produced pixels (or, for text, were laid out).
    pub painted: usize,
    /// Image elements skipped because they are not decoded yet.
    pub pending_images: usize,
    /// Whether a selection outline was drawn.
    pub selection_drawn: bool,
}

/// Paints documents onto surfaces.
///
/// Rendering is a pure function of the document, the selection and the
/// surface size: painting the same inputs twice gives identical pixels.
#[derive(Clone)]
pub struct Renderer {
    config: RendererConfig,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("fonts", &self.fontdb.len())
            .finish()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl Renderer {
    /// Create a renderer with the given configuration.
    #[must_use]
    pub fn new(config: RendererConfig) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        if config.load_system_fonts {
            fontdb.load_system_fonts();
            resolve_sans_serif(&mut fontdb);
            tracing::debug!("Loaded {} system font faces", fontdb.len());
        }
        Self {
            config,
            fontdb: Arc::new(fontdb),
        }
    }

    /// Add a font from raw TrueType/OpenType data.
    ///
    /// Renderers cloned earlier keep their own font set.
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        let fontdb = Arc::make_mut(&mut self.fontdb);
        fontdb.load_font_data(data);
        resolve_sans_serif(fontdb);
    }

    /// Number of font faces available for text.
    #[must_use]
    pub fn font_faces(&self) -> usize {
        self.fontdb.len()
    }

    /// A renderer sharing this one's fonts and colours at another size.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            config: RendererConfig {
                width,
                height,
                ..self.config.clone()
            },
            fontdb: Arc::clone(&self.fontdb),
        }
    }

    /// Get the renderer configuration.
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Allocate a surface of the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if the configured size is unusable.
    pub fn new_surface(&self) -> RenderResult<Surface> {
        Surface::new(self.config.width, self.config.height)
    }

    /// Paint `document` onto `surface`, replacing its previous contents.
    ///
    /// Elements are painted in document order. Images without decoded pixels
    /// are skipped and counted in [`FrameStats::pending_images`]. If
    /// `selected` names an element, a dashed outline is drawn over it last.
    pub fn render(
        &self,
        surface: &mut Surface,
        document: &Document,
        selected: Option<ElementId>,
    ) -> FrameStats {
        let (width, height) = (surface.width(), surface.height());
        let pixmap = surface.pixmap_mut();
        let mut stats = FrameStats::default();
        let text_options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };

        let background = color::parse_hex_color(document.background())
            .or_else(|| color::parse_hex_color(&self.config.background))
            .unwrap_or(tiny_skia::Color::WHITE);
        pixmap.fill(background);

        for element in document.elements() {
            let bounds = element.bounds();
            let painted = match &element.kind {
                ElementKind::Text { .. } => paint::text_fragment(element, width, height)
                    .is_some_and(|svg| paint::draw_text(pixmap, &svg, &text_options)),
                ElementKind::Rectangle { color, .. } => paint::fill_rect(pixmap, bounds, color),
                ElementKind::Circle { color, .. } => paint::fill_circle(pixmap, bounds, color),
                ElementKind::Image { handle, .. } => match handle {
                    Some(handle) => paint::draw_image(pixmap, bounds, handle),
                    None => {
                        stats.pending_images += 1;
                        false
                    }
                },
            };
            if painted {
                stats.painted += 1;
            }
        }

        if let Some(element) = selected.and_then(|id| document.element(id)) {
            let outline = color::parse_hex_color(&self.config.selection_color)
                .unwrap_or_else(|| color::color_or_black(SELECTION_COLOR));
            paint::stroke_selection(pixmap, element, outline);
            stats.selection_drawn = true;
        }

        stats
    }

    /// Paint `document` onto a fresh surface of the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if the surface cannot be allocated.
    pub fn render_to_surface(
        &self,
        document: &Document,
        selected: Option<ElementId>,
    ) -> RenderResult<(Surface, FrameStats)> {
        let mut surface = self.new_surface()?;
        let stats = self.render(&mut surface, document, selected);
        Ok((surface, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matty_core::{Element, ImageHandle};

    fn renderer() -> Renderer {
        Renderer::new(RendererConfig {
            load_system_fonts: false,
            ..RendererConfig::default()
        })
    }

    #[test]
    fn test_empty_document_is_white() {
        let (surface, stats) = renderer()
            .render_to_surface(&Document::new(), None)
            .expect("render");
        assert_eq!((surface.width(), surface.height()), (800, 600));
        assert_eq!(surface.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(799, 599), Some([255, 255, 255, 255]));
        assert_eq!(stats, FrameStats::default());
    }

    #[test]
    fn test_rectangle_fills_its_box() {
        let (doc, _) = Document::new().add_element(
            Element::rectangle(100.0, 100.0, "#ff0000").with_position(150.0, 150.0),
        );
        let (surface, stats) = renderer().render_to_surface(&doc, None).expect("render");

        assert_eq!(surface.pixel(200, 200), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(140, 200), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(260, 200), Some([255, 255, 255, 255]));
        assert_eq!(stats.painted, 1);
    }

    #[test]
    fn test_circle_leaves_corners() {
        let (doc, _) = Document::new().add_element(
            Element::circle(100.0, 100.0, "#00ff00").with_position(150.0, 150.0),
        );
        let (surface, _) = renderer().render_to_surface(&doc, None).expect("render");

        assert_eq!(surface.pixel(200, 200), Some([0, 255, 0, 255]));
        assert_eq!(surface.pixel(152, 152), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_later_elements_paint_over_earlier() {
        let (doc, _) = Document::new().add_element(
            Element::rectangle(100.0, 100.0, "#ff0000").with_position(0.0, 0.0),
        );
        let (doc, _) = doc.add_element(
            Element::rectangle(100.0, 100.0, "#0000ff").with_position(50.0, 50.0),
        );
        let (surface, _) = renderer().render_to_surface(&doc, None).expect("render");

        assert_eq!(surface.pixel(75, 75), Some([0, 0, 255, 255]));
        assert_eq!(surface.pixel(25, 25), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_color_paints_black() {
        let (doc, _) = Document::new().add_element(
            Element::rectangle(10.0, 10.0, "not-a-color").with_position(0.0, 0.0),
        );
        let (surface, _) = renderer().render_to_surface(&doc, None).expect("render");
        assert_eq!(surface.pixel(5, 5), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_document_background() {
        let doc = Document::new().with_background("#000000");
        let (surface, _) = renderer().render_to_surface(&doc, None).expect("render");
        assert_eq!(surface.pixel(10, 10), Some([0, 0, 0, 255]));

        let doc = Document::new().with_background("bogus");
        let (surface, _) = renderer().render_to_surface(&doc, None).expect("render");
        assert_eq!(surface.pixel(10, 10), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_undecoded_image_is_skipped() {
        let (doc, _) = Document::new().add_element(Element::uploaded_image("data:image/png;base64,AAAA"));
        let (surface, stats) = renderer().render_to_surface(&doc, None).expect("render");

        assert_eq!(stats.pending_images, 1);
        assert_eq!(stats.painted, 0);
        assert_eq!(surface.pixel(100, 100), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_decoded_image_is_scaled_into_box() {
        let handle =
            ImageHandle::from_premultiplied_rgba(1, 1, vec![0, 0, 255, 255]).expect("handle");
        let (doc, id) = Document::new().add_element(Element::uploaded_image("data:x"));
        let doc = doc.attach_image(id, handle);
        let (surface, stats) = renderer().render_to_surface(&doc, None).expect("render");

        assert_eq!(stats.pending_images, 0);
        assert_eq!(stats.painted, 1);
        // uploaded images sit at (50, 50) with a 200x200 box
        let [r, g, b, _] = surface.pixel(150, 150).expect("in bounds");
        assert!(r <= 2 && g <= 2 && b >= 253, "got {r},{g},{b}");
        assert_eq!(surface.pixel(20, 20), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_selection_outline_on_box_edge() {
        let (doc, id) = Document::new().add_element(
            Element::rectangle(100.0, 100.0, "#ffffff").with_position(150.0, 150.0),
        );
        let r = renderer();
        let (plain, stats) = r.render_to_surface(&doc, None).expect("render");
        assert!(!stats.selection_drawn);
        let (selected, stats) = r.render_to_surface(&doc, Some(id)).expect("render");
        assert!(stats.selection_drawn);

        // first dash starts at the top-left corner
        assert_eq!(plain.pixel(152, 150), Some([255, 255, 255, 255]));
        assert_ne!(selected.pixel(152, 150), plain.pixel(152, 150));
        // interior untouched
        assert_eq!(selected.pixel(200, 200), plain.pixel(200, 200));
    }

    #[test]
    fn test_unknown_selection_draws_nothing() {
        let (doc, _) = Document::new().add_element(Element::default_rectangle());
        let (_, stats) = renderer()
            .render_to_surface(&doc, Some(ElementId::new()))
            .expect("render");
        assert!(!stats.selection_drawn);
    }

    #[test]
    fn test_render_is_idempotent() {
        let (doc, id) = Document::new().add_element(Element::default_circle());
        let (doc, _) = doc.add_element(Element::default_text());
        let r = renderer();
        let mut surface = r.new_surface().expect("surface");

        r.render(&mut surface, &doc, Some(id));
        let first = surface.data().to_vec();
        r.render(&mut surface, &doc, Some(id));
        assert_eq!(surface.data(), first.as_slice());
    }
}
