//! Per-element painting onto a tiny-skia pixmap.
//!
//! Shapes and images go straight through tiny-skia. Text is laid out by usvg
//! from a one-element SVG fragment and rasterized by resvg, so it shares the
//! font database held by the renderer.

use std::fmt::Write;

use matty_core::{Bounds, Element, ElementKind, ImageHandle};
use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Rect,
    Stroke, StrokeDash, Transform,
};

use crate::color::{color_or_black, svg_fill};

/// Font stack used for all text.
pub(crate) const FONT_FAMILY: &str = "Arial, sans-serif";

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

/// Fill an axis-aligned box. Empty or non-finite boxes paint nothing.
pub(crate) fn fill_rect(pixmap: &mut Pixmap, bounds: Bounds, color: &str) -> bool {
    let Some(rect) = Rect::from_xywh(bounds.x, bounds.y, bounds.width, bounds.height) else {
        return false;
    };
    pixmap.fill_rect(rect, &solid(color_or_black(color)), Transform::identity(), None);
    true
}

/// Fill the disc inscribed in `bounds`, radius `width / 2`.
pub(crate) fn fill_circle(pixmap: &mut Pixmap, bounds: Bounds, color: &str) -> bool {
    let center = bounds.center();
    let Some(path) = PathBuilder::from_circle(center.x, center.y, bounds.width / 2.0) else {
        return false;
    };
    pixmap.fill_path(
        &path,
        &solid(color_or_black(color)),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    true
}

/// Draw decoded pixels scaled into `bounds`.
pub(crate) fn draw_image(pixmap: &mut Pixmap, bounds: Bounds, handle: &ImageHandle) -> bool {
    if !(bounds.width > 0.0 && bounds.height > 0.0) {
        return false;
    }
    let Some(source) = PixmapRef::from_bytes(handle.pixels(), handle.width(), handle.height())
    else {
        tracing::warn!(
            "Image handle {}x{} does not match its pixel buffer",
            handle.width(),
            handle.height()
        );
        return false;
    };

    #[allow(clippy::cast_precision_loss)]
    let (sx, sy) = (
        bounds.width / handle.width() as f32,
        bounds.height / handle.height() as f32,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(
        0,
        0,
        source,
        &paint,
        Transform::from_row(sx, 0.0, 0.0, sy, bounds.x, bounds.y),
        None,
    );
    true
}

/// Build the SVG fragment for a text element on a `width`x`height` canvas.
///
/// The baseline sits at the element's `y`. Returns `None` for non-text
/// elements.
pub(crate) fn text_fragment(element: &Element, width: u32, height: u32) -> Option<String> {
    let ElementKind::Text {
        content,
        font_size,
        font_weight,
        color,
        ..
    } = &element.kind
    else {
        return None;
    };

    let (fill, opacity) = svg_fill(color_or_black(color));
    let mut svg = String::with_capacity(256 + content.len());
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(
        svg,
        "<text x=\"{}\" y=\"{}\" font-size=\"{font_size}\" font-weight=\"{}\" font-family=\"{FONT_FAMILY}\" fill=\"{fill}\" fill-opacity=\"{opacity}\" xml:space=\"preserve\">{}</text>",
        element.x,
        element.y,
        escape_xml(font_weight),
        escape_xml(content),
    );
    svg.push_str("</svg>");
    Some(svg)
}

/// Rasterize a text fragment over the pixmap.
///
/// Returns `false` when nothing was drawn, including when no loaded font
/// face matches and usvg drops the text.
pub(crate) fn draw_text(pixmap: &mut Pixmap, fragment: &str, options: &usvg::Options) -> bool {
    match usvg::Tree::from_str(fragment, options) {
        Ok(tree) if tree.root().has_children() => {
            resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
            true
        }
        Ok(_) => {
            tracing::debug!("No font face available for text; left unpainted");
            false
        }
        Err(e) => {
            tracing::warn!("Failed to lay out text: {e}");
            false
        }
    }
}

/// Stroke the dashed selection outline: the circle itself for circles,
/// otherwise the element box.
pub(crate) fn stroke_selection(pixmap: &mut Pixmap, element: &Element, color: Color) {
    let bounds = element.bounds();
    let path = match element.kind {
        ElementKind::Circle { .. } => {
            let center = bounds.center();
            PathBuilder::from_circle(center.x, center.y, bounds.width / 2.0)
        }
        ElementKind::Text { .. } | ElementKind::Rectangle { .. } | ElementKind::Image { .. } => {
            Rect::from_xywh(bounds.x, bounds.y, bounds.width, bounds.height)
                .map(PathBuilder::from_rect)
        }
    };
    let Some(path) = path else {
        return;
    };

    let stroke = Stroke {
        width: 2.0,
        dash: StrokeDash::new(vec![5.0, 5.0], 0.0),
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
}

/// Escape special characters for embedding in SVG/XML.
pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
