//! Hex colour parsing.

use tiny_skia::Color;

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
///
/// The leading `#` is optional. Returns `None` for anything else.
#[must_use]
pub fn parse_hex_color(input: &str) -> Option<Color> {
    let hex = input.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (r, g, b, a) = match hex.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    Some(Color::from_rgba8(r, g, b, a))
}

/// Parse a colour, falling back to opaque black.
#[must_use]
pub fn color_or_black(input: &str) -> Color {
    parse_hex_color(input).unwrap_or_else(|| {
        tracing::debug!("Invalid colour {input:?}, using black");
        Color::BLACK
    })
}

/// Format a colour as an SVG `rgb()` value plus opacity.
#[must_use]
pub(crate) fn svg_fill(color: Color) -> (String, f32) {
    let c = color.to_color_u8();
    (
        format!("rgb({},{},{})", c.red(), c.green(), c.blue()),
        color.alpha(),
    )
}
