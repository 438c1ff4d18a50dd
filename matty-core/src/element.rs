//! Design elements - the building blocks of a document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default box used for text that carries no explicit size.
///
/// Text has no intrinsic extent in the model, so hit-testing and the
/// selection overlay both fall back to this box anchored at the text origin.
pub const TEXT_HIT_BOX: Size = Size {
    width: 200.0,
    height: 30.0,
};

/// Default font size for new text elements, in pixels.
pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// Default font weight for new text elements.
pub const DEFAULT_FONT_WEIGHT: &str = "normal";

/// Default text color.
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

/// Default fill color for new shapes.
pub const DEFAULT_SHAPE_COLOR: &str = "#3b82f6";

/// Unique identifier for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse an element ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Pixels from the left edge.
    pub x: f32,
    /// Pixels from the top edge.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

/// Axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Bounds {
    /// Check whether a point lies inside the box. Both edges are inclusive.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A decoded raster image attached to an image element.
///
/// Pixels are premultiplied RGBA8, row-major, shared between snapshots.
#[derive(Clone)]
pub struct ImageHandle {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl ImageHandle {
    /// Wrap premultiplied RGBA8 pixels.
    ///
    /// Returns `None` if the buffer length does not match the dimensions or
    /// either dimension is zero.
    #[must_use]
    pub fn from_premultiplied_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 pixel data.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size of the pixel buffer in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
            || (self.width == other.width
                && self.height == other.height
                && self.pixels == other.pixels)
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn default_font_weight() -> String {
    DEFAULT_FONT_WEIGHT.to_string()
}

/// The kind-specific attributes of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    /// A text label, drawn with its baseline at the element origin.
    #[serde(rename_all = "camelCase")]
    Text {
        /// Text content.
        content: String,
        /// Font size in pixels.
        font_size: f32,
        /// CSS font weight (`normal`, `bold`, `700`, ...).
        #[serde(default = "default_font_weight")]
        font_weight: String,
        /// Fill color as hex.
        color: String,
        /// Explicit box width, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f32>,
        /// Explicit box height, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f32>,
    },

    /// A filled axis-aligned rectangle.
    Rectangle {
        /// Width in pixels.
        width: f32,
        /// Height in pixels.
        height: f32,
        /// Fill color as hex.
        color: String,
    },

    /// A filled disc inscribed in its bounding box; radius is `width / 2`.
    Circle {
        /// Bounding box width in pixels.
        width: f32,
        /// Bounding box height in pixels.
        height: f32,
        /// Fill color as hex.
        color: String,
    },

    /// A raster image scaled into its box.
    Image {
        /// Width in pixels.
        width: f32,
        /// Height in pixels.
        height: f32,
        /// Image source, usually a base64 `data:` URI.
        src: String,
        /// Decoded pixels, once available. Never serialized.
        #[serde(skip)]
        handle: Option<ImageHandle>,
    },
}

/// A canvas element: identity, anchor and kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique identifier; generated when absent on input.
    #[serde(default)]
    pub id: ElementId,
    /// Left anchor in pixels.
    pub x: f32,
    /// Top anchor in pixels (text baseline for text elements).
    pub y: f32,
    /// Kind-specific attributes.
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Create a new element at the origin with a fresh id.
    #[must_use]
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            x: 0.0,
            y: 0.0,
            kind,
        }
    }

    /// Create a text element with default styling.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ElementKind::Text {
            content: content.into(),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: default_font_weight(),
            color: DEFAULT_TEXT_COLOR.to_string(),
            width: None,
            height: None,
        })
    }

    /// Create a filled rectangle.
    #[must_use]
    pub fn rectangle(width: f32, height: f32, color: impl Into<String>) -> Self {
        Self::new(ElementKind::Rectangle {
            width: width.max(0.0),
            height: height.max(0.0),
            color: color.into(),
        })
    }

    /// Create a filled circle inscribed in a `width` x `height` box.
    #[must_use]
    pub fn circle(width: f32, height: f32, color: impl Into<String>) -> Self {
        Self::new(ElementKind::Circle {
            width: width.max(0.0),
            height: height.max(0.0),
            color: color.into(),
        })
    }

    /// Create an image element that has not been decoded yet.
    #[must_use]
    pub fn image(src: impl Into<String>, width: f32, height: f32) -> Self {
        Self::new(ElementKind::Image {
            width: width.max(0.0),
            height: height.max(0.0),
            src: src.into(),
            handle: None,
        })
    }

    /// The text element the toolbar inserts.
    #[must_use]
    pub fn default_text() -> Self {
        Self::text("Double click to edit").with_position(100.0, 100.0)
    }

    /// The rectangle the toolbar inserts.
    #[must_use]
    pub fn default_rectangle() -> Self {
        Self::rectangle(100.0, 100.0, DEFAULT_SHAPE_COLOR).with_position(150.0, 150.0)
    }

    /// The circle the toolbar inserts.
    #[must_use]
    pub fn default_circle() -> Self {
        Self::circle(100.0, 100.0, DEFAULT_SHAPE_COLOR).with_position(150.0, 150.0)
    }

    /// An image element as placed by an upload.
    #[must_use]
    pub fn uploaded_image(src: impl Into<String>) -> Self {
        Self::image(src, 200.0, 200.0).with_position(50.0, 50.0)
    }

    /// Set the anchor position.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the element id.
    #[must_use]
    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = id;
        self
    }

    /// Apply a patch and return the element.
    #[must_use]
    pub fn patched(mut self, patch: &ElementPatch) -> Self {
        self.apply_patch(patch);
        self
    }

    /// Lowercase name of the element kind.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ElementKind::Text { .. } => "text",
            ElementKind::Rectangle { .. } => "rectangle",
            ElementKind::Circle { .. } => "circle",
            ElementKind::Image { .. } => "image",
        }
    }

    /// The element's box, used for hit-testing and the selection overlay.
    ///
    /// Text without an explicit size uses [`TEXT_HIT_BOX`].
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let (width, height) = match &self.kind {
            ElementKind::Text { width, height, .. } => (
                width
                    .filter(|w| *w > 0.0)
                    .unwrap_or(TEXT_HIT_BOX.width),
                height
                    .filter(|h| *h > 0.0)
                    .unwrap_or(TEXT_HIT_BOX.height),
            ),
            ElementKind::Rectangle { width, height, .. }
            | ElementKind::Circle { width, height, .. }
            | ElementKind::Image { width, height, .. } => (*width, *height),
        };
        Bounds {
            x: self.x,
            y: self.y,
            width,
            height,
        }
    }

    /// Check if a point (in canvas coordinates) is within this element.
    ///
    /// Circles use the distance to the box centre; everything else uses the
    /// box from [`Element::bounds`].
    #[must_use]
    pub fn contains_point(&self, point: Point) -> bool {
        match &self.kind {
            ElementKind::Circle { width, .. } => {
                let center = self.bounds().center();
                let dx = point.x - center.x;
                let dy = point.y - center.y;
                dx.hypot(dy) <= width / 2.0
            }
            ElementKind::Text { .. } | ElementKind::Rectangle { .. } | ElementKind::Image { .. } => {
                self.bounds().contains(point)
            }
        }
    }

    /// Fill color, for kinds that have one.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text { color, .. }
            | ElementKind::Rectangle { color, .. }
            | ElementKind::Circle { color, .. } => Some(color),
            ElementKind::Image { .. } => None,
        }
    }

    /// Image source, for image elements.
    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Image { src, .. } => Some(src),
            _ => None,
        }
    }

    /// Decoded image, for image elements that have one.
    #[must_use]
    pub fn image_handle(&self) -> Option<&ImageHandle> {
        match &self.kind {
            ElementKind::Image { handle, .. } => handle.as_ref(),
            _ => None,
        }
    }

    /// Whether this is an image element still waiting for its decoded pixels.
    #[must_use]
    pub fn needs_decode(&self) -> bool {
        matches!(&self.kind, ElementKind::Image { handle: None, .. })
    }

    /// Attach decoded pixels. Returns `false` for non-image elements.
    pub fn set_image_handle(&mut self, image: ImageHandle) -> bool {
        match &mut self.kind {
            ElementKind::Image { handle, .. } => {
                *handle = Some(image);
                true
            }
            _ => false,
        }
    }

    /// Clamp sizes to be non-negative.
    ///
    /// Elements built through the constructors or patches already satisfy
    /// this; elements deserialized from untrusted JSON may not. A negative
    /// explicit text size is dropped so the default hit box applies.
    pub fn clamp_sizes(&mut self) {
        match &mut self.kind {
            ElementKind::Text {
                font_size,
                width,
                height,
                ..
            } => {
                *font_size = font_size.max(0.0);
                for size in [width, height] {
                    if size.is_some_and(|v| v.is_nan() || v < 0.0) {
                        *size = None;
                    }
                }
            }
            ElementKind::Rectangle { width, height, .. }
            | ElementKind::Circle { width, height, .. }
            | ElementKind::Image { width, height, .. } => {
                *width = width.max(0.0);
                *height = height.max(0.0);
            }
        }
    }

    /// Merge a patch into the element.
    ///
    /// Fields that do not apply to this kind are ignored, as are non-finite
    /// numbers. Sizes are clamped to be non-negative. Changing an image's
    /// `src` drops its decoded handle. Returns whether anything changed.
    pub fn apply_patch(&mut self, patch: &ElementPatch) -> bool {
        let before = self.clone();

        if let Some(x) = patch.x.filter(|v| v.is_finite()) {
            self.x = x;
        }
        if let Some(y) = patch.y.filter(|v| v.is_finite()) {
            self.y = y;
        }

        let new_width = patch.width.filter(|v| v.is_finite()).map(|v| v.max(0.0));
        let new_height = patch.height.filter(|v| v.is_finite()).map(|v| v.max(0.0));

        match &mut self.kind {
            ElementKind::Text {
                content,
                font_size,
                font_weight,
                color,
                width,
                height,
            } => {
                if let Some(value) = &patch.content {
                    content.clone_from(value);
                }
                if let Some(size) = patch.font_size.filter(|v| v.is_finite()) {
                    *font_size = size.max(0.0);
                }
                if let Some(weight) = &patch.font_weight {
                    font_weight.clone_from(weight);
                }
                if let Some(value) = &patch.color {
                    color.clone_from(value);
                }
                if new_width.is_some() {
                    *width = new_width;
                }
                if new_height.is_some() {
                    *height = new_height;
                }
            }
            ElementKind::Rectangle {
                width,
                height,
                color,
            }
            | ElementKind::Circle {
                width,
                height,
                color,
            } => {
                if let Some(value) = &patch.color {
                    color.clone_from(value);
                }
                if let Some(w) = new_width {
                    *width = w;
                }
                if let Some(h) = new_height {
                    *height = h;
                }
            }
            ElementKind::Image {
                width,
                height,
                src,
                handle,
            } => {
                if let Some(value) = &patch.src {
                    if value != src {
                        src.clone_from(value);
                        *handle = None;
                    }
                }
                if let Some(w) = new_width {
                    *width = w;
                }
                if let Some(h) = new_height {
                    *height = h;
                }
            }
        }

        *self != before
    }
}

/// A partial update to an element's mutable fields.
///
/// `id` and the element kind are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    /// New left anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    /// New top anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    /// New width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// New height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// New fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New font size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// New font weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    /// New image source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl ElementPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the element.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Resize the element.
    #[must_use]
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Change the fill color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Change the text content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Change the font size.
    #[must_use]
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Change the font weight.
    #[must_use]
    pub fn with_font_weight(mut self, weight: impl Into<String>) -> Self {
        self.font_weight = Some(weight.into());
        self
    }

    /// Change the image source.
    #[must_use]
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// Whether the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
