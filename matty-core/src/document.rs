//! Document store: the ordered element list plus selection.
//!
//! Every operation is pure. It returns a new [`Document`] and leaves the
//! receiver untouched, so earlier values stay valid as history snapshots.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{DesignError, DesignResult, Element, ElementId, ElementPatch, ImageHandle};

/// Background color used when a document does not specify one.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

/// An ordered collection of elements plus the current selection.
///
/// Paint order is element order: later elements are drawn over earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Elements in paint order.
    elements: Vec<Element>,
    /// Currently selected element, always one of `elements`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected: Option<ElementId>,
    /// Solid background fill.
    #[serde(default = "default_background")]
    background: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a white background.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            selected: None,
            background: default_background(),
        }
    }

    /// Build a document from a list of elements, with nothing selected.
    ///
    /// Elements whose id repeats an earlier one get a fresh id. Negative sizes
    /// are clamped.
    #[must_use]
    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        let mut seen = HashSet::new();
        let elements = elements
            .into_iter()
            .map(|mut element| {
                element.clamp_sizes();
                if !seen.insert(element.id) {
                    let fresh = ElementId::new();
                    tracing::debug!("Duplicate element id {} reassigned to {fresh}", element.id);
                    element.id = fresh;
                    seen.insert(fresh);
                }
                element
            })
            .collect();
        Self {
            elements,
            ..Self::new()
        }
    }

    /// Set the background color.
    #[must_use]
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background = color.into();
        self
    }

    /// Append an element.
    ///
    /// If the element's id is already taken a fresh one is assigned. Returns
    /// the new document together with the id the element ended up with.
    #[must_use]
    pub fn add_element(&self, mut element: Element) -> (Self, ElementId) {
        element.clamp_sizes();
        if self.contains(element.id) {
            element.id = ElementId::new();
        }
        let id = element.id;
        let mut next = self.clone();
        next.elements.push(element);
        (next, id)
    }

    /// Merge a patch into the matching element.
    ///
    /// Returns an unchanged copy if no element has `id`.
    #[must_use]
    pub fn update_element(&self, id: ElementId, patch: &ElementPatch) -> Self {
        let mut next = self.clone();
        match next.elements.iter_mut().find(|e| e.id == id) {
            Some(element) => {
                element.apply_patch(patch);
            }
            None => tracing::debug!("update_element: {id} not found"),
        }
        next
    }

    /// Remove the matching element, clearing the selection if it pointed there.
    ///
    /// Returns an unchanged copy if no element has `id`.
    #[must_use]
    pub fn delete_element(&self, id: ElementId) -> Self {
        let mut next = self.clone();
        let before = next.elements.len();
        next.elements.retain(|e| e.id != id);
        if next.elements.len() == before {
            tracing::debug!("delete_element: {id} not found");
        }
        if next.selected == Some(id) {
            next.selected = None;
        }
        next
    }

    /// Set the selection. Ids that do not resolve select nothing.
    #[must_use]
    pub fn select(&self, id: Option<ElementId>) -> Self {
        let mut next = self.clone();
        next.selected = id.filter(|id| self.contains(*id));
        next
    }

    /// Attach decoded pixels to an image element.
    ///
    /// Returns an unchanged copy if `id` is missing or not an image.
    #[must_use]
    pub fn attach_image(&self, id: ElementId, handle: ImageHandle) -> Self {
        let mut next = self.clone();
        if let Some(element) = next.elements.iter_mut().find(|e| e.id == id) {
            if !element.set_image_handle(handle) {
                tracing::debug!("attach_image: {id} is not an image");
            }
        }
        next
    }

    /// Get an element by ID.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Whether an element with `id` exists.
    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.iter().any(|e| e.id == id)
    }

    /// All elements in paint order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Image elements that have no decoded pixels yet.
    pub fn pending_images(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.needs_decode())
    }

    /// The selected element id, if any.
    #[must_use]
    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    /// The selected element, if any.
    #[must_use]
    pub fn selected_element(&self) -> Option<&Element> {
        self.selected.and_then(|id| self.element(id))
    }

    /// Background color.
    #[must_use]
    pub fn background(&self) -> &str {
        &self.background
    }

    /// Get the number of elements in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Serialize the document to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> DesignResult<String> {
        serde_json::to_string(self).map_err(DesignError::Serialization)
    }

    /// Deserialize a document from JSON.
    ///
    /// Duplicate ids are reassigned and a dangling selection is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> DesignResult<Self> {
        let raw: Self = serde_json::from_str(json).map_err(DesignError::Serialization)?;
        let selected = raw.selected;
        let doc = Self::from_elements(raw.elements).with_background(raw.background);
        Ok(doc.select(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementKind;

    #[test]
    fn test_add_is_pure() {
        let empty = Document::new();
        let (one, id) = empty.add_element(Element::default_rectangle());

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(one.element(id).is_some());
    }

    #[test]
    fn test_add_reassigns_colliding_id() {
        let rect = Element::default_rectangle();
        let (doc, first) = Document::new().add_element(rect.clone());
        let (doc, second) = doc.add_element(rect);

        assert_ne!(first, second);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_update_merges_fields() {
        let (doc, id) = Document::new().add_element(Element::text("Hello").with_position(100.0, 100.0));
        let doc = doc.update_element(id, &ElementPatch::new().with_font_size(40.0));

        let element = doc.element(id).expect("element exists");
        assert!((element.x - 100.0).abs() < f32::EPSILON);
        match &element.kind {
            ElementKind::Text {
                content, font_size, ..
            } => {
                assert_eq!(content, "Hello");
                assert!((font_size - 40.0).abs() < f32::EPSILON);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let (doc, _) = Document::new().add_element(Element::default_circle());
        let same = doc.update_element(ElementId::new(), &ElementPatch::new().with_color("#000"));
        assert_eq!(doc, same);
    }

    #[test]
    fn test_delete_clears_selection() {
        let (doc, id) = Document::new().add_element(Element::default_rectangle());
        let doc = doc.select(Some(id));
        assert_eq!(doc.selected(), Some(id));

        let doc = doc.delete_element(id);
        assert!(doc.is_empty());
        assert_eq!(doc.selected(), None);
    }

    #[test]
    fn test_delete_other_keeps_selection() {
        let (doc, keep) = Document::new().add_element(Element::default_rectangle());
        let (doc, drop) = doc.add_element(Element::default_circle());
        let doc = doc.select(Some(keep)).delete_element(drop);
        assert_eq!(doc.selected(), Some(keep));
    }

    #[test]
    fn test_select_unknown_is_none() {
        let (doc, id) = Document::new().add_element(Element::default_rectangle());
        let doc = doc.select(Some(id)).select(Some(ElementId::new()));
        assert_eq!(doc.selected(), None);
    }

    #[test]
    fn test_from_elements_dedupes_ids() {
        let rect = Element::default_rectangle();
        let doc = Document::from_elements(vec![rect.clone(), rect]);
        assert_eq!(doc.len(), 2);
        assert_ne!(doc.elements()[0].id, doc.elements()[1].id);
    }

    #[test]
    fn test_json_roundtrip_drops_dangling_selection() {
        let (doc, id) = Document::new().add_element(Element::default_text());
        let doc = doc.select(Some(id));
        let json = doc.to_json().expect("serialize");
        let back = Document::from_json(&json).expect("deserialize");
        assert_eq!(back, doc);

        let mut value: serde_json::Value = serde_json::from_str(&json).expect("value");
        value["selected"] = serde_json::json!(ElementId::new().to_string());
        let back = Document::from_json(&value.to_string()).expect("deserialize");
        assert_eq!(back.selected(), None);
    }

    #[test]
    fn test_attach_image_only_touches_images() {
        let handle = ImageHandle::from_premultiplied_rgba(1, 1, vec![0, 0, 0, 255]).expect("handle");
        let (doc, rect) = Document::new().add_element(Element::default_rectangle());
        let (doc, image) = doc.add_element(Element::uploaded_image("data:x"));
        assert_eq!(doc.pending_images().count(), 1);

        let doc = doc.attach_image(rect, handle.clone()).attach_image(image, handle);
        assert_eq!(doc.pending_images().count(), 0);
        assert!(doc.element(rect).and_then(Element::image_handle).is_none());
    }

    #[test]
    fn test_loaded_sizes_are_clamped() {
        let json = r##"{"elements":[
            {"type":"rectangle","x":10,"y":10,"width":-50,"height":-5,"color":"#ff0000"},
            {"type":"image","x":0,"y":0,"width":-1,"height":20,"src":""},
            {"type":"text","x":0,"y":0,"content":"Hi","fontSize":-3,"color":"#000000","width":-10,"height":12}
        ]}"##;
        let doc = Document::from_json(json).expect("parse");

        match &doc.elements()[0].kind {
            ElementKind::Rectangle { width, height, .. } => {
                assert!(*width == 0.0 && *height == 0.0);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        match &doc.elements()[1].kind {
            ElementKind::Image { width, height, .. } => {
                assert!(*width == 0.0 && (*height - 20.0).abs() < f32::EPSILON);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        match &doc.elements()[2].kind {
            ElementKind::Text {
                font_size,
                width,
                height,
                ..
            } => {
                assert!(*font_size == 0.0);
                assert_eq!(*width, None);
                assert_eq!(*height, Some(12.0));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_added_element_sizes_are_clamped() {
        let element = Element::new(ElementKind::Circle {
            width: -20.0,
            height: 30.0,
            color: "#000000".to_string(),
        });
        let (doc, id) = Document::new().add_element(element);
        match doc.element(id).map(|e| &e.kind) {
            Some(ElementKind::Circle { width, .. }) => assert!(*width == 0.0),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
