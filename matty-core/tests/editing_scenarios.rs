//! Document + History Integration Tests
//!
//! Drives the pure document operations through a history the way an editor
//! does:
//! - content edits are recorded, selection is not
//! - undo/redo walks the snapshots
//! - hit-testing resolves the topmost element

use matty_core::{
    hit_test, Document, Element, ElementKind, ElementPatch, History, Point, DEFAULT_TITLE,
};

/// Apply a content edit and record it.
fn commit(history: &mut History, next: Document) -> Document {
    history.record(next.clone());
    next
}

// ============================================================================
// Add / Update / Undo
// ============================================================================

#[test]
fn test_add_text_then_undo() {
    let mut history = History::default();
    let (doc, id) = history.current().add_element(Element::default_text());
    let doc = commit(&mut history, doc);

    assert_eq!(doc.len(), 1);
    assert_eq!(history.len(), 2);
    assert_eq!(history.step(), 1);
    let text = doc.element(id).expect("text exists");
    assert_eq!(text.type_name(), "text");
    assert!((text.x - 100.0).abs() < f32::EPSILON);
    assert!((text.y - 100.0).abs() < f32::EPSILON);

    let undone = history.undo().clone();
    assert!(undone.is_empty());
    assert_eq!(history.step(), 0);
}

#[test]
fn test_font_size_update_round_trip() {
    let mut history = History::default();
    let (doc, id) = history
        .current()
        .add_element(Element::text("Hello").with_position(100.0, 100.0));
    let doc = commit(&mut history, doc);
    let doc = commit(
        &mut history,
        doc.update_element(id, &ElementPatch::new().with_font_size(40.0)),
    );

    let font_size = |d: &Document| match &d.element(id).expect("exists").kind {
        ElementKind::Text { font_size, .. } => *font_size,
        other => panic!("unexpected kind {other:?}"),
    };

    assert!((font_size(&doc) - 40.0).abs() < f32::EPSILON);
    assert!((font_size(history.undo()) - 24.0).abs() < f32::EPSILON);
    assert!((font_size(history.redo()) - 40.0).abs() < f32::EPSILON);
}

#[test]
fn test_new_edit_after_undo_prunes_redo() {
    let mut history = History::default();
    let (doc, _) = history.current().add_element(Element::default_rectangle());
    commit(&mut history, doc);
    let (doc, _) = history.current().add_element(Element::default_circle());
    commit(&mut history, doc);

    let after_undo = history.undo().clone();
    assert_eq!(after_undo.len(), 1);
    let (doc, _) = after_undo.add_element(Element::default_text());
    commit(&mut history, doc);

    assert!(!history.can_redo());
    assert_eq!(history.len(), 3);
    let kinds: Vec<_> = history
        .current()
        .elements()
        .iter()
        .map(Element::type_name)
        .collect();
    assert_eq!(kinds, vec!["rectangle", "text"]);
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_select_is_not_recorded() {
    let mut history = History::default();
    let (doc, id) = history.current().add_element(Element::default_rectangle());
    let doc = commit(&mut history, doc);

    let selected = doc.select(Some(id));
    assert_eq!(selected.selected(), Some(id));
    assert_eq!(history.len(), 2);
    assert_eq!(history.step(), 1);
}

#[test]
fn test_delete_selected_then_undo_restores_element() {
    let mut history = History::default();
    let (doc, id) = history.current().add_element(Element::default_circle());
    let doc = commit(&mut history, doc).select(Some(id));
    let doc = commit(&mut history, doc.delete_element(id));

    assert!(doc.is_empty());
    assert_eq!(doc.selected(), None);

    let restored = history.undo();
    assert!(restored.element(id).is_some());
}

// ============================================================================
// Hit-testing
// ============================================================================

#[test]
fn test_click_prefers_topmost() {
    let (doc, rect) = Document::new().add_element(Element::default_rectangle());
    let (doc, circle) = doc.add_element(Element::default_circle());

    assert_eq!(hit_test(&doc, Point::new(175.0, 175.0)), Some(circle));
    assert_eq!(hit_test(&doc, Point::new(151.0, 151.0)), Some(rect));
    assert_eq!(hit_test(&doc, Point::new(10.0, 10.0)), None);
}

#[test]
fn test_text_uses_default_hit_box() {
    let (doc, id) = Document::new().add_element(Element::default_text());
    assert_eq!(hit_test(&doc, Point::new(100.0, 100.0)), Some(id));
    assert_eq!(hit_test(&doc, Point::new(300.0, 130.0)), Some(id));
    assert_eq!(hit_test(&doc, Point::new(300.5, 115.0)), None);
    assert_eq!(hit_test(&doc, Point::new(150.0, 131.0)), None);
}

// ============================================================================
// Save/load shape
// ============================================================================

#[test]
fn test_payload_load_resets_history() {
    let (doc, _) = Document::new().add_element(Element::default_rectangle());
    let (doc, _) = doc.add_element(Element::uploaded_image("data:image/png;base64,AAAA"));
    let payload = doc.to_payload("");
    assert_eq!(payload.title, DEFAULT_TITLE);

    let json = serde_json::to_string(&payload).expect("serialize");
    assert!(!json.contains("handle"));

    let mut history = History::default();
    history.record(Document::new().add_element(Element::default_text()).0);
    history.reset(Document::from_payload(&payload));

    assert_eq!(history.len(), 1);
    assert!(!history.can_undo());
    assert_eq!(history.current().elements(), doc.elements());
}
