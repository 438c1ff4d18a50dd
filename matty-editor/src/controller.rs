//! The editor façade.
//!
//! Every user intent enters here and is applied on the caller's thread:
//!
//! ```text
//! content intent   → Document op → History::record → repaint
//! transient intent → Document op → repaint
//! undo / redo      → History move → adopt snapshot → repaint
//! decode complete  → attach pixels (no new snapshot) → repaint
//! ```
//!
//! Image decodes are futures parked in a [`FuturesUnordered`]. They make
//! progress only while the host awaits [`Editor::next_decode`] or
//! [`Editor::settle`], so completions re-enter through the same `&mut self`
//! path as every other intent and no locking is needed.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use matty_core::{
    hit_test, DesignId, DesignPayload, DesignRecord, DesignRepository, DesignUpdate, Document,
    Element, ElementId, ElementPatch, History, ImageHandle, Point, DEFAULT_TITLE,
};
use matty_renderer::cache::SourceKey;
use matty_renderer::{
    data_uri_from_bytes, decode_source, export_filename, ExportConfig, ExportFormat, Exporter,
    FrameStats, ImageCache, ImageCacheConfig, ImageCrateDecoder, ImageDecoder, RenderResult,
    Renderer, RendererConfig, Surface,
};

use crate::error::EditorResult;

/// Editor configuration.
#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    /// Live preview surface and styling.
    pub renderer: RendererConfig,
    /// Offscreen export settings.
    pub export: ExportConfig,
    /// Maximum snapshots kept; unbounded when `None`.
    pub history_limit: Option<usize>,
    /// Limits for the decoded image cache.
    pub image_cache: ImageCacheConfig,
}

/// Shapes that can be added with [`Editor::add_shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// 100x100 rectangle at (150, 150).
    Rectangle,
    /// 100px circle at (150, 150).
    Circle,
}

/// Encoded export output plus a suggested file name.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    /// `"<title>.<ext>"`, or `design.<ext>` for untitled designs.
    pub filename: String,
    /// Encoding of `bytes`.
    pub format: ExportFormat,
    /// Encoded image.
    pub bytes: Vec<u8>,
}

/// What happened when a pending decode completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Pixels were attached to these elements and the preview repainted.
    Attached(Vec<ElementId>),
    /// The source decoded but no element uses it any more.
    Discarded,
    /// The source failed to decode; its elements stay unpainted.
    Failed(String),
}

struct DecodeOutcome {
    src: String,
    result: RenderResult<ImageHandle>,
}

/// Editor state: the live document, its history and the preview surface.
pub struct Editor {
    document: Document,
    history: History,
    renderer: Renderer,
    exporter: Exporter,
    surface: Surface,
    frame: FrameStats,
    decoder: Arc<dyn ImageDecoder>,
    images: ImageCache,
    decodes: FuturesUnordered<BoxFuture<'static, DecodeOutcome>>,
    in_flight: HashSet<SourceKey>,
    failed: HashSet<SourceKey>,
    title: String,
    design_id: Option<DesignId>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("title", &self.title)
            .field("design_id", &self.design_id)
            .field("elements", &self.document.len())
            .field("step", &self.history.step())
            .field("pending_decodes", &self.decodes.len())
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Create an editor with an empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub fn new(config: EditorConfig, decoder: Arc<dyn ImageDecoder>) -> EditorResult<Self> {
        let renderer = Renderer::new(config.renderer);
        let surface = renderer.new_surface()?;
        let exporter = Exporter::with_renderer(config.export, &renderer);
        let history = match config.history_limit {
            Some(limit) => History::default().with_limit(limit),
            None => History::default(),
        };

        let mut editor = Self {
            document: history.current().clone(),
            history,
            renderer,
            exporter,
            surface,
            frame: FrameStats::default(),
            decoder,
            images: ImageCache::with_config(config.image_cache),
            decodes: FuturesUnordered::new(),
            in_flight: HashSet::new(),
            failed: HashSet::new(),
            title: DEFAULT_TITLE.to_string(),
            design_id: None,
        };
        editor.repaint();
        Ok(editor)
    }

    /// Create an editor with default configuration and the `image` crate
    /// decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview surface cannot be allocated.
    pub fn with_defaults() -> EditorResult<Self> {
        Self::new(EditorConfig::default(), Arc::new(ImageCrateDecoder))
    }

    // -----------------------------------------------------------------------
    // Content intents
    // -----------------------------------------------------------------------

    /// Append an element and record the result.
    pub fn add_element(&mut self, element: Element) -> ElementId {
        let (next, id) = self.document.add_element(element);
        self.commit(next);
        id
    }

    /// Add the default "Double click to edit" text.
    pub fn add_text(&mut self) -> ElementId {
        self.add_element(Element::default_text())
    }

    /// Add a default shape.
    pub fn add_shape(&mut self, shape: Shape) -> ElementId {
        let element = match shape {
            Shape::Rectangle => Element::default_rectangle(),
            Shape::Circle => Element::default_circle(),
        };
        self.add_element(element)
    }

    /// Add an image from encoded bytes and start decoding it.
    ///
    /// The element is added immediately and paints once the decode lands.
    pub fn upload_image(&mut self, bytes: &[u8]) -> ElementId {
        self.add_element(Element::uploaded_image(data_uri_from_bytes(bytes)))
    }

    /// Merge a patch into an element and record the result.
    ///
    /// Returns `false`, recording nothing, if no element has `id`.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        if !self.document.contains(id) {
            tracing::debug!("update_element: {id} not found");
            return false;
        }
        let next = self.document.update_element(id, patch);
        self.commit(next);
        true
    }

    /// Remove an element and record the result.
    ///
    /// Returns `false`, recording nothing, if no element has `id`.
    pub fn delete_element(&mut self, id: ElementId) -> bool {
        if !self.document.contains(id) {
            tracing::debug!("delete_element: {id} not found");
            return false;
        }
        let next = self.document.delete_element(id);
        self.commit(next);
        true
    }

    /// Replace the document with a stored design.
    ///
    /// History restarts from the loaded document and nothing is selected.
    pub fn load_design(&mut self, record: &DesignRecord) {
        self.load_document(record.document());
        self.title.clone_from(&record.title);
        self.design_id = Some(record.id);
        tracing::info!("Loaded design {} ({} elements)", record.id, record.elements.len());
    }

    /// Replace the document with an unsaved payload.
    ///
    /// The next [`Editor::save_design`] will create a new design.
    pub fn load_payload(&mut self, payload: &DesignPayload) {
        self.load_document(Document::from_payload(payload));
        self.title.clone_from(&payload.title);
        self.design_id = None;
    }

    // -----------------------------------------------------------------------
    // Transient intents
    // -----------------------------------------------------------------------

    /// Set the selection. Unknown ids select nothing.
    pub fn select(&mut self, id: Option<ElementId>) {
        self.document = self.document.select(id);
        self.repaint();
    }

    /// Select the topmost element under `point`, or clear the selection.
    pub fn click(&mut self, point: Point) -> Option<ElementId> {
        let hit = hit_test(&self.document, point);
        self.select(hit);
        hit
    }

    /// Apply a patch without recording it, e.g. while dragging.
    ///
    /// The change becomes part of the next recorded snapshot.
    pub fn update_transient(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        if !self.document.contains(id) {
            return false;
        }
        self.document = self.document.update_element(id, patch);
        self.refresh();
        true
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Step back one snapshot. Returns `false` at the start of history.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            tracing::debug!("Nothing to undo");
            return false;
        }
        let snapshot = self.history.undo().clone();
        self.adopt(snapshot);
        true
    }

    /// Step forward one snapshot. Returns `false` at the end of history.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            tracing::debug!("Nothing to redo");
            return false;
        }
        let snapshot = self.history.redo().clone();
        self.adopt(snapshot);
        true
    }

    /// Whether [`Editor::undo`] would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether [`Editor::redo`] would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // -----------------------------------------------------------------------
    // Persistence and export
    // -----------------------------------------------------------------------

    /// Save the document through `repository`.
    ///
    /// Creates a design the first time and updates it afterwards.
    ///
    /// # Errors
    ///
    /// Returns the repository's error. The document, history and design id
    /// are left untouched in that case.
    pub async fn save_design(
        &mut self,
        repository: &dyn DesignRepository,
        owner: &str,
    ) -> EditorResult<DesignRecord> {
        let payload = self.document.to_payload(&self.title);
        let saved = match self.design_id {
            Some(id) => repository.update(owner, id, DesignUpdate::from(payload)).await,
            None => repository.create(owner, payload).await,
        };
        let record = saved.inspect_err(|e| tracing::warn!("Save failed: {e}"))?;

        self.design_id = Some(record.id);
        self.title.clone_from(&record.title);
        tracing::info!("Saved design {}", record.id);
        Ok(record)
    }

    /// Export the document, waiting for every image to decode first.
    ///
    /// # Errors
    ///
    /// Returns an error if the export surface cannot be allocated or
    /// encoding fails.
    pub async fn export(&self, format: ExportFormat) -> EditorResult<ExportedImage> {
        let bytes = self
            .exporter
            .export(&self.document, format, self.decoder.as_ref())
            .await?;
        Ok(ExportedImage {
            filename: export_filename(&self.title, format),
            format,
            bytes,
        })
    }

    /// Export the document as PNG.
    ///
    /// # Errors
    ///
    /// See [`Editor::export`].
    pub async fn export_png(&self) -> EditorResult<ExportedImage> {
        self.export(ExportFormat::Png).await
    }

    // -----------------------------------------------------------------------
    // Image decoding
    // -----------------------------------------------------------------------

    /// Wait for the next pending decode and apply it.
    ///
    /// Returns `None` when nothing is pending.
    pub async fn next_decode(&mut self) -> Option<DecodeEvent> {
        let DecodeOutcome { src, result } = self.decodes.next().await?;
        let key = SourceKey::of(&src);
        self.in_flight.remove(&key);

        let event = match result {
            Ok(handle) => {
                self.images.insert(&src, handle.clone());
                let ids = self.attach_source(&src, &handle);
                if ids.is_empty() {
                    tracing::debug!("Discarding decode for a source no element uses");
                    DecodeEvent::Discarded
                } else {
                    self.repaint();
                    DecodeEvent::Attached(ids)
                }
            }
            Err(e) => {
                tracing::warn!("Image decode failed: {e}");
                self.failed.insert(key);
                DecodeEvent::Failed(e.to_string())
            }
        };
        Some(event)
    }

    /// Apply every pending decode. Returns how many completed.
    pub async fn settle(&mut self) -> usize {
        let mut completed = 0;
        while self.next_decode().await.is_some() {
            completed += 1;
        }
        completed
    }

    /// Number of decodes still in flight.
    #[must_use]
    pub fn pending_decodes(&self) -> usize {
        self.decodes.len()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The live document, including transient changes and selection.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The undo/redo history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The selected element id, if any.
    #[must_use]
    pub fn selected(&self) -> Option<ElementId> {
        self.document.selected()
    }

    /// The live preview surface.
    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// What the last repaint drew.
    #[must_use]
    pub fn frame(&self) -> FrameStats {
        self.frame
    }

    /// Design title used for saving and export file names.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Rename the design. Not an undoable change.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Id of the stored design, once saved or loaded.
    #[must_use]
    pub fn design_id(&self) -> Option<DesignId> {
        self.design_id
    }

    /// Cache of decoded images.
    #[must_use]
    pub fn image_cache(&self) -> &ImageCache {
        &self.images
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn commit(&mut self, next: Document) {
        self.history.record(next.clone());
        self.document = next;
        self.refresh();
    }

    fn adopt(&mut self, snapshot: Document) {
        let selected = self.document.selected();
        self.document = snapshot.select(selected);
        self.refresh();
    }

    fn load_document(&mut self, document: Document) {
        let document = document.select(None);
        self.history.reset(document.clone());
        self.document = document;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.hydrate_images();
        self.repaint();
    }

    fn repaint(&mut self) {
        self.frame = self
            .renderer
            .render(&mut self.surface, &self.document, self.document.selected());
    }

    /// Attach cached pixels to pending images and queue decodes for the rest.
    fn hydrate_images(&mut self) {
        let mut sources: Vec<String> = self
            .document
            .pending_images()
            .filter_map(Element::image_src)
            .map(str::to_string)
            .collect();
        sources.dedup();

        for src in sources {
            match self.images.get(&src) {
                Some(handle) => {
                    self.attach_source(&src, &handle);
                }
                None => self.request_decode(src),
            }
        }
    }

    fn request_decode(&mut self, src: String) {
        let key = SourceKey::of(&src);
        if self.failed.contains(&key) || !self.in_flight.insert(key) {
            return;
        }
        let decoder = Arc::clone(&self.decoder);
        self.decodes.push(
            async move {
                let result = decode_source(&src, decoder.as_ref()).await;
                DecodeOutcome { src, result }
            }
            .boxed(),
        );
    }

    /// Attach `handle` to every undecoded image using `src`, in the live
    /// document and in the current snapshot. Returns the live element ids.
    fn attach_source(&mut self, src: &str, handle: &ImageHandle) -> Vec<ElementId> {
        let ids = waiting_on(&self.document, src);
        for id in &ids {
            self.document = self.document.attach_image(*id, handle.clone());
        }

        let snapshot_ids = waiting_on(self.history.current(), src);
        if !snapshot_ids.is_empty() {
            let mut snapshot = self.history.current().clone();
            for id in snapshot_ids {
                snapshot = snapshot.attach_image(id, handle.clone());
            }
            self.history.replace_current(snapshot);
        }
        ids
    }
}

fn waiting_on(document: &Document, src: &str) -> Vec<ElementId> {
    document
        .pending_images()
        .filter(|e| e.image_src() == Some(src))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use matty_renderer::RenderError;

    /// Decodes anything into a 1x1 opaque red pixel.
    struct RedDecoder;

    #[async_trait]
    impl ImageDecoder for RedDecoder {
        async fn decode(&self, _bytes: Vec<u8>) -> RenderResult<ImageHandle> {
            ImageHandle::from_premultiplied_rgba(1, 1, vec![255, 0, 0, 255])
                .ok_or_else(|| RenderError::Decode("bad".into()))
        }
    }

    /// Fails every decode.
    struct BrokenDecoder;

    #[async_trait]
    impl ImageDecoder for BrokenDecoder {
        async fn decode(&self, _bytes: Vec<u8>) -> RenderResult<ImageHandle> {
            Err(RenderError::Decode("corrupt".into()))
        }
    }

    fn editor_with(decoder: Arc<dyn ImageDecoder>) -> Editor {
        let config = EditorConfig {
            renderer: RendererConfig {
                load_system_fonts: false,
                ..RendererConfig::default()
            },
            ..EditorConfig::default()
        };
        Editor::new(config, decoder).expect("editor")
    }

    fn editor() -> Editor {
        editor_with(Arc::new(RedDecoder))
    }

    #[test]
    fn test_fresh_editor() {
        let editor = editor();
        assert!(editor.document().is_empty());
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
        assert_eq!(editor.title(), DEFAULT_TITLE);
        assert_eq!(editor.surface().pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_content_intents_record() {
        let mut editor = editor();
        let text = editor.add_text();
        editor.add_shape(Shape::Rectangle);
        editor.update_element(text, &ElementPatch::new().with_content("Hi"));
        editor.delete_element(text);

        assert_eq!(editor.history().len(), 5);
        assert_eq!(editor.history().step(), 4);
        assert_eq!(editor.document().len(), 1);
    }

    #[test]
    fn test_missing_ids_record_nothing() {
        let mut editor = editor();
        editor.add_shape(Shape::Circle);
        assert!(!editor.update_element(ElementId::new(), &ElementPatch::new().with_color("#000")));
        assert!(!editor.delete_element(ElementId::new()));
        assert_eq!(editor.history().len(), 2);
    }

    #[test]
    fn test_selection_is_transient() {
        let mut editor = editor();
        let id = editor.add_shape(Shape::Rectangle);
        editor.select(Some(id));
        editor.click(Point::new(10.0, 10.0));
        editor.click(Point::new(200.0, 200.0));

        assert_eq!(editor.selected(), Some(id));
        assert_eq!(editor.history().len(), 2);
        assert!(editor.frame().selection_drawn);
    }

    #[test]
    fn test_transient_update_folds_into_next_commit() {
        let mut editor = editor();
        let id = editor.add_shape(Shape::Rectangle);
        editor.update_transient(id, &ElementPatch::new().with_position(10.0, 10.0));
        assert_eq!(editor.history().len(), 2);
        assert!((editor.document().element(id).expect("exists").x - 10.0).abs() < f32::EPSILON);

        editor.add_text();
        let recorded = editor.history().current().element(id).expect("exists");
        assert!((recorded.x - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_undo_keeps_resolvable_selection() {
        let mut editor = editor();
        let rect = editor.add_shape(Shape::Rectangle);
        let circle = editor.add_shape(Shape::Circle);

        editor.select(Some(rect));
        assert!(editor.undo());
        assert_eq!(editor.selected(), Some(rect));

        editor.select(None);
        assert!(editor.redo());
        editor.select(Some(circle));
        assert!(editor.undo());
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_boundaries_are_no_ops() {
        let mut editor = editor();
        assert!(!editor.undo());
        editor.add_text();
        assert!(!editor.redo());
        assert!(editor.undo());
        assert!(!editor.undo());
        assert!(editor.document().is_empty());
    }

    #[tokio::test]
    async fn test_upload_paints_after_decode() {
        let mut editor = editor();
        let id = editor.upload_image(b"fake image bytes");

        assert_eq!(editor.frame().pending_images, 1);
        assert_eq!(editor.pending_decodes(), 1);

        let event = editor.next_decode().await.expect("one pending");
        assert_eq!(event, DecodeEvent::Attached(vec![id]));
        assert_eq!(editor.frame().pending_images, 0);
        let [r, g, b, a] = editor.surface().pixel(150, 150).expect("in bounds");
        assert!(r >= 250 && g <= 5 && b <= 5 && a == 255, "got {r},{g},{b},{a}");
        // attaching pixels is not an edit
        assert_eq!(editor.history().len(), 2);
        assert!(editor.history().current().pending_images().next().is_none());
    }

    #[tokio::test]
    async fn test_decode_for_deleted_element_is_discarded() {
        let mut editor = editor();
        let id = editor.upload_image(b"bytes");
        editor.delete_element(id);

        assert_eq!(editor.next_decode().await, Some(DecodeEvent::Discarded));
        assert!(editor.document().is_empty());
        assert_eq!(editor.next_decode().await, None);
    }

    #[tokio::test]
    async fn test_undo_restores_image_from_cache() {
        let mut editor = editor();
        let id = editor.upload_image(b"bytes");
        editor.settle().await;
        editor.delete_element(id);
        editor.undo();

        assert_eq!(editor.pending_decodes(), 0);
        assert!(editor.document().element(id).is_some_and(|e| !e.needs_decode()));
        assert_eq!(editor.frame().pending_images, 0);
    }

    #[tokio::test]
    async fn test_failed_decode_is_not_retried() {
        let mut editor = editor_with(Arc::new(BrokenDecoder));
        let id = editor.upload_image(b"bytes");

        assert!(matches!(editor.next_decode().await, Some(DecodeEvent::Failed(_))));
        editor.update_element(id, &ElementPatch::new().with_position(0.0, 0.0));
        assert_eq!(editor.pending_decodes(), 0);
        assert!(editor.document().element(id).is_some_and(Element::needs_decode));
    }

    #[tokio::test]
    async fn test_export_png_uses_title() {
        let mut editor = editor();
        editor.add_shape(Shape::Rectangle);
        editor.set_title("Launch Poster");

        let exported = editor.export_png().await.expect("export");
        assert_eq!(exported.filename, "Launch Poster.png");
        assert_eq!(exported.format, ExportFormat::Png);
        assert_eq!(&exported.bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    }
}
