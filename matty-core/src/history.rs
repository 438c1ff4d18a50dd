//! Linear undo/redo history of document snapshots.
//!
//! ```text
//! snapshots: [s0] [s1] [s2] [s3]
//!                       ^ step
//! record(s4):  [s0] [s1] [s2] [s4]     (s3 pruned)
//! ```

use crate::Document;

/// Linear undo/redo stack of immutable document snapshots.
///
/// Invariant: `step < snapshots.len()` and there is always at least one
/// snapshot.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Document>,
    step: usize,
    limit: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl History {
    /// Start a history whose only snapshot is `initial`.
    #[must_use]
    pub fn new(initial: Document) -> Self {
        Self {
            snapshots: vec![initial],
            step: 0,
            limit: None,
        }
    }

    /// Bound the number of snapshots kept; the oldest are dropped first.
    ///
    /// A limit below 1 is treated as 1.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self.enforce_limit();
        self
    }

    /// Record the document produced by a content-changing intent.
    ///
    /// Any redoable snapshots past the cursor are discarded first.
    pub fn record(&mut self, document: Document) {
        self.snapshots.truncate(self.step + 1);
        self.snapshots.push(document);
        self.step = self.snapshots.len() - 1;
        self.enforce_limit();
    }

    /// Step back one snapshot and return it.
    ///
    /// At the first snapshot this is a no-op returning the current one.
    pub fn undo(&mut self) -> &Document {
        if self.can_undo() {
            self.step -= 1;
        } else {
            tracing::debug!("Nothing to undo");
        }
        self.current()
    }

    /// Step forward one snapshot and return it.
    ///
    /// At the last snapshot this is a no-op returning the current one.
    pub fn redo(&mut self) -> &Document {
        if self.can_redo() {
            self.step += 1;
        } else {
            tracing::debug!("Nothing to redo");
        }
        self.current()
    }

    /// Whether [`History::undo`] would move the cursor.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.step > 0
    }

    /// Whether [`History::redo`] would move the cursor.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.step + 1 < self.snapshots.len()
    }

    /// The snapshot under the cursor.
    #[must_use]
    pub fn current(&self) -> &Document {
        &self.snapshots[self.step]
    }

    /// Replace the snapshot under the cursor without moving it.
    ///
    /// For changes that are not user edits but must survive an undo/redo
    /// round-trip, such as decoded image pixels.
    pub fn replace_current(&mut self, document: Document) {
        self.snapshots[self.step] = document;
    }

    /// Drop everything and start over from a single snapshot.
    pub fn reset(&mut self, document: Document) {
        self.snapshots.clear();
        self.snapshots.push(document);
        self.step = 0;
    }

    /// Cursor position.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of snapshots held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false; a history holds at least one snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// All snapshots, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> &[Document] {
        &self.snapshots
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.snapshots.len() > limit {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
            self.step = self.step.saturating_sub(excess);
        }
    }
}
