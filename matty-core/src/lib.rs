//! # Matty Core
//!
//! Design model for the Matty canvas editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 matty-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Element Model   │  Document Store          │
//! │  - Text/shapes   │  - Pure add/update/del   │
//! │  - Images        │  - Selection             │
//! ├─────────────────────────────────────────────┤
//! │  History         │  Hit-Tester              │
//! │  - Snapshots     │  - Topmost element       │
//! │  - Undo/redo     │  - Circle/box geometry   │
//! ├─────────────────────────────────────────────┤
//! │  Design records and persistence store       │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod element;
pub mod error;
pub mod history;
pub mod schema;
pub mod store;

pub use document::{Document, DEFAULT_BACKGROUND};
pub use element::{
    Bounds, Element, ElementId, ElementKind, ElementPatch, ImageHandle, Point, Size,
    DEFAULT_FONT_SIZE, DEFAULT_FONT_WEIGHT, DEFAULT_SHAPE_COLOR, DEFAULT_TEXT_COLOR,
    TEXT_HIT_BOX,
};
pub use error::{DesignError, DesignResult};
pub use history::History;
pub use hit_test::{hit_test, hit_test_all};
pub use schema::{DesignId, DesignPayload, DesignRecord, DesignUpdate, DEFAULT_TITLE};
pub use store::{DesignRepository, DesignStore, StoreError};

/// Matty core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
