//! Serialized design records shared by the store, the HTTP API and the editor.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DesignError, DesignResult, Document, Element};

/// Title given to designs saved without one.
pub const DEFAULT_TITLE: &str = "Untitled Design";

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// Unique identifier for a stored design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignId(Uuid);

impl DesignId {
    /// Generate a new random design id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a design id from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::InvalidId`] if `value` is not a UUID.
    pub fn parse(value: &str) -> DesignResult<Self> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| DesignError::InvalidId(value.to_string()))
    }
}

impl Default for DesignId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DesignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DesignId {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The save/load shape of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignPayload {
    /// Human-readable title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Elements in paint order.
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Default for DesignPayload {
    fn default() -> Self {
        Self {
            title: default_title(),
            elements: Vec::new(),
        }
    }
}

impl DesignPayload {
    /// Create a payload with the given title and elements.
    #[must_use]
    pub fn new(title: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            title: title.into(),
            elements,
        }
    }

    /// Parse a payload from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a design.
    pub fn from_json(json: &str) -> DesignResult<Self> {
        serde_json::from_str(json).map_err(DesignError::Serialization)
    }
}

/// A design as held by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    /// Design identifier.
    pub id: DesignId,
    /// Opaque id of the owning user.
    pub owner: String,
    /// Human-readable title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Elements in paint order.
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Optional preview image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Free-form canvas settings stored alongside the elements.
    #[serde(default)]
    pub canvas_data: serde_json::Value,
    /// Creation time, ms since the Unix epoch.
    pub created_at: u64,
    /// Last modification time, ms since the Unix epoch.
    pub updated_at: u64,
}

impl DesignRecord {
    /// Build a fresh record from a payload.
    #[must_use]
    pub fn from_payload(owner: impl Into<String>, payload: DesignPayload, now_ms: u64) -> Self {
        Self {
            id: DesignId::new(),
            owner: owner.into(),
            title: payload.title,
            elements: clamped(payload.elements),
            thumbnail_url: None,
            canvas_data: serde_json::Value::Null,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Merge a partial update, bumping `updated_at`.
    pub fn apply(&mut self, update: DesignUpdate, now_ms: u64) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(elements) = update.elements {
            self.elements = clamped(elements);
        }
        if let Some(url) = update.thumbnail_url {
            self.thumbnail_url = Some(url);
        }
        if let Some(data) = update.canvas_data {
            self.canvas_data = data;
        }
        self.updated_at = now_ms.max(self.updated_at);
    }

    /// The title and elements as a payload.
    #[must_use]
    pub fn payload(&self) -> DesignPayload {
        DesignPayload::new(self.title.clone(), self.elements.clone())
    }

    /// Build a document from the stored elements.
    #[must_use]
    pub fn document(&self) -> Document {
        Document::from_elements(self.elements.iter().cloned())
    }
}

fn clamped(mut elements: Vec<Element>) -> Vec<Element> {
    elements.iter_mut().for_each(Element::clamp_sizes);
    elements
}

/// A partial update to a stored design. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement element list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Element>>,
    /// New preview image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Replacement canvas settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_data: Option<serde_json::Value>,
}

impl From<DesignPayload> for DesignUpdate {
    fn from(payload: DesignPayload) -> Self {
        Self {
            title: Some(payload.title),
            elements: Some(payload.elements),
            ..Self::default()
        }
    }
}

impl Document {
    /// Package the elements for saving under `title`.
    ///
    /// An empty title falls back to [`DEFAULT_TITLE`].
    #[must_use]
    pub fn to_payload(&self, title: &str) -> DesignPayload {
        let title = if title.trim().is_empty() {
            default_title()
        } else {
            title.to_string()
        };
        DesignPayload::new(title, self.elements().to_vec())
    }

    /// Build a document from a loaded payload, with nothing selected.
    #[must_use]
    pub fn from_payload(payload: &DesignPayload) -> Self {
        Self::from_elements(payload.elements.iter().cloned())
    }
}
