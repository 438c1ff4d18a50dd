//! Design persistence.
//!
//! [`DesignRepository`] is the collaborator the editor saves through and the
//! HTTP API serves from. [`DesignStore`] is the in-process implementation: a
//! thread-safe map shared across handlers, optionally mirrored to one JSON
//! file per design.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::{DesignId, DesignPayload, DesignRecord, DesignUpdate};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No design with this id exists for the caller.
    #[error("Design not found: {0}")]
    NotFound(DesignId),
    /// The request was rejected before reaching storage.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A remote repository could not complete the request.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Async persistence collaborator for designs.
///
/// Every operation is scoped to an owner. A design owned by someone else is
/// reported as [`StoreError::NotFound`].
#[async_trait]
pub trait DesignRepository: Send + Sync {
    /// Store a new design and return the created record.
    async fn create(&self, owner: &str, payload: DesignPayload) -> Result<DesignRecord, StoreError>;

    /// All designs of `owner`, most recently updated first.
    async fn list(&self, owner: &str) -> Result<Vec<DesignRecord>, StoreError>;

    /// Fetch one design.
    async fn get(&self, owner: &str, id: DesignId) -> Result<DesignRecord, StoreError>;

    /// Merge a partial update into an existing design.
    async fn update(
        &self,
        owner: &str,
        id: DesignId,
        update: DesignUpdate,
    ) -> Result<DesignRecord, StoreError>;

    /// Remove a design.
    async fn delete(&self, owner: &str, id: DesignId) -> Result<(), StoreError>;
}

/// Thread-safe design storage shared across HTTP handlers.
///
/// # Example
///
/// ```
/// use matty_core::store::DesignStore;
/// use matty_core::DesignPayload;
///
/// let store = DesignStore::new();
/// let record = store.create("alice", DesignPayload::default());
/// assert_eq!(store.list("alice").len(), 1);
/// assert!(store.get("bob", record.id).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DesignStore {
    designs: Arc<RwLock<HashMap<DesignId, DesignRecord>>>,
    /// Optional data directory for filesystem persistence.
    data_dir: Option<PathBuf>,
    /// Last timestamp handed out, so modification times strictly increase.
    clock: Arc<AtomicU64>,
}

impl DesignStore {
    /// Create an empty store without persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store persisted under `data_dir`.
    ///
    /// The directory is created if it doesn't exist and every `*.json` design
    /// already in it is loaded. Files that fail to parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created or read.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let designs = load_dir(&data_dir)?;
        let latest = designs.values().map(|r| r.updated_at).max().unwrap_or(0);
        tracing::info!(
            "Loaded {} persisted designs from {}",
            designs.len(),
            data_dir.display()
        );
        Ok(Self {
            designs: Arc::new(RwLock::new(designs)),
            data_dir: Some(data_dir),
            clock: Arc::new(AtomicU64::new(latest)),
        })
    }

    /// Persistence directory, if any.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Store a new design.
    #[must_use]
    pub fn create(&self, owner: &str, payload: DesignPayload) -> DesignRecord {
        let record = DesignRecord::from_payload(owner, payload, self.next_timestamp());
        {
            let mut designs = self
                .designs
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            designs.insert(record.id, record.clone());
            self.persist(&record);
        }
        tracing::debug!("Created design {} for {owner}", record.id);
        record
    }

    /// All designs of `owner`, most recently updated first.
    #[must_use]
    pub fn list(&self, owner: &str) -> Vec<DesignRecord> {
        let designs = self
            .designs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut owned: Vec<DesignRecord> = designs
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        owned
    }

    /// Fetch one design.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design is missing or owned by
    /// someone else.
    pub fn get(&self, owner: &str, id: DesignId) -> Result<DesignRecord, StoreError> {
        let designs = self
            .designs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        designs
            .get(&id)
            .filter(|r| r.owner == owner)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Merge a partial update into an existing design.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design is missing or owned by
    /// someone else.
    pub fn update(
        &self,
        owner: &str,
        id: DesignId,
        update: DesignUpdate,
    ) -> Result<DesignRecord, StoreError> {
        let record = {
            let mut designs = self
                .designs
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let record = designs
                .get_mut(&id)
                .filter(|r| r.owner == owner)
                .ok_or(StoreError::NotFound(id))?;
            record.apply(update, self.next_timestamp());
            let record = record.clone();
            // the file is written under the lock so a concurrent delete cannot be undone
            self.persist(&record);
            record
        };
        Ok(record)
    }

    /// Remove a design.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design is missing or owned by
    /// someone else.
    pub fn delete(&self, owner: &str, id: DesignId) -> Result<(), StoreError> {
        {
            let mut designs = self
                .designs
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !designs.get(&id).is_some_and(|r| r.owner == owner) {
                return Err(StoreError::NotFound(id));
            }
            designs.remove(&id);
            self.delete_file(id);
        }
        tracing::debug!("Deleted design {id}");
        Ok(())
    }

    /// Total number of designs across all owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.designs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no designs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the design map is still sound.
    ///
    /// Returns `false` once a thread panicked while holding the write lock.
    /// Operations keep working on the recovered map, but the last write may
    /// be partial.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.designs.is_poisoned()
    }

    fn next_timestamp(&self) -> u64 {
        let now = current_timestamp_ms();
        let mut last = self.clock.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .clock
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn design_path(data_dir: &Path, id: DesignId) -> PathBuf {
        data_dir.join(format!("{}.json", sanitize_filename(&id.to_string())))
    }

    /// Save a design to disk as JSON.
    ///
    /// No-op if the store was created without a data directory.
    fn persist(&self, record: &DesignRecord) {
        let Some(ref data_dir) = self.data_dir else {
            return;
        };
        let json = match serde_json::to_string_pretty(record) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize design {}: {e}", record.id);
                return;
            }
        };
        let path = Self::design_path(data_dir, record.id);
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!(
                "Failed to persist design {} to {}: {e}",
                record.id,
                path.display()
            );
        }
    }

    fn delete_file(&self, id: DesignId) {
        let Some(ref data_dir) = self.data_dir else {
            return;
        };
        let path = Self::design_path(data_dir, id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to delete design file {}: {e}", path.display());
            }
        }
    }
}

#[async_trait]
impl DesignRepository for DesignStore {
    async fn create(&self, owner: &str, payload: DesignPayload) -> Result<DesignRecord, StoreError> {
        Ok(DesignStore::create(self, owner, payload))
    }

    async fn list(&self, owner: &str) -> Result<Vec<DesignRecord>, StoreError> {
        Ok(DesignStore::list(self, owner))
    }

    async fn get(&self, owner: &str, id: DesignId) -> Result<DesignRecord, StoreError> {
        DesignStore::get(self, owner, id)
    }

    async fn update(
        &self,
        owner: &str,
        id: DesignId,
        update: DesignUpdate,
    ) -> Result<DesignRecord, StoreError> {
        DesignStore::update(self, owner, id, update)
    }

    async fn delete(&self, owner: &str, id: DesignId) -> Result<(), StoreError> {
        DesignStore::delete(self, owner, id)
    }
}

fn load_dir(data_dir: &Path) -> Result<HashMap<DesignId, DesignRecord>, StoreError> {
    let mut designs = HashMap::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if !path.extension().is_some_and(|ext| ext == "json") {
            continue;
        }
        match load_file(&path) {
            Ok(record) => {
                designs.insert(record.id, record);
            }
            Err(e) => tracing::warn!("Skipping {}: {e}", path.display()),
        }
    }
    Ok(designs)
}

fn load_file(path: &Path) -> Result<DesignRecord, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Sanitize an identifier for use as a filename.
///
/// Replaces any character that is not alphanumeric, `-`, or `_` with `_`.
fn sanitize_filename(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
