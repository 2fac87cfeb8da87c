//! Storage layer for local drafts.
//!
//! This module persists the mapping from post id to the user's in-progress
//! draft, so edits survive reloads and crashes.
//!
//! ## Persisted record
//!
//! Everything lives in one record under the fixed key [`DRAFT_STORAGE_KEY`]:
//!
//! ```json
//! { "version": 1, "state": { "drafts": { "42": { "post_title": "...", ... } } } }
//! ```
//!
//! Nothing else is persisted. The order of `drafts` is recency order, least
//! recently written first, which is what the optional capacity limit evicts
//! by.
//!
//! ## Corruption
//!
//! A record that cannot be read or parsed is logged and replaced by an empty
//! mapping. Opening a store never fails.

pub mod backend;

pub use backend::{BackendType, FileBackend, MemoryBackend, StorageBackend};

use crate::models::{DraftPatch, EntityId, LocalDraft};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed key of the persisted draft record.
pub const DRAFT_STORAGE_KEY: &str = "post-drafts";

/// Format version written into the record.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PD_DATA_DIR";

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    state: StateRef<'a>,
}

#[derive(Serialize)]
struct StateRef<'a> {
    drafts: &'a IndexMap<EntityId, LocalDraft>,
}

#[derive(Deserialize)]
struct Record {
    version: u32,
    state: State,
}

#[derive(Deserialize)]
struct State {
    #[serde(default)]
    drafts: IndexMap<EntityId, LocalDraft>,
}

/// Persisted mapping of post id to local draft.
///
/// Holds at most one draft per id. Every mutation is written through to the
/// backend before returning.
pub struct DraftStore {
    backend: Box<dyn StorageBackend>,
    drafts: IndexMap<EntityId, LocalDraft>,
    max_drafts: Option<usize>,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("location", &self.backend.location())
            .field("drafts", &self.drafts.len())
            .field("max_drafts", &self.max_drafts)
            .finish()
    }
}

impl DraftStore {
    /// Open a store over the given backend, loading whatever it holds.
    pub fn open(backend: impl StorageBackend + 'static) -> Self {
        Self::open_boxed(Box::new(backend))
    }

    /// Open a store over an already boxed backend.
    pub fn open_boxed(backend: Box<dyn StorageBackend>) -> Self {
        let drafts = load_drafts(backend.as_ref());
        debug!(
            location = %backend.location(),
            drafts = drafts.len(),
            "opened draft store"
        );
        Self {
            backend,
            drafts,
            max_drafts: None,
        }
    }

    /// Open the file-backed store in `data_dir`.
    pub fn open_in(data_dir: &Path) -> Self {
        Self::open(FileBackend::new(data_dir, DRAFT_STORAGE_KEY))
    }

    /// A fresh store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Limit the number of stored drafts. `None` (or zero) means unbounded.
    pub fn with_max_drafts(mut self, max_drafts: Option<usize>) -> Self {
        self.max_drafts = max_drafts.filter(|&n| n > 0);
        self
    }

    pub fn max_drafts(&self) -> Option<usize> {
        self.max_drafts
    }

    pub fn get(&self, id: &EntityId) -> Option<&LocalDraft> {
        self.drafts.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.drafts.contains_key(id)
    }

    /// Replace the draft for `id` unconditionally.
    pub fn set(&mut self, id: &EntityId, draft: LocalDraft) -> Result<()> {
        self.write(id, draft)
    }

    /// Merge `patch` into the draft for `id`, starting from
    /// `LocalDraft::default()` when there is none.
    pub fn update(&mut self, id: &EntityId, patch: DraftPatch) -> Result<&LocalDraft> {
        self.update_with(id, patch, LocalDraft::default)
    }

    /// Merge `patch` into the draft for `id`, starting from `base()` when
    /// there is none.
    pub fn update_with<F>(&mut self, id: &EntityId, patch: DraftPatch, base: F) -> Result<&LocalDraft>
    where
        F: FnOnce() -> LocalDraft,
    {
        let mut draft = self.drafts.get(id).cloned().unwrap_or_else(base);
        patch.apply_to(&mut draft);
        self.write(id, draft)?;
        self.drafts
            .get(id)
            .ok_or_else(|| Error::Other(format!("draft for {} vanished after write", id)))
    }

    /// Remove the draft for `id`. Returns whether one existed.
    ///
    /// If persisting fails the draft stays, in memory and on disk.
    pub fn clear(&mut self, id: &EntityId) -> Result<bool> {
        if !self.drafts.contains_key(id) {
            return Ok(false);
        }
        let mut next = self.drafts.clone();
        next.shift_remove(id);
        self.commit(next)?;
        info!(id = %id, "cleared draft");
        Ok(true)
    }

    /// Remove every draft. Returns how many were removed.
    pub fn clear_all(&mut self) -> Result<usize> {
        let count = self.drafts.len();
        if count > 0 {
            self.commit(IndexMap::new())?;
            info!(count, "cleared all drafts");
        }
        Ok(count)
    }

    /// Ids with a stored draft, least recently written first.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.drafts.keys()
    }

    /// Stored drafts, least recently written first.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &LocalDraft)> {
        self.drafts.iter()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Where the record is persisted (for display purposes).
    pub fn location(&self) -> String {
        self.backend.location()
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    fn write(&mut self, id: &EntityId, draft: LocalDraft) -> Result<()> {
        let mut next = self.drafts.clone();
        // Re-inserting moves the id to the most recent end.
        next.shift_remove(id);
        next.insert(id.clone(), draft);
        let evicted = evict_over_capacity(&mut next, self.max_drafts);

        self.commit(next)?;
        for evicted_id in &evicted {
            info!(id = %evicted_id, max = ?self.max_drafts, "evicted least recently written draft");
        }
        debug!(id = %id, "wrote draft");
        Ok(())
    }

    /// Persist `next`, then make it the current mapping. On failure the
    /// current mapping is left untouched.
    fn commit(&mut self, next: IndexMap<EntityId, LocalDraft>) -> Result<()> {
        let record = RecordRef {
            version: STORE_FORMAT_VERSION,
            state: StateRef { drafts: &next },
        };
        let payload = serde_json::to_string(&record)?;
        if let Err(e) = self.backend.save(&payload) {
            warn!(location = %self.backend.location(), error = %e, "could not persist drafts, keeping previous state");
            return Err(e);
        }
        self.drafts = next;
        Ok(())
    }
}

/// Drop the least recently written drafts beyond `max`. Returns their ids.
fn evict_over_capacity(
    drafts: &mut IndexMap<EntityId, LocalDraft>,
    max: Option<usize>,
) -> Vec<EntityId> {
    let mut evicted = Vec::new();
    let Some(max) = max else {
        return evicted;
    };
    while drafts.len() > max {
        match drafts.shift_remove_index(0) {
            Some((id, _)) => evicted.push(id),
            None => break,
        }
    }
    evicted
}

/// Read the drafts out of a backend, degrading to empty on any failure.
fn load_drafts(backend: &dyn StorageBackend) -> IndexMap<EntityId, LocalDraft> {
    let payload = match backend.load() {
        Ok(Some(payload)) => payload,
        Ok(None) => return IndexMap::new(),
        Err(e) => {
            warn!(location = %backend.location(), error = %e, "could not read draft store, starting empty");
            return IndexMap::new();
        }
    };

    match serde_json::from_str::<Record>(&payload) {
        Ok(record) if record.version == STORE_FORMAT_VERSION => record.state.drafts,
        Ok(record) => {
            warn!(
                location = %backend.location(),
                version = record.version,
                expected = STORE_FORMAT_VERSION,
                "unsupported draft store version, starting empty"
            );
            IndexMap::new()
        }
        Err(e) => {
            warn!(location = %backend.location(), error = %e, "draft store is corrupted, starting empty");
            IndexMap::new()
        }
    }
}

/// Get the data directory holding the draft record and store config.
///
/// `PD_DATA_DIR` wins; otherwise `<platform data dir>/postdraft`.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("postdraft"))
}
