//! Reconciliation of local drafts against server snapshots.
//!
//! The controller owns the draft store and remembers the latest server
//! snapshot per post. For each post it exposes:
//! - `display_form` - the draft if there is one, else the server data in
//!   local shape, else the all-defaults form
//! - `has_unsaved_changes` - whether a draft exists
//!
//! Writes always store a draft, even if the new form matches the server.
//! Right after every write and every snapshot change the controller runs a
//! reconciliation pass, which evicts the draft once it is canonically equal
//! to the snapshot. Nothing runs implicitly; each mutating method runs the
//! pass itself before returning.

use crate::models::{DraftPatch, DraftState, EntityId, LocalDraft, ServerSnapshot};
use crate::normalize::Normalizer;
use crate::storage::DraftStore;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// What the editor should show for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub id: EntityId,
    pub display_form: LocalDraft,
    pub has_unsaved_changes: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Nothing to reconcile
    NoDraft,
    /// Draft kept: no server snapshot has loaded yet
    AwaitingSnapshot,
    /// Draft kept: it differs from the snapshot on these canonical fields
    Diverged { fields: Vec<&'static str> },
    /// Draft matched the snapshot and was removed
    Evicted,
}

impl Reconciliation {
    pub fn evicted(&self) -> bool {
        matches!(self, Reconciliation::Evicted)
    }
}

/// Result of a form write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormUpdate {
    /// True if the write created the draft rather than replacing one
    pub created: bool,
    /// Outcome of the pass that ran after the write
    pub reconciliation: Reconciliation,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub id: EntityId,
    /// Whether a draft existed and was cleared
    pub cleared_draft: bool,
    /// Whether the saver returned a fresh snapshot that is now current
    pub snapshot_updated: bool,
    /// Why the draft could not be cleared after the server accepted it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_error: Option<String>,
}

/// Error type returned by [`PostSaver`] implementations.
pub type SaveError = Box<dyn std::error::Error + Send + Sync>;

/// Persists a post to the server.
///
/// Implementations perform the actual update request. Returning the
/// post as the server now has it is optional.
pub trait PostSaver {
    fn save(
        &mut self,
        id: &EntityId,
        form: &LocalDraft,
    ) -> std::result::Result<Option<ServerSnapshot>, SaveError>;
}

impl<F> PostSaver for F
where
    F: FnMut(&EntityId, &LocalDraft) -> std::result::Result<Option<ServerSnapshot>, SaveError>,
{
    fn save(
        &mut self,
        id: &EntityId,
        form: &LocalDraft,
    ) -> std::result::Result<Option<ServerSnapshot>, SaveError> {
        self(id, form)
    }
}

/// Controller handle for use from more than one execution context.
pub type SharedController = Arc<Mutex<ReconciliationController>>;

/// Decides what to display for each post and when to drop its draft.
#[derive(Debug)]
pub struct ReconciliationController {
    store: DraftStore,
    normalizer: Normalizer,
    snapshots: HashMap<EntityId, ServerSnapshot>,
}

impl ReconciliationController {
    pub fn new(store: DraftStore, normalizer: Normalizer) -> Self {
        Self {
            store,
            normalizer,
            snapshots: HashMap::new(),
        }
    }

    /// Wrap the controller in a mutex so one owner mutates at a time.
    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Give back the store, dropping in-memory snapshots.
    pub fn into_store(self) -> DraftStore {
        self.store
    }

    /// Latest server snapshot for `id`, `None` while loading.
    pub fn snapshot(&self, id: &EntityId) -> Option<&ServerSnapshot> {
        self.snapshots.get(id)
    }

    pub fn display_form(&self, id: &EntityId) -> LocalDraft {
        if let Some(draft) = self.store.get(id) {
            return draft.clone();
        }
        self.normalizer
            .project_server_to_display(self.snapshots.get(id))
            .unwrap_or_else(|| self.normalizer.default_form())
    }

    pub fn has_unsaved_changes(&self, id: &EntityId) -> bool {
        self.store.contains(id)
    }

    pub fn draft_state(&self, id: &EntityId) -> DraftState {
        if self.store.contains(id) {
            DraftState::Present
        } else {
            DraftState::Absent
        }
    }

    pub fn view(&self, id: &EntityId) -> FormView {
        FormView {
            id: id.clone(),
            display_form: self.display_form(id),
            has_unsaved_changes: self.has_unsaved_changes(id),
        }
    }

    /// Write the edited form for `id`, then reconcile.
    ///
    /// Fields missing from `form` are taken from the existing draft, or from
    /// the default form if there is none. Pass a full [`LocalDraft`] to
    /// replace the draft outright.
    pub fn set_form(&mut self, id: &EntityId, form: impl Into<DraftPatch>) -> Result<FormUpdate> {
        let created = !self.store.contains(id);
        let normalizer = &self.normalizer;
        self.store
            .update_with(id, form.into(), || normalizer.default_form())?;
        debug!(id = %id, created, "form written");

        let reconciliation = self.reconcile(id)?;
        Ok(FormUpdate {
            created,
            reconciliation,
        })
    }

    /// Drop the draft for `id`. Used on explicit reset and after a save.
    pub fn clear_form(&mut self, id: &EntityId) -> Result<bool> {
        self.store.clear(id)
    }

    /// Record the server's current copy of `id` (`None` while loading),
    /// then reconcile.
    pub fn receive_snapshot(
        &mut self,
        id: &EntityId,
        snapshot: Option<ServerSnapshot>,
    ) -> Result<Reconciliation> {
        match snapshot {
            Some(snapshot) => {
                if &snapshot.id != id {
                    return Err(Error::InvalidInput(format!(
                        "snapshot for {} delivered as {}",
                        snapshot.id, id
                    )));
                }
                self.snapshots.insert(id.clone(), snapshot);
            }
            None => {
                self.snapshots.remove(id);
            }
        }
        self.reconcile(id)
    }

    /// Evict the draft for `id` if it is equivalent to the current snapshot.
    pub fn reconcile(&mut self, id: &EntityId) -> Result<Reconciliation> {
        let Some(draft) = self.store.get(id) else {
            return Ok(Reconciliation::NoDraft);
        };
        let Some(snapshot) = self.snapshots.get(id) else {
            return Ok(Reconciliation::AwaitingSnapshot);
        };

        if !self.normalizer.is_equivalent(Some(draft), Some(snapshot)) {
            let fields = self.normalizer.divergent_fields(Some(draft), Some(snapshot));
            return Ok(Reconciliation::Diverged { fields });
        }

        self.store.clear(id)?;
        info!(id = %id, "draft converged with server, evicted");
        Ok(Reconciliation::Evicted)
    }

    /// Run a pass for every post that has both a draft and a snapshot.
    pub fn reconcile_all(&mut self) -> Result<Vec<(EntityId, Reconciliation)>> {
        let ids: Vec<EntityId> = self
            .store
            .ids()
            .filter(|id| self.snapshots.contains_key(*id))
            .cloned()
            .collect();

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.reconcile(&id)?;
            outcomes.push((id, outcome));
        }
        Ok(outcomes)
    }

    /// Send the displayed form to the server through `saver`.
    ///
    /// On success a returned snapshot becomes current and the draft is
    /// cleared. A save the server accepted is never reported as an error:
    /// if the store cannot drop the draft, it stays and the outcome carries
    /// `clear_error`. On failure the draft is left exactly as it was.
    pub fn save<S: PostSaver + ?Sized>(&mut self, id: &EntityId, saver: &mut S) -> Result<SaveOutcome> {
        let form = self.display_form(id);
        match saver.save(id, &form) {
            Ok(updated) => {
                let snapshot_updated = updated.is_some();
                if let Some(snapshot) = updated {
                    self.snapshots.insert(id.clone(), snapshot);
                }
                let (cleared_draft, clear_error) = match self.clear_form(id) {
                    Ok(cleared) => (cleared, None),
                    Err(e) => {
                        warn!(id = %id, error = %e, "post saved but draft could not be cleared");
                        (false, Some(e.to_string()))
                    }
                };
                info!(id = %id, cleared_draft, "post saved");
                Ok(SaveOutcome {
                    id: id.clone(),
                    cleared_draft,
                    snapshot_updated,
                    clear_error,
                })
            }
            Err(e) => {
                warn!(id = %id, error = %e, "save failed, keeping draft");
                Err(Error::Save(e.to_string()))
            }
        }
    }
}
