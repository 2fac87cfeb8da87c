//! Command implementations for the `pd` CLI.
//!
//! Each command opens the draft store from the data directory, builds a
//! controller around it, feeds in any server copies given on the command
//! line, and returns a result that renders as JSON or human text.
//! Server snapshots are never persisted; every invocation starts with only
//! the drafts on disk.

use crate::config::{
    CONFIG_KEYS, OutputFormat, ResolvedConfig, ValueSource, set_config_value, store_config_path,
};
use crate::models::{
    DraftPatch, DraftState, EntityId, FormRef, LocalDraft, ServerSnapshot, SourceKind,
};
use crate::reconcile::{
    FormView, Reconciliation, ReconciliationController, SaveError, SaveOutcome,
};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Everything a command needs: where the data lives and the resolved config.
#[derive(Debug, Clone)]
pub struct Context {
    pub data_dir: PathBuf,
    pub config: ResolvedConfig,
}

impl Context {
    pub fn new(data_dir: impl Into<PathBuf>, config: ResolvedConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
        }
    }

    /// Open the store and wrap it in a controller with the configured locale.
    pub fn controller(&self) -> ReconciliationController {
        ReconciliationController::new(
            self.config.open_store(&self.data_dir),
            self.config.normalizer(),
        )
    }
}

/// Validate a post ID given on the command line.
pub fn parse_id(raw: &str) -> Result<EntityId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId("post ID must not be empty".to_string()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidId(format!(
            "post ID contains control characters: {:?}",
            raw
        )));
    }
    Ok(EntityId::new(trimmed))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidInput(format!("cannot read {} {}: {}", what, path.display(), e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("invalid {} {}: {}", what, path.display(), e)))
}

/// Load a server snapshot from a JSON file.
pub fn load_snapshot(path: &Path) -> Result<ServerSnapshot> {
    read_json(path, "server snapshot")
}

/// Load a partial form from a JSON file.
pub fn load_patch(path: &Path) -> Result<DraftPatch> {
    read_json(path, "form")
}

fn describe(outcome: &Reconciliation) -> String {
    match outcome {
        Reconciliation::NoDraft => "no draft".to_string(),
        Reconciliation::AwaitingSnapshot => "draft kept (no server copy)".to_string(),
        Reconciliation::Diverged { fields } => {
            format!("draft kept (differs in {})", fields.join(", "))
        }
        Reconciliation::Evicted => "draft matched the server and was discarded".to_string(),
    }
}

fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

fn format_form(form: &LocalDraft) -> String {
    let tags = if form.tag_ids.is_empty() {
        "-".to_string()
    } else {
        form.tag_ids
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut lines = vec![
        format!("  Title:    {}", form.post_title),
        format!("  Content:  {} chars", form.content.chars().count()),
        format!("  Tags:     {}", tags),
        format!(
            "  Category: {}",
            form.category_id
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("  Public:   {}", yes_no(form.is_public)),
        format!("  Locale:   {}", form.locale.as_deref().unwrap_or("-")),
    ];
    if let Some(ref created) = form.created_at {
        lines.push(format!("  Created:  {}", created));
    }
    lines.push(format!("  Medium:   {}", yes_no(form.should_publish_medium)));
    lines.join("\n")
}

// === Show ===

#[derive(Serialize)]
pub struct ShowResult {
    #[serde(flatten)]
    pub view: FormView,
    pub draft_state: DraftState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
}

impl Output for ShowResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        let state = if self.view.has_unsaved_changes {
            "unsaved changes"
        } else {
            "no local changes"
        };
        lines.push(format!("Post {} ({})", self.view.id, state));
        if let Some(ref outcome) = self.reconciliation {
            lines.push(format!("  Reconcile: {}", describe(outcome)));
        }
        lines.push(format_form(&self.view.display_form));
        lines.join("\n")
    }
}

/// Show the display form for a post, reconciling against `server` first.
pub fn show(ctx: &Context, id: &str, server: Option<&Path>) -> Result<ShowResult> {
    let id = parse_id(id)?;
    let snapshot = server.map(load_snapshot).transpose()?;
    let mut controller = ctx.controller();

    let reconciliation = match snapshot {
        Some(snapshot) => Some(controller.receive_snapshot(&id, Some(snapshot))?),
        None => None,
    };

    Ok(ShowResult {
        view: controller.view(&id),
        draft_state: controller.draft_state(&id),
        reconciliation,
    })
}

// === Edit ===

#[derive(Serialize)]
pub struct EditResult {
    pub id: EntityId,
    pub created: bool,
    pub reconciliation: Reconciliation,
    pub has_unsaved_changes: bool,
    pub display_form: LocalDraft,
}

impl Output for EditResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let action = if self.created { "Created" } else { "Updated" };
        format!(
            "{} draft for post {}: {}\n{}",
            action,
            self.id,
            describe(&self.reconciliation),
            format_form(&self.display_form)
        )
    }
}

/// Apply `patch` to what the editor currently shows for `id` and write the
/// result as the post's form.
///
/// Starting from the display form means a partial edit keeps the server's
/// values for fields it doesn't touch.
pub fn edit(ctx: &Context, id: &str, server: Option<&Path>, patch: DraftPatch) -> Result<EditResult> {
    let id = parse_id(id)?;
    let snapshot = server.map(load_snapshot).transpose()?;
    let mut controller = ctx.controller();

    if let Some(snapshot) = snapshot {
        controller.receive_snapshot(&id, Some(snapshot))?;
    }

    let mut form = controller.display_form(&id);
    patch.apply_to(&mut form);
    let update = controller.set_form(&id, form)?;

    Ok(EditResult {
        id: id.clone(),
        created: update.created,
        reconciliation: update.reconciliation,
        has_unsaved_changes: controller.has_unsaved_changes(&id),
        display_form: controller.display_form(&id),
    })
}

// === Reconcile ===

#[derive(Serialize)]
pub struct ReconcileResult {
    pub id: EntityId,
    #[serde(flatten)]
    pub reconciliation: Reconciliation,
    pub has_unsaved_changes: bool,
}

impl Output for ReconcileResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("Post {}: {}", self.id, describe(&self.reconciliation))
    }
}

/// Reconcile the stored draft for `id` against a server copy.
pub fn reconcile(ctx: &Context, id: &str, server: &Path) -> Result<ReconcileResult> {
    let id = parse_id(id)?;
    let snapshot = load_snapshot(server)?;
    let mut controller = ctx.controller();

    let reconciliation = controller.receive_snapshot(&id, Some(snapshot))?;
    Ok(ReconcileResult {
        has_unsaved_changes: controller.has_unsaved_changes(&id),
        id,
        reconciliation,
    })
}

// === Reset ===

#[derive(Serialize)]
pub struct ResetResult {
    pub id: EntityId,
    pub cleared: bool,
}

impl Output for ResetResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.cleared {
            format!("Discarded draft for post {}", self.id)
        } else {
            format!("No draft for post {}", self.id)
        }
    }
}

/// Discard the draft for `id`.
pub fn reset(ctx: &Context, id: &str) -> Result<ResetResult> {
    let id = parse_id(id)?;
    let mut controller = ctx.controller();
    let cleared = controller.clear_form(&id)?;
    Ok(ResetResult { id, cleared })
}

// === Saved ===

#[derive(Debug, Serialize)]
pub struct SavedResult {
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

impl Output for SavedResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if let Some(err) = &self.outcome.clear_error {
            format!("Post {} saved, but the draft was kept: {}", self.outcome.id, err)
        } else if self.outcome.cleared_draft {
            format!("Post {} saved, draft cleared", self.outcome.id)
        } else {
            format!("Post {} saved, no draft to clear", self.outcome.id)
        }
    }
}

/// Record that the displayed form of `id` reached the server.
///
/// `server` is the copy the server returned, if any.
pub fn saved(ctx: &Context, id: &str, server: Option<&Path>) -> Result<SavedResult> {
    let id = parse_id(id)?;
    let mut returned = server.map(load_snapshot).transpose()?;
    if let Some(ref snapshot) = returned {
        if snapshot.id != id {
            return Err(Error::InvalidInput(format!(
                "server copy is for post {}, not {}",
                snapshot.id, id
            )));
        }
    }

    let mut controller = ctx.controller();
    let mut saver = |_: &EntityId,
                     _: &LocalDraft|
     -> std::result::Result<Option<ServerSnapshot>, SaveError> { Ok(returned.take()) };
    let outcome = controller.save(&id, &mut saver)?;
    Ok(SavedResult { outcome })
}

// === List ===

#[derive(Serialize)]
pub struct DraftSummary {
    pub id: EntityId,
    pub post_title: String,
    pub tag_count: usize,
}

#[derive(Serialize)]
pub struct DraftList {
    pub drafts: Vec<DraftSummary>,
    pub count: usize,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drafts: Option<usize>,
}

impl Output for DraftList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.drafts.is_empty() {
            return "No drafts.".to_string();
        }

        let mut lines = vec![format!("{} draft(s) in {}:", self.count, self.location)];
        for draft in &self.drafts {
            let title = if draft.post_title.is_empty() {
                "(untitled)"
            } else {
                draft.post_title.as_str()
            };
            lines.push(format!(
                "  {}  {}  [{} tag(s)]",
                draft.id, title, draft.tag_count
            ));
        }
        lines.join("\n")
    }
}

/// List stored drafts, least recently written first.
pub fn list(ctx: &Context) -> Result<DraftList> {
    let store = ctx.config.open_store(&ctx.data_dir);
    let drafts: Vec<DraftSummary> = store
        .iter()
        .map(|(id, draft)| DraftSummary {
            id: id.clone(),
            post_title: draft.post_title.clone(),
            tag_count: draft.tag_ids.len(),
        })
        .collect();

    Ok(DraftList {
        count: drafts.len(),
        drafts,
        location: store.location(),
        max_drafts: store.max_drafts(),
    })
}

// === Key ===

#[derive(Serialize)]
pub struct KeyResult {
    pub kind: SourceKind,
    pub key: String,
}

impl Output for KeyResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        self.key.clone()
    }
}

/// Print the equality key of form data read from `path`.
pub fn key(ctx: &Context, path: &Path, kind: SourceKind) -> Result<KeyResult> {
    let normalizer = ctx.config.normalizer();
    let key = match kind {
        SourceKind::Server => {
            let snapshot = load_snapshot(path)?;
            normalizer.equality_key(Some(FormRef::Server(&snapshot)))
        }
        SourceKind::Local => {
            let draft: LocalDraft = read_json(path, "local form")?;
            normalizer.equality_key(Some(FormRef::Local(&draft)))
        }
    };

    let key = key.ok_or_else(|| Error::Other("failed to compute equality key".to_string()))?;
    Ok(KeyResult { kind, key })
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: serde_json::Value,
    pub source: String,
}

#[derive(Serialize)]
pub struct ConfigShow {
    pub entries: Vec<ConfigEntry>,
    pub store_config: String,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for entry in &self.entries {
            let value = match entry.value {
                serde_json::Value::Null => "(unset)".to_string(),
                serde_json::Value::String(ref s) => s.clone(),
                ref other => other.to_string(),
            };
            lines.push(format!("{:<15} {:<20} ({})", entry.key, value, entry.source));
        }
        lines.push(format!("Store config: {}", self.store_config));
        lines.join("\n")
    }
}

/// Show every config key with its resolved value and source.
pub fn config_show(ctx: &Context) -> Result<ConfigShow> {
    let config = &ctx.config;
    let log_file = match config.log_file {
        Some(ref resolved) => (
            serde_json::json!(resolved.value.display().to_string()),
            resolved.source.to_string(),
        ),
        None => (serde_json::Value::Null, ValueSource::Default.to_string()),
    };

    let entries = vec![
        ConfigEntry {
            key: "primary-locale",
            value: serde_json::json!(config.primary_locale()),
            source: config.primary_locale.source.to_string(),
        },
        ConfigEntry {
            key: "max-drafts",
            value: serde_json::json!(config.max_drafts()),
            source: config.max_drafts.source.to_string(),
        },
        ConfigEntry {
            key: "output-format",
            value: serde_json::json!(config.output_format().as_str()),
            source: config.output_format.source.to_string(),
        },
        ConfigEntry {
            key: "action-log",
            value: serde_json::json!(config.action_log_enabled()),
            source: config.action_log.source.to_string(),
        },
        ConfigEntry {
            key: "log-file",
            value: log_file.0,
            source: log_file.1,
        },
    ];
    debug_assert_eq!(entries.len(), CONFIG_KEYS.len());

    Ok(ConfigShow {
        entries,
        store_config: store_config_path(&ctx.data_dir).display().to_string(),
    })
}

#[derive(Serialize)]
pub struct ConfigSetResult {
    pub key: String,
    pub value: String,
    pub path: String,
}

impl Output for ConfigSetResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} = {} in {}", self.key, self.value, self.path)
    }
}

/// Set one key in the data directory's config.kdl.
pub fn config_set(data_dir: &Path, key: &str, value: &str) -> Result<ConfigSetResult> {
    let path = store_config_path(data_dir);
    set_config_value(&path, key, value)?;

    Ok(ConfigSetResult {
        key: key.to_string(),
        value: value.to_string(),
        path: path.display().to_string(),
    })
}

/// Whether command output should be human-readable.
pub fn wants_human(flag: bool, config: &ResolvedConfig) -> bool {
    flag || *config.output_format() == OutputFormat::Human
}
