//! Data models for post editing.
//!
//! This module defines the two shapes a post takes while it is being edited:
//! - `ServerSnapshot` - The last-fetched authoritative post (tags as objects)
//! - `LocalDraft` - The user's in-progress form (tags as bare ids)
//!
//! plus the supporting types used to write into and compare them:
//! - `DraftPatch` - A partial `LocalDraft` applied by a write
//! - `CanonicalForm` - The normalized projection used for equality checks
//! - `FormRef` / `SourceKind` - A borrowed view of either shape

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of the post being edited.
///
/// Opaque to the engine: server ids may be numeric or slugs, they are
/// only ever compared and used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Accepts either a JSON string or a JSON number for an id.
fn deserialize_entity_id<'de, D>(de: D) -> Result<EntityId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(de)? {
        RawId::Text(s) => EntityId(s),
        RawId::Number(n) => EntityId::from(n),
    })
}

/// A tag as the server returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

impl TagRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Last-fetched authoritative representation of a post.
///
/// Every field except `id` tolerates being missing from the payload, so
/// partially populated responses still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    #[serde(deserialize_with = "deserialize_entity_id")]
    pub id: EntityId,

    /// Post title (`title` is accepted as an alias)
    #[serde(default, alias = "title")]
    pub post_title: String,

    /// Markdown body
    #[serde(default)]
    pub content: String,

    /// Tag objects in server order
    #[serde(default)]
    pub tags: Vec<TagRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Creation timestamp as sent by the server (usually RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_publish_medium: Option<bool>,
}

impl ServerSnapshot {
    /// Create a snapshot with the given id and title and nothing else set.
    pub fn new(id: impl Into<EntityId>, post_title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            post_title: post_title.into(),
            content: String::new(),
            tags: Vec::new(),
            category_id: None,
            is_public: None,
            locale: None,
            created_at: None,
            should_publish_medium: None,
        }
    }

    /// Tag ids in server order.
    pub fn tag_ids(&self) -> Vec<u64> {
        self.tags.iter().map(|t| t.id).collect()
    }
}

/// The user's in-progress edit of a post.
///
/// Same logical fields as [`ServerSnapshot`], but tags are stored as ids.
/// This is both the persisted draft shape and the shape handed to the UI
/// for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDraft {
    #[serde(default)]
    pub post_title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub tag_ids: Vec<u64>,

    #[serde(default)]
    pub category_id: Option<u64>,

    #[serde(default)]
    pub is_public: Option<bool>,

    #[serde(default)]
    pub locale: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub should_publish_medium: Option<bool>,
}

/// Treats an explicit `null` as `Some(None)` instead of "missing".
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// A partial write into a [`LocalDraft`].
///
/// `None` leaves a field unchanged. For nullable fields, `Some(None)`
/// clears the field; in JSON that is an explicit `null` as opposed to an
/// absent key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<u64>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<u64>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_public: Option<Option<bool>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub locale: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub should_publish_medium: Option<Option<bool>>,
}

impl DraftPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.post_title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tag_ids(mut self, tag_ids: Vec<u64>) -> Self {
        self.tag_ids = Some(tag_ids);
        self
    }

    pub fn with_category_id(mut self, category_id: Option<u64>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(Some(is_public));
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(Some(locale.into()));
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(Some(created_at.into()));
        self
    }

    pub fn with_publish_medium(mut self, should_publish_medium: bool) -> Self {
        self.should_publish_medium = Some(Some(should_publish_medium));
        self
    }

    /// Layer `other` on top of this patch; fields set in `other` win.
    pub fn merge(&mut self, other: DraftPatch) {
        if other.post_title.is_some() {
            self.post_title = other.post_title;
        }
        if other.content.is_some() {
            self.content = other.content;
        }
        if other.tag_ids.is_some() {
            self.tag_ids = other.tag_ids;
        }
        if other.category_id.is_some() {
            self.category_id = other.category_id;
        }
        if other.is_public.is_some() {
            self.is_public = other.is_public;
        }
        if other.locale.is_some() {
            self.locale = other.locale;
        }
        if other.created_at.is_some() {
            self.created_at = other.created_at;
        }
        if other.should_publish_medium.is_some() {
            self.should_publish_medium = other.should_publish_medium;
        }
    }

    /// Apply this patch to a draft in place.
    pub fn apply_to(self, draft: &mut LocalDraft) {
        if let Some(title) = self.post_title {
            draft.post_title = title;
        }
        if let Some(content) = self.content {
            draft.content = content;
        }
        if let Some(tag_ids) = self.tag_ids {
            draft.tag_ids = tag_ids;
        }
        if let Some(category_id) = self.category_id {
            draft.category_id = category_id;
        }
        if let Some(is_public) = self.is_public {
            draft.is_public = is_public;
        }
        if let Some(locale) = self.locale {
            draft.locale = locale;
        }
        if let Some(created_at) = self.created_at {
            draft.created_at = created_at;
        }
        if let Some(should_publish_medium) = self.should_publish_medium {
            draft.should_publish_medium = should_publish_medium;
        }
    }
}

/// A full form sets every field, so writing it is an exact overwrite.
impl From<LocalDraft> for DraftPatch {
    fn from(draft: LocalDraft) -> Self {
        Self {
            post_title: Some(draft.post_title),
            content: Some(draft.content),
            tag_ids: Some(draft.tag_ids),
            category_id: Some(draft.category_id),
            is_public: Some(draft.is_public),
            locale: Some(draft.locale),
            created_at: Some(draft.created_at),
            should_publish_medium: Some(draft.should_publish_medium),
        }
    }
}

/// Normalized projection of either representation, used only to test
/// equality. Field order here is the field order of the equality key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalForm {
    pub post_title: String,
    pub content: String,
    /// Sorted ascending
    pub tag_ids: Vec<u64>,
    pub category_id: Option<u64>,
    pub is_public: bool,
    pub locale: String,
    /// UTC, second precision
    pub created_at: Option<String>,
    pub should_publish_medium: bool,
}

/// Which representation a piece of form data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Fetched from the server, tags are objects
    Server,
    /// Edited locally, tags are ids
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Server => "server",
            SourceKind::Local => "local",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Borrowed view of form data tagged with its source.
#[derive(Debug, Clone, Copy)]
pub enum FormRef<'a> {
    Server(&'a ServerSnapshot),
    Local(&'a LocalDraft),
}

impl FormRef<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            FormRef::Server(_) => SourceKind::Server,
            FormRef::Local(_) => SourceKind::Local,
        }
    }
}

impl<'a> From<&'a ServerSnapshot> for FormRef<'a> {
    fn from(snapshot: &'a ServerSnapshot) -> Self {
        FormRef::Server(snapshot)
    }
}

impl<'a> From<&'a LocalDraft> for FormRef<'a> {
    fn from(draft: &'a LocalDraft) -> Self {
        FormRef::Local(draft)
    }
}

/// Lifecycle state of the draft for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    /// No draft stored; the display falls back to server data
    #[default]
    Absent,
    /// A draft is stored and shadows server data
    Present,
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftState::Absent => write!(f, "absent"),
            DraftState::Present => write!(f, "present"),
        }
    }
}
