//! Canonical form normalization.
//!
//! A server snapshot and a local draft describe the same post in two
//! different shapes. This module projects either one into a
//! [`CanonicalForm`] so they can be compared:
//!
//! - tag ids are extracted from tag objects (server) or taken as-is (local),
//!   then sorted ascending
//! - the creation timestamp is converted to UTC at second precision
//! - optional fields get their defaults (`is_public = true`,
//!   `should_publish_medium = false`, `locale = <primary locale>`)
//!
//! Sorting only happens on the comparison path. [`Normalizer::project_server_to_display`]
//! keeps tags in server order so the editor shows them the way the server
//! returned them.

use crate::models::{CanonicalForm, FormRef, LocalDraft, ServerSnapshot};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Primary locale used when no configuration overrides it.
pub const DEFAULT_PRIMARY_LOCALE: &str = "en";

/// Timestamp layout of [`CanonicalForm::created_at`].
pub const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Layouts with a numeric offset that RFC 3339 parsing rejects, such as
/// `+0900` without a colon or a space instead of `T`.
const OFFSET_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];

/// Offset-less layouts accepted from local forms, interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Projects post data into comparable form.
///
/// Holds configuration only; every method is a pure function of its
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    primary_locale: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY_LOCALE)
    }
}

impl Normalizer {
    pub fn new(primary_locale: impl Into<String>) -> Self {
        Self {
            primary_locale: primary_locale.into(),
        }
    }

    pub fn primary_locale(&self) -> &str {
        &self.primary_locale
    }

    /// Project `data` into its canonical form. Absent input yields `None`.
    pub fn normalize(&self, data: Option<FormRef<'_>>) -> Option<CanonicalForm> {
        let form = match data? {
            FormRef::Server(snapshot) => CanonicalForm {
                post_title: snapshot.post_title.clone(),
                content: snapshot.content.clone(),
                tag_ids: sorted(snapshot.tag_ids()),
                category_id: snapshot.category_id,
                is_public: snapshot.is_public.unwrap_or(true),
                locale: self.locale_or_primary(snapshot.locale.as_deref()),
                created_at: canonical_timestamp(snapshot.created_at.as_deref()),
                should_publish_medium: snapshot.should_publish_medium.unwrap_or(false),
            },
            FormRef::Local(draft) => CanonicalForm {
                post_title: draft.post_title.clone(),
                content: draft.content.clone(),
                tag_ids: sorted(draft.tag_ids.clone()),
                category_id: draft.category_id,
                is_public: draft.is_public.unwrap_or(true),
                locale: self.locale_or_primary(draft.locale.as_deref()),
                created_at: canonical_timestamp(draft.created_at.as_deref()),
                should_publish_medium: draft.should_publish_medium.unwrap_or(false),
            },
        };
        Some(form)
    }

    /// Deterministic string key of the canonical form.
    ///
    /// Two inputs are equivalent exactly when their keys are equal.
    pub fn equality_key(&self, data: Option<FormRef<'_>>) -> Option<String> {
        let form = self.normalize(data)?;
        serde_json::to_string(&form).ok()
    }

    /// Server snapshot in the local (display) shape.
    ///
    /// Tags keep their server order and no defaults are applied, so the
    /// result shows exactly what the server sent.
    pub fn project_server_to_display(&self, snapshot: Option<&ServerSnapshot>) -> Option<LocalDraft> {
        let snapshot = snapshot?;
        Some(LocalDraft {
            post_title: snapshot.post_title.clone(),
            content: snapshot.content.clone(),
            tag_ids: snapshot.tag_ids(),
            category_id: snapshot.category_id,
            is_public: snapshot.is_public,
            locale: snapshot.locale.clone(),
            created_at: snapshot.created_at.clone(),
            should_publish_medium: snapshot.should_publish_medium,
        })
    }

    /// Whether a local draft and a server snapshot describe the same post.
    ///
    /// Always false if either side is missing, so a draft is never judged
    /// converged before server data has loaded.
    pub fn is_equivalent(&self, local: Option<&LocalDraft>, server: Option<&ServerSnapshot>) -> bool {
        let local_key = self.equality_key(local.map(FormRef::Local));
        let server_key = self.equality_key(server.map(FormRef::Server));
        match (local_key, server_key) {
            (Some(l), Some(s)) => l == s,
            _ => false,
        }
    }

    /// Form shown before either a draft or a server snapshot exists.
    pub fn default_form(&self) -> LocalDraft {
        LocalDraft {
            post_title: String::new(),
            content: String::new(),
            tag_ids: Vec::new(),
            category_id: None,
            is_public: Some(true),
            locale: Some(self.primary_locale.clone()),
            created_at: None,
            should_publish_medium: Some(false),
        }
    }

    /// Names of the canonical fields on which `local` and `server` differ.
    ///
    /// Empty when either side is missing; that case is reported by
    /// [`Normalizer::is_equivalent`] instead.
    pub fn divergent_fields(
        &self,
        local: Option<&LocalDraft>,
        server: Option<&ServerSnapshot>,
    ) -> Vec<&'static str> {
        let (Some(a), Some(b)) = (
            self.normalize(local.map(FormRef::Local)),
            self.normalize(server.map(FormRef::Server)),
        ) else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        if a.post_title != b.post_title {
            fields.push("post_title");
        }
        if a.content != b.content {
            fields.push("content");
        }
        if a.tag_ids != b.tag_ids {
            fields.push("tag_ids");
        }
        if a.category_id != b.category_id {
            fields.push("category_id");
        }
        if a.is_public != b.is_public {
            fields.push("is_public");
        }
        if a.locale != b.locale {
            fields.push("locale");
        }
        if a.created_at != b.created_at {
            fields.push("created_at");
        }
        if a.should_publish_medium != b.should_publish_medium {
            fields.push("should_publish_medium");
        }
        fields
    }

    fn locale_or_primary(&self, locale: Option<&str>) -> String {
        locale.unwrap_or(&self.primary_locale).to_string()
    }
}

fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
    ids.sort_unstable();
    ids
}

fn canonical_timestamp(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(trim_timestamp)
}

/// Trim a timestamp to the canonical comparable precision.
///
/// Offsets are honored: `2024-01-01T02:00:00+02:00` and
/// `2024-01-01T00:00:00.000Z` trim to the same value. Timestamps without an
/// offset are taken as UTC. Anything unparseable falls back to dropping a
/// trailing `Z` and then a trailing fractional-seconds suffix, which is how
/// drafts persisted by older clients were compared.
pub fn trim_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt
            .with_timezone(&Utc)
            .format(CANONICAL_TIMESTAMP_FORMAT)
            .to_string();
    }

    for layout in OFFSET_TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, layout) {
            return dt
                .with_timezone(&Utc)
                .format(CANONICAL_TIMESTAMP_FORMAT)
                .to_string();
        }
    }

    for layout in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return naive.format(CANONICAL_TIMESTAMP_FORMAT).to_string();
        }
    }

    // Only a trailing run of digits counts as fractional seconds; anything
    // after them (an offset, a zone name) is kept.
    let without_zone = raw.strip_suffix('Z').unwrap_or(raw);
    match without_zone.rsplit_once('.') {
        Some((whole, fraction))
            if !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit()) =>
        {
            whole.to_string()
        }
        _ => without_zone.to_string(),
    }
}
