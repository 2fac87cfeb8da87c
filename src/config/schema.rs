//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The Rust struct representing the KDL schema
//! - Conversion to and from KDL documents
//! - Validation and default values

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings stored in config.kdl.
///
/// The same schema is used for the system file and the per-store file.
/// `None` means "not set here".
///
/// # KDL Schema
///
/// ```kdl
/// primary-locale "en"
/// max-drafts 200
/// output-format "human"  // or "json"
/// action-log #true
/// log-file "/tmp/postdraft.log"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostdraftConfig {
    /// Locale assumed when a post does not name one
    pub primary_locale: Option<String>,

    /// Maximum number of stored drafts (least recently written evicted first)
    pub max_drafts: Option<usize>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Whether CLI commands are recorded in action.log
    pub action_log: Option<bool>,

    /// Write diagnostics to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

/// Keys accepted in config.kdl.
pub const CONFIG_KEYS: [&str; 5] = [
    "primary-locale",
    "max-drafts",
    "output-format",
    "action-log",
    "log-file",
];

impl PostdraftConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref locale) = self.primary_locale {
            if locale.trim().is_empty() {
                return Err("primary-locale must not be empty".to_string());
            }
        }
        if self.max_drafts == Some(0) {
            return Err("max-drafts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored. A known node with a value of the wrong
    /// type is an error.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let mut config = Self::new();

        if let Some(value) = first_value(doc, "primary-locale") {
            let s = value
                .as_string()
                .ok_or("primary-locale must be a string")?;
            config.primary_locale = Some(s.to_string());
        }

        if let Some(value) = first_value(doc, "max-drafts") {
            let n = value
                .as_integer()
                .ok_or("max-drafts must be an integer")?;
            let n = usize::try_from(n).map_err(|_| format!("max-drafts out of range: {}", n))?;
            config.max_drafts = Some(n);
        }

        if let Some(value) = first_value(doc, "output-format") {
            let s = value
                .as_string()
                .ok_or("output-format must be a string")?;
            let format = OutputFormat::parse(s)
                .ok_or_else(|| format!("output-format must be \"json\" or \"human\", got {:?}", s))?;
            config.output_format = Some(format);
        }

        if let Some(value) = first_value(doc, "action-log") {
            let enabled = value.as_bool().ok_or("action-log must be #true or #false")?;
            config.action_log = Some(enabled);
        }

        if let Some(value) = first_value(doc, "log-file") {
            let s = value.as_string().ok_or("log-file must be a string")?;
            config.log_file = Some(PathBuf::from(s));
        }

        Ok(config)
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref locale) = self.primary_locale {
            push_node(&mut doc, "primary-locale", KdlValue::String(locale.clone()));
        }

        if let Some(max) = self.max_drafts {
            push_node(&mut doc, "max-drafts", KdlValue::Integer(max as i128));
        }

        if let Some(ref format) = self.output_format {
            push_node(
                &mut doc,
                "output-format",
                KdlValue::String(format.as_str().to_string()),
            );
        }

        if let Some(enabled) = self.action_log {
            push_node(&mut doc, "action-log", KdlValue::Bool(enabled));
        }

        if let Some(ref path) = self.log_file {
            push_node(
                &mut doc,
                "log-file",
                KdlValue::String(path.display().to_string()),
            );
        }

        doc
    }

    /// Set a single key from its textual form, as `pd config set` does.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "primary-locale" => self.primary_locale = Some(value.to_string()),
            "max-drafts" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| format!("max-drafts must be a positive integer, got {:?}", value))?;
                self.max_drafts = Some(n);
            }
            "output-format" => {
                let format = OutputFormat::parse(value).ok_or_else(|| {
                    format!("output-format must be \"json\" or \"human\", got {:?}", value)
                })?;
                self.output_format = Some(format);
            }
            "action-log" => {
                let enabled = parse_bool(value)
                    .ok_or_else(|| format!("action-log must be true or false, got {:?}", value))?;
                self.action_log = Some(enabled);
            }
            "log-file" => self.log_file = Some(PathBuf::from(value)),
            _ => {
                return Err(format!(
                    "unknown config key {:?} (expected one of: {})",
                    key,
                    CONFIG_KEYS.join(", ")
                ));
            }
        }
        self.validate()
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &PostdraftConfig) {
        if other.primary_locale.is_some() {
            self.primary_locale = other.primary_locale.clone();
        }
        if other.max_drafts.is_some() {
            self.max_drafts = other.max_drafts;
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format.clone();
        }
        if other.action_log.is_some() {
            self.action_log = other.action_log;
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file.clone();
        }
    }
}

/// Set `key` in an existing document, leaving every other node as written.
///
/// Only the new value is validated, so a file that is invalid elsewhere can
/// still be repaired one key at a time.
pub fn set_in_kdl_doc(doc: &mut KdlDocument, key: &str, value: &str) -> Result<(), String> {
    let mut single = PostdraftConfig::new();
    single.set_value(key, value)?;
    let node = single
        .to_kdl()
        .nodes()
        .first()
        .cloned()
        .ok_or_else(|| format!("no value produced for {:?}", key))?;

    let nodes = doc.nodes_mut();
    match nodes.iter().position(|n| n.name().value() == key) {
        Some(at) => {
            nodes[at] = node;
            let mut index = 0;
            nodes.retain(|n| {
                let keep = index <= at || n.name().value() != key;
                index += 1;
                keep
            });
        }
        None => nodes.push(node),
    }
    Ok(())
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
