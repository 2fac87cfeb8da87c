//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Store config.kdl (`<data-dir>/config.kdl`)
//! 3. System config.kdl (`~/.config/postdraft/config.kdl`)
//! 4. Built-in defaults

use crate::config::schema::set_in_kdl_doc;
use crate::config::{OutputFormat, PostdraftConfig};
use crate::normalize::{DEFAULT_PRIMARY_LOCALE, Normalizer};
use crate::storage::DraftStore;
use crate::{Error, Result};
use kdl::KdlDocument;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "PD_CONFIG_DIR";

/// File name of both config files.
pub const CONFIG_FILE_NAME: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from the data directory's config.kdl
    Store,
    /// Value from the system config.kdl
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Store => write!(f, "store"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub primary_locale: Resolved<String>,
    /// `None` means unbounded
    pub max_drafts: Resolved<Option<usize>>,
    pub output_format: Resolved<OutputFormat>,
    pub action_log: Resolved<bool>,
    /// Unset means diagnostics go to stderr
    pub log_file: Option<Resolved<PathBuf>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            primary_locale: Resolved::new(DEFAULT_PRIMARY_LOCALE.to_string(), ValueSource::Default),
            max_drafts: Resolved::new(None, ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            action_log: Resolved::new(true, ValueSource::Default),
            log_file: None,
        }
    }
}

impl ResolvedConfig {
    pub fn primary_locale(&self) -> &str {
        &self.primary_locale.value
    }

    pub fn max_drafts(&self) -> Option<usize> {
        self.max_drafts.value
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format.value
    }

    pub fn action_log_enabled(&self) -> bool {
        self.action_log.value
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_ref().map(|r| r.value.as_path())
    }

    /// Normalizer configured with the resolved primary locale.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.primary_locale())
    }

    /// Open the file-backed draft store in `data_dir` with the resolved cap.
    pub fn open_store(&self, data_dir: &Path) -> DraftStore {
        DraftStore::open_in(data_dir).with_max_drafts(self.max_drafts())
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub primary_locale: Option<String>,
    pub max_drafts: Option<usize>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary_locale(mut self, locale: impl Into<String>) -> Self {
        self.primary_locale = Some(locale.into());
        self
    }

    pub fn with_max_drafts(mut self, max: usize) -> Self {
        self.max_drafts = Some(max);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Path of the system config file.
///
/// `PD_CONFIG_DIR` wins; otherwise `<platform config dir>/postdraft`.
pub fn system_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join(CONFIG_FILE_NAME));
        }
    }
    dirs::config_dir().map(|dir| dir.join("postdraft").join(CONFIG_FILE_NAME))
}

/// Path of the store config file inside a data directory.
pub fn store_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Load a config file. A missing file is an empty config.
pub fn load_config_file(path: &Path) -> Result<PostdraftConfig> {
    if !path.exists() {
        return Ok(PostdraftConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?;

    let config = PostdraftConfig::from_kdl(&doc)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Set one key in a config file, creating the file and its parent
/// directories as needed.
///
/// The file is edited in place: other nodes and comments are kept, and
/// invalid values under other keys do not block the write.
pub fn set_config_value(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut doc = if path.exists() {
        let content = fs::read_to_string(path)?;
        content
            .parse::<KdlDocument>()
            .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?
    } else {
        KdlDocument::new()
    };

    set_in_kdl_doc(&mut doc, key, value).map_err(Error::Config)?;
    doc.autoformat();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;
    Ok(())
}

/// Resolve configuration from both config files plus CLI overrides.
pub fn resolve_config(
    data_dir: &Path,
    system_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let system = match system_path {
        Some(path) => load_config_file(path)?,
        None => PostdraftConfig::default(),
    };
    let store = load_config_file(&store_config_path(data_dir))?;
    resolve_layers(&store, &system, overrides)
}

/// Resolve configuration from already loaded layers.
///
/// Precedence (highest to lowest):
/// 1. CLI flags (from `overrides`)
/// 2. Store config
/// 3. System config
/// 4. Built-in defaults
pub fn resolve_layers(
    store: &PostdraftConfig,
    system: &PostdraftConfig,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let mut result = ResolvedConfig::default();

    if let Some(ref locale) = overrides.primary_locale {
        if locale.trim().is_empty() {
            return Err(Error::Config("--locale must not be empty".to_string()));
        }
        result.primary_locale = Resolved::new(locale.clone(), ValueSource::CliFlag);
    } else if let Some(ref locale) = store.primary_locale {
        result.primary_locale = Resolved::new(locale.clone(), ValueSource::Store);
    } else if let Some(ref locale) = system.primary_locale {
        result.primary_locale = Resolved::new(locale.clone(), ValueSource::System);
    }

    if let Some(max) = overrides.max_drafts {
        if max == 0 {
            return Err(Error::Config("--max-drafts must be at least 1".to_string()));
        }
        result.max_drafts = Resolved::new(Some(max), ValueSource::CliFlag);
    } else if let Some(max) = store.max_drafts {
        result.max_drafts = Resolved::new(Some(max), ValueSource::Store);
    } else if let Some(max) = system.max_drafts {
        result.max_drafts = Resolved::new(Some(max), ValueSource::System);
    }

    if let Some(ref format) = overrides.output_format {
        result.output_format = Resolved::new(format.clone(), ValueSource::CliFlag);
    } else if let Some(ref format) = store.output_format {
        result.output_format = Resolved::new(format.clone(), ValueSource::Store);
    } else if let Some(ref format) = system.output_format {
        result.output_format = Resolved::new(format.clone(), ValueSource::System);
    }

    if let Some(enabled) = store.action_log {
        result.action_log = Resolved::new(enabled, ValueSource::Store);
    } else if let Some(enabled) = system.action_log {
        result.action_log = Resolved::new(enabled, ValueSource::System);
    }

    if let Some(ref path) = store.log_file {
        result.log_file = Some(Resolved::new(path.clone(), ValueSource::Store));
    } else if let Some(ref path) = system.log_file {
        result.log_file = Some(Resolved::new(path.clone(), ValueSource::System));
    }

    Ok(result)
}
