//! Configuration for postdraft.
//!
//! Settings live in KDL files with one shared schema:
//!
//! - System: `~/.config/postdraft/config.kdl` (or `$PD_CONFIG_DIR/config.kdl`)
//! - Store: `<data-dir>/config.kdl`, next to the draft record
//!
//! Keys:
//! - `primary-locale` - Locale assumed when a post names none (default "en")
//! - `max-drafts` - Cap on stored drafts (default unbounded)
//! - `output-format` - "json" or "human"
//! - `action-log` - Record CLI commands in action.log (default #true)
//! - `log-file` - Send diagnostics to a file instead of stderr
//!
//! ## Precedence
//!
//! CLI flag > store config > system config > defaults.
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, ConfigOverrides, Resolved, ResolvedConfig, ValueSource, load_config_file,
    resolve_config, resolve_layers, set_config_value, store_config_path, system_config_path,
};
pub use schema::{CONFIG_KEYS, OutputFormat, PostdraftConfig, set_in_kdl_doc};
