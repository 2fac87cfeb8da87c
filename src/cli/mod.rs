//! CLI argument definitions for postdraft.

use crate::models::SourceKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// postdraft - Crash-safe local drafts for server-owned posts.
///
/// Server copies of a post are passed in as JSON files (`--server`). Drafts
/// persist in the data directory and are dropped automatically once they
/// match the server.
#[derive(Parser, Debug)]
#[command(name = "pd")]
#[command(
    author,
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("PD_GIT_COMMIT"),
        " ",
        env!("PD_BUILD_TIMESTAMP"),
        ")"
    ),
    about = "Keep local post drafts and reconcile them with the server",
    long_about = None
)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory holding the draft file, store config and action log.
    /// Defaults to the platform data directory.
    #[arg(long = "data-dir", global = true, env = "PD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Locale assumed when a post names none (overrides config)
    #[arg(long = "locale", global = true)]
    pub primary_locale: Option<String>,

    /// Maximum number of stored drafts (overrides config)
    #[arg(long = "max-drafts", global = true)]
    pub max_drafts: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what the editor displays for a post
    Show {
        /// Post ID
        id: String,

        /// Server copy of the post (JSON); reconciles before showing
        #[arg(long, value_name = "FILE")]
        server: Option<PathBuf>,
    },

    /// Write the edited form for a post
    ///
    /// Fields not given keep their displayed value. With --form, the file's
    /// fields are applied first and the flags override them.
    Edit {
        /// Post ID
        id: String,

        /// Server copy of the post (JSON), loaded before the edit
        #[arg(long, value_name = "FILE")]
        server: Option<PathBuf>,

        /// Form fields to write (JSON object, local shape)
        #[arg(long, value_name = "FILE")]
        form: Option<PathBuf>,

        /// Post title
        #[arg(long)]
        title: Option<String>,

        /// Post body
        #[arg(long)]
        content: Option<String>,

        /// Tag ID (repeatable, replaces the tag list)
        #[arg(long = "tag", value_name = "ID")]
        tags: Option<Vec<u64>>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        no_tags: bool,

        /// Category ID
        #[arg(long, value_name = "ID")]
        category: Option<u64>,

        /// Unset the category
        #[arg(long, conflicts_with = "category")]
        no_category: bool,

        /// Whether the post is public
        #[arg(long, value_name = "BOOL")]
        public: Option<bool>,

        /// Post locale
        #[arg(long = "post-locale", value_name = "LOCALE")]
        post_locale: Option<String>,

        /// Creation timestamp
        #[arg(long, value_name = "TS")]
        created_at: Option<String>,

        /// Whether to cross-post to Medium
        #[arg(long, value_name = "BOOL")]
        medium: Option<bool>,
    },

    /// Reconcile a post's draft against the server copy
    Reconcile {
        /// Post ID
        id: String,

        /// Server copy of the post (JSON)
        #[arg(long, value_name = "FILE")]
        server: PathBuf,
    },

    /// Discard the draft for a post
    Reset {
        /// Post ID
        id: String,
    },

    /// Record that the post was saved to the server (clears the draft)
    Saved {
        /// Post ID
        id: String,

        /// Server copy returned by the save (JSON)
        #[arg(long, value_name = "FILE")]
        server: Option<PathBuf>,
    },

    /// List stored drafts, least recently written first
    List,

    /// Print the equality key of a form file
    Key {
        /// Form data (JSON)
        file: PathBuf,

        /// Shape of the file's data
        #[arg(long, value_enum)]
        kind: KindArg,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration and where each value came from
    Show,

    /// Set a key in the data directory's config.kdl
    Set {
        /// Config key (primary-locale, max-drafts, output-format, action-log, log-file)
        key: String,

        /// New value
        value: String,
    },
}

/// Shape of form data given on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    /// Server snapshot (tags are objects)
    Server,
    /// Local draft (tags are ids)
    Local,
}

impl From<KindArg> for SourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Server => SourceKind::Server,
            KindArg::Local => SourceKind::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_edit_flags() {
        let cli = Cli::try_parse_from([
            "pd", "edit", "42", "--title", "Hi", "--tag", "3", "--tag", "1", "--public", "false",
        ])
        .unwrap();

        match cli.command {
            Commands::Edit {
                id,
                title,
                tags,
                public,
                category,
                ..
            } => {
                assert_eq!(id, "42");
                assert_eq!(title.as_deref(), Some("Hi"));
                assert_eq!(tags, Some(vec![3, 1]));
                assert_eq!(public, Some(false));
                assert_eq!(category, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_conflicting_flags() {
        let result = Cli::try_parse_from(["pd", "edit", "1", "--category", "2", "--no-category"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_key_kind() {
        let cli = Cli::try_parse_from(["pd", "key", "post.json", "--kind", "server"]).unwrap();
        match cli.command {
            Commands::Key { kind, .. } => assert_eq!(SourceKind::from(kind), SourceKind::Server),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pd", "list", "-H", "--max-drafts", "4"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.max_drafts, Some(4));
    }
}
