//! pd - Crash-safe local drafts for server-owned posts.

use clap::Parser;
use postdraft::action_log;
use postdraft::cli::{Cli, Commands, ConfigCommands};
use postdraft::commands::{self, Context, Output};
use postdraft::config::{ConfigOverrides, ResolvedConfig, resolve_config, system_config_path};
use postdraft::models::DraftPatch;
use postdraft::storage::get_data_dir;
use postdraft::telemetry;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();
    let human_flag = cli.human_readable;

    // Data directory: --data-dir flag / PD_DATA_DIR > platform data dir
    let data_dir = match cli.data_dir.clone().map(Ok).unwrap_or_else(get_data_dir) {
        Ok(dir) => dir,
        Err(e) => fail(&e, human_flag),
    };

    let overrides = ConfigOverrides {
        primary_locale: cli.primary_locale.clone(),
        max_drafts: cli.max_drafts,
        output_format: None,
    };
    let (config, config_error) =
        match resolve_config(&data_dir, system_config_path().as_deref(), &overrides) {
            Ok(config) => (config, None),
            Err(e) => (ResolvedConfig::default(), Some(e)),
        };

    let _log_guard = telemetry::init(config.log_file());

    // `config set` must still run so a broken store config can be repaired
    if let Some(e) = config_error {
        if matches!(&cli.command, Commands::Config { command: ConfigCommands::Set { .. } }) {
            tracing::warn!(error = %e, "configuration invalid, continuing with defaults");
        } else {
            tracing::error!(error = %e, "configuration could not be resolved");
            fail(&e, human_flag);
        }
    }
    let human = commands::wants_human(human_flag, &config);

    // Serialize command for logging
    let (cmd_name, args_json) = serialize_command(&cli.command);

    let start = Instant::now();
    let action_log_enabled = config.action_log_enabled();
    let ctx = Context::new(data_dir, config);
    let result = run_command(cli.command, &ctx, human);
    let duration = start.elapsed().as_millis() as u64;

    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    if action_log_enabled {
        action_log::log_action(&ctx.data_dir, &cmd_name, args_json, success, error, duration);
    }

    if let Err(e) = result {
        fail(&e, human);
    }
}

/// Report an error the way every command does and exit with status 1.
fn fail(e: &postdraft::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

fn run_command(command: Commands, ctx: &Context, human: bool) -> Result<(), postdraft::Error> {
    match command {
        Commands::Show { id, server } => {
            let result = commands::show(ctx, &id, server.as_deref())?;
            output(&result, human);
        }

        Commands::Edit {
            id,
            server,
            form,
            title,
            content,
            tags,
            no_tags,
            category,
            no_category,
            public,
            post_locale,
            created_at,
            medium,
        } => {
            let mut patch = match form {
                Some(ref path) => commands::load_patch(path)?,
                None => DraftPatch::new(),
            };
            patch.merge(DraftPatch {
                post_title: title,
                content,
                tag_ids: if no_tags { Some(Vec::new()) } else { tags },
                category_id: if no_category {
                    Some(None)
                } else {
                    category.map(Some)
                },
                is_public: public.map(Some),
                locale: post_locale.map(Some),
                created_at: created_at.map(Some),
                should_publish_medium: medium.map(Some),
            });

            let result = commands::edit(ctx, &id, server.as_deref(), patch)?;
            output(&result, human);
        }

        Commands::Reconcile { id, server } => {
            let result = commands::reconcile(ctx, &id, &server)?;
            output(&result, human);
        }

        Commands::Reset { id } => {
            let result = commands::reset(ctx, &id)?;
            output(&result, human);
        }

        Commands::Saved { id, server } => {
            let result = commands::saved(ctx, &id, server.as_deref())?;
            output(&result, human);
        }

        Commands::List => {
            let result = commands::list(ctx)?;
            output(&result, human);
        }

        Commands::Key { file, kind } => {
            let result = commands::key(ctx, &file, kind.into())?;
            output(&result, human);
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(ctx)?;
                output(&result, human);
            }
            ConfigCommands::Set { key, value } => {
                let result = commands::config_set(&ctx.data_dir, &key, &value)?;
                output(&result, human);
            }
        },
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn path_arg(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}

/// Serialize a command to its name and arguments for the action log.
fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Show { id, server } => (
            "show".to_string(),
            serde_json::json!({ "id": id, "server": path_arg(server) }),
        ),

        Commands::Edit {
            id,
            server,
            form,
            title,
            content,
            tags,
            no_tags,
            category,
            no_category,
            public,
            post_locale,
            created_at,
            medium,
        } => (
            "edit".to_string(),
            serde_json::json!({
                "id": id,
                "server": path_arg(server),
                "form": path_arg(form),
                "title": title,
                "content": content,
                "tags": tags,
                "no_tags": no_tags,
                "category": category,
                "no_category": no_category,
                "public": public,
                "post_locale": post_locale,
                "created_at": created_at,
                "medium": medium,
            }),
        ),

        Commands::Reconcile { id, server } => (
            "reconcile".to_string(),
            serde_json::json!({ "id": id, "server": server.display().to_string() }),
        ),

        Commands::Reset { id } => ("reset".to_string(), serde_json::json!({ "id": id })),

        Commands::Saved { id, server } => (
            "saved".to_string(),
            serde_json::json!({ "id": id, "server": path_arg(server) }),
        ),

        Commands::List => ("list".to_string(), serde_json::json!({})),

        Commands::Key { file, kind } => (
            "key".to_string(),
            serde_json::json!({
                "file": file.display().to_string(),
                "kind": postdraft::models::SourceKind::from(*kind).as_str(),
            }),
        ),

        Commands::Config { command } => match command {
            ConfigCommands::Show => ("config show".to_string(), serde_json::json!({})),
            ConfigCommands::Set { key, value } => (
                "config set".to_string(),
                serde_json::json!({ "key": key, "value": value }),
            ),
        },
    }
}
