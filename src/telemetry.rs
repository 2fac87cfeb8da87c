//! Diagnostic logging setup for the `pd` binary.
//!
//! The library only emits `tracing` events; this module installs the
//! subscriber. The filter comes from `PD_LOG` (default `warn`). Output goes
//! to stderr, or to a JSON-lines file when `log-file` is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "PD_LOG";

/// Filter used when `PD_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Returns the appender guard when logging to a file; keep it alive until
/// exit so buffered lines are flushed. Calling this twice is harmless.
pub fn init(log_file: Option<&Path>) -> Option<WorkerGuard> {
    if let Some((path, file_name)) = log_file.and_then(|p| Some((p, p.file_name()?))) {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        if std::fs::create_dir_all(dir).is_ok() {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);

            if tracing_subscriber::registry()
                .with(env_filter())
                .with(file_layer)
                .try_init()
                .is_ok()
            {
                tracing::debug!(path = %path.display(), "file logging initialized");
            }
            return Some(guard);
        }
    }

    // Fallback to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    None
}
