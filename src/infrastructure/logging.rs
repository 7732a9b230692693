use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::{EngineError, LoggingConfig};

/// Prefix shared by every rotated log file; daily rotation appends the date.
const LOG_FILE_PREFIX: &str = "unheard.log";

/// Where engine diagnostics go.
#[derive(Debug)]
pub enum LogSink {
    /// Console layer only.
    Console,
    /// Console plus a JSON file, rotated daily, pruned to `max_files`.
    File { logs_dir: PathBuf, max_files: u32 },
}

impl LogSink {
    /// Derive the sink from configuration.
    pub fn from_config(config: &LoggingConfig, logs_dir: &Path) -> Self {
        if config.file_logging {
            LogSink::File {
                logs_dir: logs_dir.to_path_buf(),
                max_files: config.max_files,
            }
        } else {
            LogSink::Console
        }
    }
}

/// Initialize the logging system for the given sink.
///
/// Returns a guard that must be kept alive for the duration of the engine;
/// dropping it flushes any buffered file output. Console-only sinks need no
/// guard.
pub fn init_logging(sink: LogSink, level: &str) -> Result<Option<WorkerGuard>, EngineError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("unheard={level},warn")));
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_filter(console_filter);

    let (file_layer, guard) = match &sink {
        LogSink::Console => (None, None),
        LogSink::File {
            logs_dir,
            max_files,
        } => {
            fs::create_dir_all(logs_dir)?;
            prune_old_logs(logs_dir, *max_files);

            let appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(format!("unheard={level}")));
            (Some(layer), Some(guard))
        }
    };

    // try_init: a second engine in the same process keeps the first
    // subscriber, which is harmless.
    let installed = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        match &sink {
            LogSink::Console => tracing::info!(level, "Logging to console"),
            LogSink::File {
                logs_dir,
                max_files,
            } => tracing::info!(
                level,
                logs_dir = ?logs_dir,
                max_files,
                "Logging to console and rotated files"
            ),
        }
    }

    Ok(guard)
}

/// Keep at most `max_files` rotated log files, removing the oldest first.
/// Best effort: pruning failures never block engine startup.
fn prune_old_logs(logs_dir: &Path, max_files: u32) {
    let Ok(entries) = fs::read_dir(logs_dir) else {
        return;
    };

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
        })
        .collect();

    if logs.len() <= max_files as usize {
        return;
    }

    // The appended date makes the file name order chronological.
    logs.sort();
    let excess = logs.len() - max_files as usize;
    for path in logs.drain(..excess) {
        if fs::remove_file(&path).is_ok() {
            tracing::debug!(path = ?path, "Pruned old log file");
        }
    }
}
