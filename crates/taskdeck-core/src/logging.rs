//! Logging infrastructure for TaskDeck.
//!
//! Structured logging uses the `tracing` ecosystem. The viewer owns the
//! terminal while it runs, so logs go to a JSON lines file only:
//! `~/.taskdeck/logs/taskdeck.log` (rolled daily).
//!
//! ## Example
//!
//! ```no_run
//! use taskdeck_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("viewer started");
//! tracing::debug!(task_id = "t-1", "task selected");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Result, TaskDeckError};

/// Name of the rolling log file inside the log directory.
pub const LOG_FILE_NAME: &str = "taskdeck.log";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the TaskDeck logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.taskdeck/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// `RUST_LOG` overrides the level when set.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| TaskDeckError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "taskdeck={default_level},taskdeck_core={default_level},taskdeck_tui={default_level}"
        ))
    });

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true)
        .with_file(verbose)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| TaskDeckError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Base directory for TaskDeck state: `~/.taskdeck/`.
pub fn taskdeck_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".taskdeck"))
        .ok_or_else(|| TaskDeckError::internal("home directory could not be determined"))
}

/// Get the default log directory path.
///
/// Returns `~/.taskdeck/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(taskdeck_home()?.join("logs"))
}

/// Get the default log file path.
///
/// Returns `~/.taskdeck/logs/taskdeck.log`
pub fn default_log_file() -> Result<PathBuf> {
    Ok(default_log_dir()?.join(LOG_FILE_NAME))
}
