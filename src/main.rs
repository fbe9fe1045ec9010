//! TaskDeck - Terminal Task Viewer
//!
//! Browse, search and follow the tasks in a task store from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Open the viewer on the default store (~/.taskdeck/tasks/)
//! taskdeck
//!
//! # Use another store and start in the single-pane layout
//! taskdeck --storage-dir ./tasks --layout single
//!
//! # With verbose logging
//! taskdeck -v
//!
//! # With custom log directory
//! taskdeck --log-dir /path/to/logs/
//! ```

use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use taskdeck_core::{init_logging, DefaultLayout, JsonFileTaskStore, LogGuard, TaskDeckError, ViewerConfig};
use taskdeck_tui::{restore_terminal, App};
use tracing::{error, info};

/// TaskDeck terminal task viewer
///
/// Shows a task list with a detail pane, fuzzy search, and live updates
/// as the store changes.
#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.taskdeck/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.taskdeck/config.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Task store directory, overriding the configuration
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Initial pane layout, overriding the configuration
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    Single,
    SplitHorizontal,
    SplitVertical,
}

impl From<LayoutArg> for DefaultLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Single => DefaultLayout::Single,
            LayoutArg::SplitHorizontal => DefaultLayout::SplitHorizontal,
            LayoutArg::SplitVertical => DefaultLayout::SplitVertical,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    install_panic_hook();

    info!("Starting TaskDeck viewer");

    match run_app(&cli) {
        Ok(()) => {
            info!("TaskDeck viewer exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "TaskDeck viewer error");
            eprintln!("Error: {e}");
            if let Some(hint) = e.guidance() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::from(1)
        }
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
fn install_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

fn setup_logging(cli: &Cli) -> taskdeck_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

/// Load configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> taskdeck_core::Result<ViewerConfig> {
    let mut config = ViewerConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    if let Some(layout) = cli.layout {
        config.default_layout = layout.into();
    }
    Ok(config)
}

/// Open the configured task store. The store logs its own opening.
fn open_store(config: &ViewerConfig) -> taskdeck_core::Result<Arc<JsonFileTaskStore>> {
    Ok(Arc::new(JsonFileTaskStore::open(config.storage_dir()?)?))
}

fn run_app(cli: &Cli) -> taskdeck_core::Result<()> {
    let config = load_config(cli)?;
    let store = open_store(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TaskDeckError::internal(format!("cannot start async runtime: {e}")))?;

    let app = App::new(config, store.clone(), store);
    runtime.block_on(app.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_store_open_is_logged_once() {
        let tmp = TempDir::new().unwrap();
        let config = ViewerConfig {
            storage_dir: Some(tmp.path().to_path_buf()),
            ..ViewerConfig::default()
        };
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            open_store(&config).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("task store opened").count(), 1);
    }
}
