//! Error types for TaskDeck operations.
//!
//! This module defines [`TaskDeckError`], the error enum shared by the stores,
//! the configuration loader, and the terminal viewer. Failures are grouped the
//! way the viewer treats them: initialization failures are fatal, query
//! failures are recovered locally, and everything else is logged.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`TaskDeckError`].
pub type Result<T> = std::result::Result<T, TaskDeckError>;

/// Error type for all TaskDeck operations.
#[derive(Debug, Error)]
pub enum TaskDeckError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON parsing error
    #[error("JSON parse error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// YAML parsing error
    #[error("YAML parse error in {context}: {message}")]
    YamlParse { context: String, message: String },

    // =========================================================================
    // Repository Errors
    // =========================================================================
    /// Task not found in the store
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Repository operation failed
    #[error("Repository {operation} failed: {message}")]
    Repository { operation: String, message: String },

    /// Transaction bracketing misuse (commit without begin, nested begin)
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    // =========================================================================
    // Terminal Errors
    // =========================================================================
    /// Terminal cannot be acquired or is unsuitable
    #[error("Terminal initialization failed: {message}")]
    TerminalInit { message: String },

    /// Terminal I/O failed while drawing or reading input
    #[error("Terminal I/O error during {operation}")]
    TerminalIo {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Terminal restore failed
    #[error("Failed to restore terminal: {message}")]
    TerminalRestore { message: String },

    // =========================================================================
    // Viewer Errors
    // =========================================================================
    /// The initial task load failed
    #[error("Initial task load failed: {message}")]
    InitialLoad { message: String },

    /// Internal error (bug in TaskDeck)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TaskDeckError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON parse error
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a repository error
    pub fn repository(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Repository {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a terminal I/O error
    pub fn terminal_io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::TerminalIo {
            operation: operation.into(),
            source,
        }
    }

    /// Create a terminal initialization error
    pub fn terminal_init(message: impl Into<String>) -> Self {
        Self::TerminalInit {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if the viewer recovers from this error locally
    /// (logged, empty result, view left as it was).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound { .. }
                | Self::Repository { .. }
                | Self::Transaction { .. }
                | Self::TerminalIo { .. }
        )
    }

    /// Returns true if this error is fatal (should exit application)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TerminalInit { .. } | Self::InitialLoad { .. } | Self::Internal { .. }
        )
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create ~/.taskdeck/config.yaml or drop the --config flag to use defaults")
            }
            Self::ConfigInvalid { .. } => Some("Check the YAML syntax of the configuration file"),
            Self::TerminalInit { .. } => {
                Some("Run taskdeck from an interactive terminal of at least 80x24")
            }
            Self::InitialLoad { .. } => Some("Check that the storage directory exists and is readable"),
            _ => None,
        }
    }
}
