//! # taskdeck-core
//!
//! Core types, errors, and utilities for TaskDeck.
//!
//! This crate provides:
//! - [`TaskDeckError`] - Error type shared by every TaskDeck crate
//! - [`logging`] - Tracing setup and log file locations
//! - [`config`] - Viewer configuration loaded from YAML
//! - [`types`] - The task model
//! - [`repository`] - The repository contract the viewer consumes
//! - [`events`] - Store change notifications
//! - [`store`] / [`file_store`] - In-memory and JSON-file task stores
//! - [`sanitize`] - Cleaning task text before it reaches the terminal
//!
//! ## Example
//!
//! ```no_run
//! use taskdeck_core::{InMemoryTaskStore, Task, TaskRepository};
//!
//! # async fn demo() -> taskdeck_core::Result<()> {
//! let store = InMemoryTaskStore::new();
//! store.save(Task::new("t-1", "Write the release notes")).await?;
//! let page = store.find_all(None, None, None).await?;
//! assert_eq!(page.total, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod file_store;
pub mod logging;
pub mod repository;
pub mod sanitize;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{DefaultLayout, SearchConfig, ViewerConfig};
pub use error::{Result, TaskDeckError};
pub use events::{TaskEvent, TaskEventKind, TaskEventSource};
pub use file_store::JsonFileTaskStore;
pub use logging::{init_logging, LogGuard};
pub use repository::{
    Page, Pagination, SortDirection, SortField, TaskFilter, TaskRepository, TaskSort,
};
pub use store::InMemoryTaskStore;
pub use types::{Task, TaskId, TaskPriority, TaskStatus};
