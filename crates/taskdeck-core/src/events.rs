//! Change notifications emitted by task stores.
//!
//! Stores publish a [`TaskEvent`] on a `tokio::sync::broadcast` channel for
//! every mutation. Receivers that fall behind see `Lagged` and should treat
//! it as "something changed".

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::types::TaskId;

/// Default broadcast buffer for store events.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Kind of change a [`TaskEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    Created,
    Updated,
    StatusChanged,
    PriorityChanged,
    Deleted,
}

impl TaskEventKind {
    /// Event name as stores label it.
    pub fn name(&self) -> &'static str {
        match self {
            TaskEventKind::Created => "TaskCreated",
            TaskEventKind::Updated => "TaskUpdated",
            TaskEventKind::StatusChanged => "TaskStatusChanged",
            TaskEventKind::PriorityChanged => "TaskPriorityChanged",
            TaskEventKind::Deleted => "TaskDeleted",
        }
    }
}

impl fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed change notification about one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    /// Subject of the change
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: TaskEventKind, task_id: TaskId) -> Self {
        Self {
            kind,
            task_id,
            timestamp: Utc::now(),
        }
    }
}

/// Source of store change notifications.
pub trait TaskEventSource: Send + Sync {
    /// Register a new receiver. Only events sent after this call are seen.
    fn subscribe(&self) -> broadcast::Receiver<TaskEvent>;
}
