//! In-memory task store.
//!
//! [`InMemoryTaskStore`] keeps tasks in insertion order and publishes a
//! [`TaskEvent`] for every mutation. Transactions snapshot the task list;
//! events raised inside a transaction are held back until `commit` and
//! dropped on `rollback`.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::error::{Result, TaskDeckError};
use crate::events::{TaskEvent, TaskEventKind, TaskEventSource, DEFAULT_EVENT_BUFFER};
use crate::repository::{Page, Pagination, TaskFilter, TaskRepository, TaskSort};
use crate::types::{Task, TaskId};

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    snapshot: Option<Vec<Task>>,
    pending_events: Vec<TaskEvent>,
}

impl StoreState {
    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }
}

/// Task store held entirely in memory.
pub struct InMemoryTaskStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<TaskEvent>,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Create a store seeded with tasks, in the given order. Seeding emits no events.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self {
            state: RwLock::new(StoreState {
                tasks,
                ..StoreState::default()
            }),
            events,
        }
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn publish(&self, state: &mut StoreState, event: TaskEvent) {
        if state.snapshot.is_some() {
            state.pending_events.push(event);
            return;
        }
        // No receivers is not an error for a store.
        if self.events.send(event).is_err() {
            debug!("task event dropped, no subscribers");
        }
    }

    fn change_kind(previous: Option<&Task>, next: &Task) -> TaskEventKind {
        match previous {
            None => TaskEventKind::Created,
            Some(prev) if prev.status != next.status => TaskEventKind::StatusChanged,
            Some(prev) if prev.priority != next.priority => TaskEventKind::PriorityChanged,
            Some(_) => TaskEventKind::Updated,
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskStore {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.iter().find(|t| &t.id == id).cloned())
    }

    async fn find_all(
        &self,
        filter: Option<&TaskFilter>,
        sort: Option<&TaskSort>,
        pagination: Option<Pagination>,
    ) -> Result<Page<Task>> {
        let state = self.state.read().await;
        let mut items: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| filter.is_none_or(|f| f.matches(t)))
            .cloned()
            .collect();
        if let Some(sort) = sort {
            items.sort_by(|a, b| sort.compare(a, b));
        }
        Ok(Page::paginate(items, pagination))
    }

    async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Task>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        let hits = state.tasks.iter().filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
                || t.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
                || t
                    .assignee
                    .as_ref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
        });
        Ok(hits.take(limit.unwrap_or(usize::MAX)).cloned().collect())
    }

    async fn save(&self, mut task: Task) -> Result<Task> {
        let mut state = self.state.write().await;
        let existing = state.position(&task.id);
        let kind = Self::change_kind(existing.map(|i| &state.tasks[i]), &task);
        if kind != TaskEventKind::Created {
            task.updated_at = Utc::now();
        }
        match existing {
            Some(i) => state.tasks[i] = task.clone(),
            None => state.tasks.push(task.clone()),
        }
        debug!(task_id = %task.id, event = %kind, "task saved");
        let event = TaskEvent::new(kind, task.id.clone());
        self.publish(&mut state, event);
        Ok(task)
    }

    async fn delete(&self, id: &TaskId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(index) = state.position(id) else {
            return Ok(false);
        };
        state.tasks.remove(index);
        let event = TaskEvent::new(TaskEventKind::Deleted, id.clone());
        self.publish(&mut state, event);
        Ok(true)
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.snapshot.is_some() {
            return Err(TaskDeckError::Transaction {
                message: "transaction already open".into(),
            });
        }
        state.snapshot = Some(state.tasks.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.snapshot.take().is_none() {
            return Err(TaskDeckError::Transaction {
                message: "commit without an open transaction".into(),
            });
        }
        for event in std::mem::take(&mut state.pending_events) {
            if self.events.send(event).is_err() {
                debug!("task event dropped, no subscribers");
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match state.snapshot.take() {
            Some(tasks) => {
                state.tasks = tasks;
                let dropped = std::mem::take(&mut state.pending_events).len();
                debug!(dropped, "transaction rolled back");
                Ok(())
            }
            None => {
                warn!("rollback without an open transaction");
                Err(TaskDeckError::Transaction {
                    message: "rollback without an open transaction".into(),
                })
            }
        }
    }
}

impl TaskEventSource for InMemoryTaskStore {
    fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }
}
