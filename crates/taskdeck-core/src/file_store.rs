//! JSON-file task store.
//!
//! One task per `<dir>/<id>.json` file. Loading is forgiving: files that are
//! marked corrupted, too large, or undecodable are skipped with a warning so
//! one bad file never hides the rest. Reads are served from an
//! [`InMemoryTaskStore`]; writes go through to disk first.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, TaskDeckError};
use crate::events::{TaskEvent, TaskEventSource};
use crate::repository::{Page, Pagination, TaskFilter, TaskRepository, TaskSort};
use crate::store::InMemoryTaskStore;
use crate::types::{Task, TaskId};

/// Files larger than this are skipped.
pub const MAX_TASK_FILE_BYTES: u64 = 1024 * 1024;

/// At most this many tasks are loaded.
pub const MAX_LOADED_TASKS: usize = 1000;

/// Prefix marking files a previous run flagged as corrupted.
const CORRUPTED_PREFIX: &str = "corrupted-";

/// Task store backed by a directory of JSON files.
pub struct JsonFileTaskStore {
    dir: PathBuf,
    inner: InMemoryTaskStore,
}

impl JsonFileTaskStore {
    /// Open the store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| TaskDeckError::DirectoryCreation {
            path: dir.clone(),
            source: e,
        })?;
        let tasks = load_tasks(&dir)?;
        info!(dir = %dir.display(), count = tasks.len(), "task store opened");
        Ok(Self {
            dir,
            inner: InMemoryTaskStore::with_tasks(tasks),
        })
    }

    /// Directory the store reads and writes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn task_path(&self, id: &TaskId) -> Result<PathBuf> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(TaskDeckError::repository(
                "save",
                format!("task id {name:?} is not a valid file name"),
            ));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

/// Read every task file in `dir`, ordered by priority (critical first) then
/// newest creation first, capped at [`MAX_LOADED_TASKS`].
pub fn load_tasks(dir: &Path) -> Result<Vec<Task>> {
    let entries = fs::read_dir(dir).map_err(|e| TaskDeckError::io("reading", dir, e))?;

    let mut tasks = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with(CORRUPTED_PREFIX) {
            continue;
        }
        match read_task_file(&path) {
            Ok(task) => tasks.push(task),
            Err(e) => warn!(file = %file_name, error = %e, "skipping task file"),
        }
    }

    tasks.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    tasks.truncate(MAX_LOADED_TASKS);
    Ok(tasks)
}

fn read_task_file(path: &Path) -> Result<Task> {
    let metadata = fs::metadata(path).map_err(|e| TaskDeckError::io("stat", path, e))?;
    if metadata.len() > MAX_TASK_FILE_BYTES {
        return Err(TaskDeckError::repository(
            "load",
            format!("file is {} bytes, limit is {MAX_TASK_FILE_BYTES}", metadata.len()),
        ));
    }
    let content = fs::read_to_string(path).map_err(|e| TaskDeckError::io("reading", path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| TaskDeckError::json_parse(path.display().to_string(), e))
}

#[async_trait]
impl TaskRepository for JsonFileTaskStore {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn find_all(
        &self,
        filter: Option<&TaskFilter>,
        sort: Option<&TaskSort>,
        pagination: Option<Pagination>,
    ) -> Result<Page<Task>> {
        self.inner.find_all(filter, sort, pagination).await
    }

    async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Task>> {
        self.inner.search(query, limit).await
    }

    async fn save(&self, task: Task) -> Result<Task> {
        let path = self.task_path(&task.id)?;
        let content = serde_json::to_string_pretty(&task)
            .map_err(|e| TaskDeckError::json_parse(format!("task {}", task.id), e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| TaskDeckError::io("writing", &path, e))?;
        debug!(path = %path.display(), "task file written");
        self.inner.save(task).await
    }

    async fn delete(&self, id: &TaskId) -> Result<bool> {
        let path = self.task_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TaskDeckError::io("removing", &path, e)),
        }
        self.inner.delete(id).await
    }
}

impl TaskEventSource for JsonFileTaskStore {
    fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskPriority, TaskStatus};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_skips_bad_files_and_orders() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "a.json",
            r#"{"id":"a","title":"Low","priority":"low","createdAt":"2026-01-01T00:00:00Z"}"#,
        );
        write(
            tmp.path(),
            "b.json",
            r#"{"id":"b","title":"Crit","priority":"critical","createdAt":"2026-01-01T00:00:00Z"}"#,
        );
        write(
            tmp.path(),
            "c.json",
            r#"{"id":"c","title":"Crit newer","priority":"critical","createdAt":"2026-03-01T00:00:00Z"}"#,
        );
        write(tmp.path(), "broken.json", "{not json");
        write(tmp.path(), "corrupted-d.json", r#"{"id":"d","title":"Hidden"}"#);
        write(tmp.path(), "notes.txt", "ignored");

        let tasks = load_tasks(tmp.path()).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_load_skips_oversized_file() {
        let tmp = TempDir::new().unwrap();
        let padding = " ".repeat(MAX_TASK_FILE_BYTES as usize + 1);
        write(tmp.path(), "big.json", &format!(r#"{{"id":"big","title":"x"}}{padding}"#));
        assert!(load_tasks(tmp.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_writes_through_and_reloads() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileTaskStore::open(tmp.path()).unwrap();
        let task = Task::new("t-1", "Persist me")
            .with_status(TaskStatus::InProgress)
            .with_priority(TaskPriority::High);
        store.save(task).await.unwrap();

        assert!(tmp.path().join("t-1.json").exists());
        let reopened = JsonFileTaskStore::open(tmp.path()).unwrap();
        let loaded = reopened.find_by_id(&"t-1".into()).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileTaskStore::open(tmp.path()).unwrap();
        store.save(Task::new("t-1", "Doomed")).await.unwrap();
        assert!(store.delete(&"t-1".into()).await.unwrap());
        assert!(!tmp.path().join("t-1.json").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileTaskStore::open(tmp.path()).unwrap();
        assert!(store.save(Task::new("../escape", "x")).await.is_err());
    }
}
