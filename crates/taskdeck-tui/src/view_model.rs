//! Display-ready projections of tasks.
//!
//! Views never format [`Task`] fields themselves. Mapping computes icons,
//! badges, dates, durations and subtask progress once, and runs every piece
//! of user text through the sanitizer.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeDelta, Utc};
use taskdeck_core::sanitize::{sanitize_line, sanitize_text, DEFAULT_MAX_LENGTH};
use taskdeck_core::{Task, TaskId, TaskPriority, TaskStatus};

/// Longest title kept after sanitizing.
const MAX_TITLE_LENGTH: usize = 200;

/// A subtask as listed under its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtaskSummary {
    pub id: TaskId,
    /// `None` when the referenced task is not loaded
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
}

impl SubtaskSummary {
    pub fn status_icon(&self) -> char {
        self.status.map(status_icon).unwrap_or('?')
    }
}

/// Everything a view shows about a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskViewModel {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub status_icon: char,
    pub priority_badge: &'static str,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<u32>,
    pub created: String,
    pub updated: String,
    pub completed: Option<String>,
    /// Creation to completion, or to now while open
    pub duration: String,
    /// Percent of subtasks completed; `None` without subtasks
    pub progress: Option<u8>,
    pub parent_id: Option<TaskId>,
    pub subtasks: Vec<SubtaskSummary>,
}

impl TaskViewModel {
    /// One-line summary used by lists.
    pub fn summary_line(&self) -> String {
        format!("{} {:<6} {}", self.status_icon, self.priority_badge, self.title)
    }
}

pub fn status_icon(status: TaskStatus) -> char {
    match status {
        TaskStatus::Pending => '○',
        TaskStatus::InProgress => '●',
        TaskStatus::Completed => '✓',
        TaskStatus::Cancelled => '⊘',
        TaskStatus::Blocked => '□',
    }
}

pub fn priority_badge(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Critical => "[CRIT]",
        TaskPriority::High => "[HIGH]",
        TaskPriority::Medium => "[MED]",
        TaskPriority::Low => "[LOW]",
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Compact duration: `3d 4h`, `2h 15m`, `45m`. Negative spans read `0m`.
pub fn format_duration(span: TimeDelta) -> String {
    let minutes = span.num_minutes().max(0);
    let (days, hours, mins) = (minutes / (24 * 60), minutes / 60 % 24, minutes % 60);
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

/// Maps tasks to view models, resolving subtask references against a
/// known set of tasks.
pub struct ViewModelMapper<'a> {
    known: HashMap<&'a TaskId, &'a Task>,
    now: DateTime<Utc>,
}

impl<'a> ViewModelMapper<'a> {
    pub fn new(known: &'a [Task]) -> Self {
        Self::at(known, Utc::now())
    }

    /// Mapper with a fixed clock.
    pub fn at(known: &'a [Task], now: DateTime<Utc>) -> Self {
        Self {
            known: known.iter().map(|t| (&t.id, t)).collect(),
            now,
        }
    }

    pub fn map(&self, task: &Task) -> TaskViewModel {
        let subtasks: Vec<SubtaskSummary> = task
            .subtask_ids
            .iter()
            .map(|id| match self.known.get(id) {
                Some(child) => SubtaskSummary {
                    id: id.clone(),
                    title: Some(sanitize_line(&child.title, MAX_TITLE_LENGTH)),
                    status: Some(child.status),
                },
                None => SubtaskSummary {
                    id: id.clone(),
                    title: None,
                    status: None,
                },
            })
            .collect();

        let progress = (!subtasks.is_empty()).then(|| {
            let done = subtasks
                .iter()
                .filter(|s| s.status == Some(TaskStatus::Completed))
                .count();
            (done * 100 / subtasks.len()) as u8
        });

        let end = task.completed_at.unwrap_or(self.now);

        TaskViewModel {
            id: task.id.clone(),
            title: sanitize_line(&task.title, MAX_TITLE_LENGTH),
            description: sanitize_text(&task.description, DEFAULT_MAX_LENGTH),
            status: task.status,
            priority: task.priority,
            status_icon: status_icon(task.status),
            priority_badge: priority_badge(task.priority),
            tags: task
                .tags
                .iter()
                .map(|t| sanitize_line(t, MAX_TITLE_LENGTH))
                .collect(),
            assignee: task
                .assignee
                .as_deref()
                .map(|a| sanitize_line(a, MAX_TITLE_LENGTH)),
            estimated_hours: task.estimated_hours,
            created: format_timestamp(task.created_at),
            updated: format_timestamp(task.updated_at),
            completed: task.completed_at.map(format_timestamp),
            duration: format_duration(end - task.created_at),
            progress,
            parent_id: task.parent_id.clone(),
            subtasks,
        }
    }

    pub fn map_all(&self, tasks: &[Task]) -> Vec<TaskViewModel> {
        tasks.iter().map(|t| self.map(t)).collect()
    }
}

/// Map `tasks`, resolving subtasks among themselves.
pub fn map_tasks(tasks: &[Task]) -> Vec<TaskViewModel> {
    ViewModelMapper::new(tasks).map_all(tasks)
}
