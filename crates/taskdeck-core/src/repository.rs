//! Repository contract the viewer consumes.
//!
//! Concrete stores implement [`TaskRepository`]; the viewer never reaches
//! past it. Transaction bracketing is part of the contract but stores that
//! have nothing to bracket may keep the default no-ops.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Task, TaskId, TaskPriority, TaskStatus};

/// Filter applied by [`TaskRepository::find_all`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tag: Option<String>,
    pub parent_id: Option<TaskId>,
}

impl TaskFilter {
    /// Filter on a single status.
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns true if the task passes every set criterion.
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
            && self.tag.as_ref().is_none_or(|t| task.tags.contains(t))
            && self
                .parent_id
                .as_ref()
                .is_none_or(|p| task.parent_id.as_ref() == Some(p))
    }
}

/// Field used for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Priority,
    Title,
    Status,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Ordering applied by [`TaskRepository::find_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TaskSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Compare two tasks under this ordering.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Priority => a.priority.weight().cmp(&b.priority.weight()),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// The first page of the given size.
    pub fn first(page_size: usize) -> Self {
        Self::new(1, page_size)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slice a fully materialized result set. Without pagination the whole
    /// set is returned as a single page.
    pub fn paginate(items: Vec<T>, pagination: Option<Pagination>) -> Self {
        let total = items.len();
        match pagination {
            None => Self {
                items,
                total,
                page: 1,
                page_size: total,
                total_pages: usize::from(total > 0),
            },
            Some(p) => {
                let start = (p.page - 1).saturating_mul(p.page_size);
                let items = items.into_iter().skip(start).take(p.page_size).collect();
                Self {
                    items,
                    total,
                    page: p.page,
                    page_size: p.page_size,
                    total_pages: total.div_ceil(p.page_size),
                }
            }
        }
    }
}

/// Task storage contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Look up one task.
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>>;

    /// List tasks matching `filter`, ordered by `sort` (store order when
    /// absent), sliced by `pagination` (everything when absent).
    async fn find_all(
        &self,
        filter: Option<&TaskFilter>,
        sort: Option<&TaskSort>,
        pagination: Option<Pagination>,
    ) -> Result<Page<Task>>;

    /// Store-side text search.
    async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Task>>;

    /// Insert or replace a task, returning the stored record.
    async fn save(&self, task: Task) -> Result<Task>;

    /// Remove a task. Returns false if it did not exist.
    async fn delete(&self, id: &TaskId) -> Result<bool>;

    async fn begin_transaction(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let task = Task::new("t-1", "x")
            .with_status(TaskStatus::Blocked)
            .with_tags(["infra"]);
        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter::with_status(TaskStatus::Blocked).matches(&task));
        assert!(!TaskFilter::with_status(TaskStatus::Pending).matches(&task));
        let by_tag = TaskFilter {
            tag: Some("infra".into()),
            ..TaskFilter::default()
        };
        assert!(by_tag.matches(&task));
    }

    #[test]
    fn test_paginate() {
        let page = Page::paginate((1..=7).collect::<Vec<_>>(), Some(Pagination::new(2, 3)));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 3);

        let page = Page::paginate((1..=7).collect::<Vec<_>>(), Some(Pagination::new(4, 3)));
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_paginate_without_request() {
        let page = Page::paginate(vec!['a', 'b'], None);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 1);
        let empty: Page<char> = Page::paginate(Vec::new(), None);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_sort_priority_descending() {
        let a = Task::new("a", "a").with_priority(TaskPriority::Low);
        let b = Task::new("b", "b").with_priority(TaskPriority::Critical);
        let sort = TaskSort::new(SortField::Priority, SortDirection::Descending);
        assert_eq!(sort.compare(&a, &b), Ordering::Greater);
    }
}
