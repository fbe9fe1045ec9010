//! View components and the messages they send.
//!
//! Every view shares one lifecycle: initialize, show/hide, focus/blur,
//! position and size, render, dispose. A view tracks whether it needs to
//! be painted again; [`ViewComponent::render`] paints only when the view is
//! visible and dirty, so an external render loop can call it every frame.
//!
//! Views report user intent by sending [`ViewMessage`]s on the channel they
//! were built with. They never reach into each other or into the controller.

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::{Position, Rect, Size};

use taskdeck_core::{Result, Task, TaskId};

use crate::detail_view::DetailSection;
use crate::edit_view::{EditField, TaskDraft};
use crate::fuzzy::MatchSpan;
use crate::search_view::SearchState;
use crate::terminal::TerminalSurface;
use crate::view_model::TaskViewModel;

/// Lifecycle state every view carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub position: Position,
    pub size: Size,
    pub visible: bool,
    pub focused: bool,
    pub needs_redraw: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            position: Position::ORIGIN,
            size: Size::new(0, 0),
            visible: false,
            focused: false,
            needs_redraw: true,
        }
    }
}

impl ViewState {
    /// Screen area the view occupies.
    pub fn area(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.size.width, self.size.height)
    }
}

/// Lifecycle contract shared by every view.
#[async_trait]
pub trait ViewComponent: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> &ViewState;

    fn state_mut(&mut self) -> &mut ViewState;

    /// Draw the view's current content onto `surface`.
    fn paint(&mut self, surface: &mut dyn TerminalSurface) -> Result<()>;

    /// Handle a key press while focused. Returns true if the key was consumed.
    fn on_key_press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool;

    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Paint if visible and dirty, then clear the dirty flag.
    /// Returns whether anything was painted.
    fn render(&mut self, surface: &mut dyn TerminalSurface) -> Result<bool> {
        let state = self.state();
        if !state.visible || !state.needs_redraw {
            return Ok(false);
        }
        self.paint(surface)?;
        self.state_mut().needs_redraw = false;
        Ok(true)
    }

    /// Make the view visible. Always schedules a repaint.
    fn show(&mut self) {
        let state = self.state_mut();
        state.visible = true;
        state.needs_redraw = true;
    }

    fn hide(&mut self) {
        self.state_mut().visible = false;
    }

    fn focus(&mut self) {
        let state = self.state_mut();
        if !state.focused {
            state.focused = true;
            state.needs_redraw = true;
        }
    }

    fn blur(&mut self) {
        let state = self.state_mut();
        if state.focused {
            state.focused = false;
            state.needs_redraw = true;
        }
    }

    fn set_position(&mut self, position: Position) {
        let state = self.state_mut();
        if state.position != position {
            state.position = position;
            state.needs_redraw = true;
        }
    }

    fn set_dimensions(&mut self, size: Size) {
        let state = self.state_mut();
        if state.size != size {
            state.size = size;
            state.needs_redraw = true;
        }
    }

    fn set_area(&mut self, area: Rect) {
        self.set_position(area.as_position());
        self.set_dimensions(area.as_size());
    }

    /// Schedule a repaint.
    fn invalidate(&mut self) {
        self.state_mut().needs_redraw = true;
    }

    fn is_visible(&self) -> bool {
        self.state().visible
    }

    fn is_focused(&self) -> bool {
        self.state().focused
    }

    fn area(&self) -> Rect {
        self.state().area()
    }

    /// Release resources. The view is not used afterwards.
    fn dispose(&mut self) {
        self.state_mut().visible = false;
    }
}

/// Navigable list of tasks.
pub trait TaskListPane: ViewComponent {
    /// Replace the list, keeping the selection on the same task id when it
    /// is still present and clamping the index otherwise.
    fn set_tasks(&mut self, tasks: Vec<TaskViewModel>);

    fn tasks(&self) -> &[TaskViewModel];

    fn selected_index(&self) -> Option<usize>;

    fn selected_task(&self) -> Option<&TaskViewModel>;

    /// Move the selection to `id`. Returns false if it is not listed.
    fn select_task(&mut self, id: &TaskId) -> bool;

    /// Label describing the active filter, shown in the title.
    fn set_filter_label(&mut self, label: Option<String>);
}

/// Sectioned view of one task.
pub trait TaskDetailPane: ViewComponent {
    /// Show `task`, or the empty state. A different task resets the
    /// section and scroll position.
    fn set_task(&mut self, task: Option<TaskViewModel>);

    fn task(&self) -> Option<&TaskViewModel>;

    fn active_section(&self) -> DetailSection;

    fn scroll_offset(&self) -> usize;
}

/// A ranked search result ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub task: TaskViewModel,
    pub score: f64,
    /// Matched spans in the title, as char indices
    pub title_spans: Vec<MatchSpan>,
}

/// Search overlay.
pub trait SearchPane: ViewComponent {
    /// Start a fresh editing session.
    fn open(&mut self);

    /// End the session, cancelling any pending query.
    fn close(&mut self);

    fn search_state(&self) -> SearchState;

    fn query(&self) -> &str;

    fn results(&self) -> &[SearchHit];

    fn history(&self) -> &[String];

    /// Mark query `seq` as running. Returns false if a newer query has
    /// already been requested.
    fn begin_query(&mut self, seq: u64) -> bool;

    /// Show results for query `seq`. Stale results are discarded and false
    /// is returned.
    fn apply_results(&mut self, seq: u64, hits: Vec<SearchHit>) -> bool;

    /// Give up on query `seq` without touching the shown results.
    fn abandon_query(&mut self, seq: u64);
}

/// Modal editor for one task.
pub trait TaskEditPane: ViewComponent {
    /// Start editing a copy of `task`.
    fn open(&mut self, task: &Task);

    fn close(&mut self);

    /// Id of the task being edited, if any.
    fn editing(&self) -> Option<&TaskId>;

    fn draft(&self) -> &TaskDraft;

    fn active_field(&self) -> EditField;

    /// Validation message shown in the overlay.
    fn error(&self) -> Option<&str>;
}

/// Messages views and subscriptions send to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewMessage {
    /// The list selection moved
    TaskHighlighted(TaskId),
    /// Enter on a list row
    TaskSelected(TaskId),
    /// The search debounce elapsed
    SearchRequested { seq: u64, query: String },
    SearchResultSelected(TaskId),
    SearchClosed,
    /// The editor asked to save `draft` into task `id`
    EditSubmitted { id: TaskId, draft: TaskDraft },
    EditCancelled,
    /// The subscribed task collection changed
    TasksChanged(Vec<Task>),
    /// A watched task changed; `None` when it was deleted
    TaskChanged { id: TaskId, task: Option<Task> },
}
