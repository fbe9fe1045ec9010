//! Scrollable task list.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::{Position, Size};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use taskdeck_core::{Result, TaskId};

use crate::terminal::TerminalSurface;
use crate::theme::Theme;
use crate::view::{TaskListPane, ViewComponent, ViewMessage, ViewState};
use crate::view_model::TaskViewModel;

/// Task list pane.
///
/// Keys: `j`/`k` or arrows move one row, PageUp/PageDown move a screen,
/// `g`/`G` or Home/End jump to the ends, Enter selects.
pub struct ListView {
    state: ViewState,
    tasks: Vec<TaskViewModel>,
    selected: usize,
    scroll_offset: usize,
    filter_label: Option<String>,
    theme: Theme,
    messages: UnboundedSender<ViewMessage>,
}

impl ListView {
    pub fn new(messages: UnboundedSender<ViewMessage>) -> Self {
        Self {
            state: ViewState::default(),
            tasks: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            filter_label: None,
            theme: Theme::default(),
            messages,
        }
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Rows available inside the border.
    fn visible_rows(&self) -> usize {
        (self.state.size.height as usize).saturating_sub(2).max(1)
    }

    fn select_index(&mut self, index: usize) {
        if self.tasks.is_empty() {
            return;
        }
        let index = index.min(self.tasks.len() - 1);
        if index == self.selected {
            return;
        }
        self.selected = index;
        self.ensure_visible();
        self.state.needs_redraw = true;
        let id = self.tasks[index].id.clone();
        self.emit(ViewMessage::TaskHighlighted(id));
    }

    fn move_by(&mut self, delta: isize) {
        let target = self.selected.saturating_add_signed(delta);
        self.select_index(target);
    }

    fn ensure_visible(&mut self) {
        let rows = self.visible_rows();
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + rows {
            self.scroll_offset = self.selected + 1 - rows;
        }
        let max_offset = self.tasks.len().saturating_sub(rows);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    fn emit(&self, message: ViewMessage) {
        if self.messages.send(message).is_err() {
            debug!("list view message dropped, controller gone");
        }
    }

    fn title(&self) -> String {
        match &self.filter_label {
            Some(label) => format!(" Tasks ({}) [{label}] ", self.tasks.len()),
            None => format!(" Tasks ({}) ", self.tasks.len()),
        }
    }
}

impl ViewComponent for ListView {
    fn name(&self) -> &'static str {
        "list"
    }

    fn state(&self) -> &ViewState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    /// A new height changes how many rows fit, so the window is re-fit
    /// around the selection.
    fn set_dimensions(&mut self, size: Size) {
        if self.state.size != size {
            self.state.size = size;
            self.ensure_visible();
            self.state.needs_redraw = true;
        }
    }

    fn paint(&mut self, surface: &mut dyn TerminalSurface) -> Result<()> {
        let area = self.state.area();
        let focused = self.state.focused;
        surface.clear_area(area);
        surface.draw_box(area, Some(&self.title()), Some(self.theme.border(focused)));

        if area.width < 3 || area.height < 3 {
            return Ok(());
        }
        let inner_x = area.x + 1;
        let inner_width = (area.width - 2) as usize;

        if self.tasks.is_empty() {
            surface.write(
                "No tasks",
                Some(Position::new(inner_x, area.y + 1)),
                Some(self.theme.dim()),
            );
            return Ok(());
        }

        let rows = self.visible_rows();
        let visible = self.tasks.iter().enumerate().skip(self.scroll_offset).take(rows);
        for (row, (index, task)) in visible.enumerate() {
            let y = area.y + 1 + row as u16;
            let line: String = format!("{:<width$}", task.summary_line(), width = inner_width)
                .chars()
                .take(inner_width)
                .collect();
            let style = if index == self.selected {
                self.theme.selected(focused)
            } else {
                self.theme.status(task.status)
            };
            surface.write(&line, Some(Position::new(inner_x, y)), Some(style));
        }
        Ok(())
    }

    fn on_key_press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return false;
        }
        let page = self.visible_rows() as isize;
        match code {
            KeyCode::Char('j') | KeyCode::Down => self.move_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_by(-1),
            KeyCode::PageDown => self.move_by(page),
            KeyCode::PageUp => self.move_by(-page),
            KeyCode::Char('g') | KeyCode::Home => self.select_index(0),
            KeyCode::Char('G') | KeyCode::End => self.select_index(usize::MAX),
            KeyCode::Enter => match self.tasks.get(self.selected) {
                Some(task) => self.emit(ViewMessage::TaskSelected(task.id.clone())),
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

impl TaskListPane for ListView {
    fn set_tasks(&mut self, tasks: Vec<TaskViewModel>) {
        let previous = self.tasks.get(self.selected).map(|t| t.id.clone());
        self.tasks = tasks;
        self.selected = previous
            .and_then(|id| self.tasks.iter().position(|t| t.id == id))
            .unwrap_or_else(|| self.selected.min(self.tasks.len().saturating_sub(1)));
        self.ensure_visible();
        self.state.needs_redraw = true;
    }

    fn tasks(&self) -> &[TaskViewModel] {
        &self.tasks
    }

    fn selected_index(&self) -> Option<usize> {
        (!self.tasks.is_empty()).then_some(self.selected)
    }

    fn selected_task(&self) -> Option<&TaskViewModel> {
        self.tasks.get(self.selected)
    }

    fn select_task(&mut self, id: &TaskId) -> bool {
        match self.tasks.iter().position(|t| &t.id == id) {
            Some(index) => {
                self.selected = index;
                self.ensure_visible();
                self.state.needs_redraw = true;
                true
            }
            None => false,
        }
    }

    fn set_filter_label(&mut self, label: Option<String>) {
        if self.filter_label != label {
            self.filter_label = label;
            self.state.needs_redraw = true;
        }
    }
}
