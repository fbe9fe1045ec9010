//! Modal task editor.
//!
//! The overlay edits a [`TaskDraft`] copied from the task. Nothing touches
//! the store from here: submitting sends [`ViewMessage::EditSubmitted`] and
//! the controller saves through the repository.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Position;
use tokio::sync::mpsc::UnboundedSender;

use taskdeck_core::sanitize::{sanitize_line, sanitize_text};
use taskdeck_core::{Result, Task, TaskId, TaskPriority, TaskStatus};

use crate::terminal::TerminalSurface;
use crate::theme::Theme;
use crate::view::{TaskEditPane, ViewComponent, ViewMessage, ViewState};

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 200;
pub const MAX_ASSIGNEE_LENGTH: usize = 50;

const LABEL_WIDTH: usize = 13;

/// Editable fields, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditField {
    #[default]
    Title,
    Description,
    Priority,
    Status,
    Assignee,
}

impl EditField {
    pub const ALL: [EditField; 5] = [
        EditField::Title,
        EditField::Description,
        EditField::Priority,
        EditField::Status,
        EditField::Assignee,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EditField::Title => "Title",
            EditField::Description => "Description",
            EditField::Priority => "Priority",
            EditField::Status => "Status",
            EditField::Assignee => "Assignee",
        }
    }

    pub fn next(&self) -> EditField {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> EditField {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Free-text fields take typed characters; the others cycle options.
    pub fn is_text(&self) -> bool {
        matches!(self, EditField::Title | EditField::Description | EditField::Assignee)
    }

    fn max_length(&self) -> usize {
        match self {
            EditField::Title => MAX_TITLE_LENGTH,
            EditField::Description => MAX_DESCRIPTION_LENGTH,
            EditField::Assignee => MAX_ASSIGNEE_LENGTH,
            EditField::Priority | EditField::Status => 0,
        }
    }
}

/// Pending edits to one task.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Empty means unassigned
    pub assignee: String,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            assignee: task.assignee.clone().unwrap_or_default(),
        }
    }

    /// Whether the draft can be saved.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Write the draft into `task`, sanitizing text and enforcing lengths.
    pub fn apply(&self, task: &mut Task, at: DateTime<Utc>) {
        task.title = sanitize_line(self.title.trim(), MAX_TITLE_LENGTH);
        task.description = sanitize_text(self.description.trim(), MAX_DESCRIPTION_LENGTH);
        let assignee = sanitize_line(self.assignee.trim(), MAX_ASSIGNEE_LENGTH);
        task.assignee = (!assignee.is_empty()).then_some(assignee);
        task.priority = self.priority;
        if task.status != self.status {
            task.set_status(self.status, at);
        }
        task.updated_at = at;
    }

    fn text(&self, field: EditField) -> Option<&String> {
        match field {
            EditField::Title => Some(&self.title),
            EditField::Description => Some(&self.description),
            EditField::Assignee => Some(&self.assignee),
            EditField::Priority | EditField::Status => None,
        }
    }

    fn text_mut(&mut self, field: EditField) -> Option<&mut String> {
        match field {
            EditField::Title => Some(&mut self.title),
            EditField::Description => Some(&mut self.description),
            EditField::Assignee => Some(&mut self.assignee),
            EditField::Priority | EditField::Status => None,
        }
    }

    fn display(&self, field: EditField) -> String {
        match field {
            EditField::Priority => format!("< {} >", self.priority.label()),
            EditField::Status => format!("< {} >", self.status.label()),
            _ => self
                .text(field)
                .map(|t| t.chars().map(|c| if c == '\n' { ' ' } else { c }).collect())
                .unwrap_or_default(),
        }
    }
}

fn cycle<T: Copy + PartialEq>(options: &[T], current: T, forward: bool) -> T {
    let i = options.iter().position(|o| *o == current).unwrap_or(0);
    let n = options.len();
    if forward {
        options[(i + 1) % n]
    } else {
        options[(i + n - 1) % n]
    }
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Edit overlay.
///
/// Keys: Tab/Down and Shift+Tab/Up move between fields, typing edits the
/// text fields, Left/Right cycle priority and status, Enter or Ctrl+S
/// saves, Esc cancels.
pub struct EditView {
    state: ViewState,
    task_id: Option<TaskId>,
    draft: TaskDraft,
    field: EditField,
    /// Cursor position in chars within the active text field
    cursor: usize,
    error: Option<String>,
    theme: Theme,
    messages: UnboundedSender<ViewMessage>,
}

impl EditView {
    pub fn new(messages: UnboundedSender<ViewMessage>) -> Self {
        Self {
            state: ViewState::default(),
            task_id: None,
            draft: TaskDraft::default(),
            field: EditField::default(),
            cursor: 0,
            error: None,
            theme: Theme::default(),
            messages,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn emit(&self, message: ViewMessage) {
        let _ = self.messages.send(message);
    }

    fn field_len(&self) -> usize {
        self.draft
            .text(self.field)
            .map(|t| t.chars().count())
            .unwrap_or(0)
    }

    fn select_field(&mut self, field: EditField) {
        self.field = field;
        self.cursor = self.field_len();
        self.state.needs_redraw = true;
    }

    fn insert_char(&mut self, c: char) {
        let field = self.field;
        if self.field_len() >= field.max_length() {
            return;
        }
        let cursor = self.cursor;
        if let Some(text) = self.draft.text_mut(field) {
            let at = byte_offset(text, cursor);
            text.insert(at, c);
            self.cursor += 1;
            self.error = None;
            self.state.needs_redraw = true;
        }
    }

    fn delete_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let cursor = self.cursor;
        if let Some(text) = self.draft.text_mut(self.field) {
            let at = byte_offset(text, cursor - 1);
            text.remove(at);
            self.cursor -= 1;
            self.state.needs_redraw = true;
        }
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor >= self.field_len() {
            return;
        }
        let cursor = self.cursor;
        if let Some(text) = self.draft.text_mut(self.field) {
            let at = byte_offset(text, cursor);
            text.remove(at);
            self.state.needs_redraw = true;
        }
    }

    fn clear_field(&mut self) {
        if let Some(text) = self.draft.text_mut(self.field) {
            text.clear();
            self.cursor = 0;
            self.state.needs_redraw = true;
        }
    }

    fn move_cursor(&mut self, to: usize) {
        self.cursor = to.min(self.field_len());
        self.state.needs_redraw = true;
    }

    fn cycle_choice(&mut self, forward: bool) {
        match self.field {
            EditField::Priority => {
                self.draft.priority = cycle(&TaskPriority::ALL, self.draft.priority, forward)
            }
            EditField::Status => self.draft.status = cycle(&TaskStatus::ALL, self.draft.status, forward),
            _ => return,
        }
        self.state.needs_redraw = true;
    }

    fn submit(&mut self) {
        let Some(id) = self.task_id.clone() else {
            return;
        };
        if !self.draft.is_valid() {
            self.error = Some("Title is required".to_string());
            self.select_field(EditField::Title);
            return;
        }
        self.emit(ViewMessage::EditSubmitted {
            id,
            draft: self.draft.clone(),
        });
    }
}

impl TaskEditPane for EditView {
    fn open(&mut self, task: &Task) {
        self.task_id = Some(task.id.clone());
        self.draft = TaskDraft::from_task(task);
        self.error = None;
        self.select_field(EditField::Title);
    }

    fn close(&mut self) {
        self.task_id = None;
        self.error = None;
    }

    fn editing(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    fn active_field(&self) -> EditField {
        self.field
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ViewComponent for EditView {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn state(&self) -> &ViewState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    fn paint(&mut self, surface: &mut dyn TerminalSurface) -> Result<()> {
        let area = self.state.area();
        surface.clear_area(area);
        let title = match &self.task_id {
            Some(id) => format!(" Edit {} ", id.as_str().chars().take(20).collect::<String>()),
            None => " Edit ".to_string(),
        };
        surface.draw_box(area, Some(&title), Some(self.theme.border(true)));
        if area.width < 4 || area.height < 4 {
            return Ok(());
        }
        let x = area.x + 1;
        let width = (area.width - 2) as usize;
        let value_width = width.saturating_sub(LABEL_WIDTH).max(1);
        let mut cursor_at = None;

        for (row, field) in EditField::ALL.iter().enumerate() {
            let y = area.y + 1 + row as u16;
            if y >= area.bottom() - 1 {
                break;
            }
            let active = *field == self.field;
            let label_style = if active {
                self.theme.selected(true)
            } else {
                self.theme.heading()
            };
            let label = format!("{:<LABEL_WIDTH$}", format!("{}:", field.label()));
            let label: String = label.chars().take(width).collect();
            surface.write(&label, Some(Position::new(x, y)), Some(label_style));

            let value = self.draft.display(*field);
            let start = if active && field.is_text() {
                self.cursor.saturating_sub(value_width - 1)
            } else {
                0
            };
            let visible: String = value.chars().skip(start).take(value_width).collect();
            let style = match field {
                EditField::Priority => self.theme.priority(self.draft.priority),
                EditField::Status => self.theme.status(self.draft.status),
                _ => self.theme.text(),
            };
            surface.write(&visible, Some(Position::new(x + LABEL_WIDTH as u16, y)), Some(style));
            if active && field.is_text() {
                let column = x as usize + LABEL_WIDTH + self.cursor - start;
                cursor_at = Some(Position::new(column.min((area.right() - 2) as usize) as u16, y));
            }
        }

        let error_row = area.y + 2 + EditField::ALL.len() as u16;
        if let Some(error) = &self.error {
            if error_row < area.bottom() - 1 {
                let line: String = error.chars().take(width).collect();
                surface.write(&line, Some(Position::new(x, error_row)), Some(self.theme.highlight()));
            }
        }
        let help_row = area.bottom() - 2;
        if help_row > error_row {
            let help: String = "Tab: next field  \u{2190}/\u{2192}: change  Enter: save  Esc: cancel"
                .chars()
                .take(width)
                .collect();
            surface.write(&help, Some(Position::new(x, help_row)), Some(self.theme.dim()));
        }

        if self.state.focused {
            match cursor_at {
                Some(position) => {
                    surface.set_cursor_position(position);
                    surface.show_cursor()?;
                }
                None => surface.hide_cursor()?,
            }
        }
        Ok(())
    }

    fn on_key_press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match code {
                KeyCode::Char('s') => self.submit(),
                KeyCode::Char('u') => self.clear_field(),
                _ => return false,
            }
            return true;
        }
        if modifiers.contains(KeyModifiers::ALT) {
            return false;
        }
        let text = self.field.is_text();
        match code {
            KeyCode::Esc => self.emit(ViewMessage::EditCancelled),
            KeyCode::Enter => self.submit(),
            KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => self.select_field(self.field.prev()),
            KeyCode::Tab | KeyCode::Down => self.select_field(self.field.next()),
            KeyCode::BackTab | KeyCode::Up => self.select_field(self.field.prev()),
            KeyCode::Left if text => self.move_cursor(self.cursor.saturating_sub(1)),
            KeyCode::Right if text => self.move_cursor(self.cursor + 1),
            KeyCode::Home if text => self.move_cursor(0),
            KeyCode::End if text => self.move_cursor(usize::MAX),
            KeyCode::Backspace if text => self.delete_before_cursor(),
            KeyCode::Delete if text => self.delete_at_cursor(),
            KeyCode::Char(c) if text => self.insert_char(c),
            KeyCode::Left | KeyCode::Char('h') => self.cycle_choice(false),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => self.cycle_choice(true),
            // Modal: swallow everything else
            _ => {}
        }
        true
    }

    fn dispose(&mut self) {
        self.close();
        self.state.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::RatatuiSurface;
    use chrono::TimeZone;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;
    use tokio::sync::mpsc;

    fn task() -> Task {
        Task::new("t-1", "Fix login")
            .with_description("Users cannot log in")
            .with_priority(TaskPriority::High)
            .with_assignee("alice")
    }

    fn editor() -> (EditView, mpsc::UnboundedReceiver<ViewMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut view = EditView::new(tx);
        view.set_area(Rect::new(0, 0, 60, 11));
        view.open(&task());
        view.show();
        view.focus();
        (view, rx)
    }

    fn press(view: &mut EditView, code: KeyCode) -> bool {
        view.on_key_press(code, KeyModifiers::NONE)
    }

    fn type_text(view: &mut EditView, text: &str) {
        for c in text.chars() {
            press(view, KeyCode::Char(c));
        }
    }

    fn row(surface: &RatatuiSurface<TestBackend>, y: u16) -> String {
        let buffer = surface.buffer();
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_open_copies_task_into_draft() {
        let (view, _rx) = editor();
        assert_eq!(view.editing(), Some(&TaskId::new("t-1")));
        assert_eq!(view.draft().title, "Fix login");
        assert_eq!(view.draft().assignee, "alice");
        assert_eq!(view.active_field(), EditField::Title);
        assert_eq!(view.cursor(), 9);
    }

    #[test]
    fn test_typing_edits_active_field_at_cursor() {
        let (mut view, _rx) = editor();
        press(&mut view, KeyCode::Home);
        type_text(&mut view, "Do: ");
        press(&mut view, KeyCode::End);
        press(&mut view, KeyCode::Backspace);
        assert_eq!(view.draft().title, "Do: Fix logi");

        press(&mut view, KeyCode::Tab);
        assert_eq!(view.active_field(), EditField::Description);
        view.on_key_press(KeyCode::Char('u'), KeyModifiers::CONTROL);
        type_text(&mut view, "Broken");
        assert_eq!(view.draft().description, "Broken");
    }

    #[test]
    fn test_choice_fields_cycle_and_wrap() {
        let (mut view, _rx) = editor();
        press(&mut view, KeyCode::Tab);
        press(&mut view, KeyCode::Tab);
        assert_eq!(view.active_field(), EditField::Priority);
        press(&mut view, KeyCode::Left);
        assert_eq!(view.draft().priority, TaskPriority::Critical);
        press(&mut view, KeyCode::Left);
        assert_eq!(view.draft().priority, TaskPriority::Low);

        press(&mut view, KeyCode::Down);
        press(&mut view, KeyCode::Char(' '));
        assert_eq!(view.draft().status, TaskStatus::InProgress);
        // Letters do not leak into the draft from a choice field
        assert!(press(&mut view, KeyCode::Char('x')));
        assert_eq!(view.draft().title, "Fix login");
    }

    #[test]
    fn test_field_navigation_wraps() {
        let (mut view, _rx) = editor();
        press(&mut view, KeyCode::BackTab);
        assert_eq!(view.active_field(), EditField::Assignee);
        press(&mut view, KeyCode::Tab);
        assert_eq!(view.active_field(), EditField::Title);
    }

    #[test]
    fn test_text_fields_stop_at_max_length() {
        let (mut view, _rx) = editor();
        press(&mut view, KeyCode::BackTab);
        type_text(&mut view, &"x".repeat(80));
        assert_eq!(view.draft().assignee.chars().count(), MAX_ASSIGNEE_LENGTH);
    }

    #[test]
    fn test_enter_submits_draft() {
        let (mut view, mut rx) = editor();
        type_text(&mut view, " now");
        press(&mut view, KeyCode::Enter);
        match rx.try_recv().unwrap() {
            ViewMessage::EditSubmitted { id, draft } => {
                assert_eq!(id, TaskId::new("t-1"));
                assert_eq!(draft.title, "Fix login now");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let (mut view, mut rx) = editor();
        press(&mut view, KeyCode::Tab);
        view.on_key_press(KeyCode::Char('u'), KeyModifiers::CONTROL);
        press(&mut view, KeyCode::BackTab);
        view.on_key_press(KeyCode::Char('u'), KeyModifiers::CONTROL);
        press(&mut view, KeyCode::Tab);
        view.on_key_press(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert!(rx.try_recv().is_err());
        assert_eq!(view.error(), Some("Title is required"));
        assert_eq!(view.active_field(), EditField::Title);

        type_text(&mut view, "A");
        assert_eq!(view.error(), None);
    }

    #[test]
    fn test_escape_cancels() {
        let (mut view, mut rx) = editor();
        type_text(&mut view, "!!");
        press(&mut view, KeyCode::Esc);
        assert_eq!(rx.try_recv().unwrap(), ViewMessage::EditCancelled);
    }

    #[test]
    fn test_other_control_keys_pass_through() {
        let (mut view, _rx) = editor();
        assert!(!view.on_key_press(KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn test_apply_sanitizes_and_tracks_completion() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut target = task();
        let draft = TaskDraft {
            title: "  New \x1b[31mtitle\x1b[0m  ".into(),
            description: "d".repeat(300),
            priority: TaskPriority::Low,
            status: TaskStatus::Completed,
            assignee: "   ".into(),
        };
        draft.apply(&mut target, at);

        assert_eq!(target.title, "New title");
        assert!(target.description.chars().count() <= MAX_DESCRIPTION_LENGTH);
        assert!(target.description.ends_with("..."));
        assert_eq!(target.assignee, None);
        assert_eq!(target.priority, TaskPriority::Low);
        assert_eq!(target.status, TaskStatus::Completed);
        assert_eq!(target.completed_at, Some(at));
        assert_eq!(target.updated_at, at);
    }

    #[test]
    fn test_paint_shows_fields_and_cursor() {
        let (mut view, _rx) = editor();
        let mut surface = RatatuiSurface::new(TestBackend::new(60, 11)).unwrap();
        view.render(&mut surface).unwrap();

        assert!(row(&surface, 0).contains(" Edit t-1 "));
        assert!(row(&surface, 1).contains("Title:       Fix login"));
        assert!(row(&surface, 3).contains("< High >"));
        assert!(surface.cursor_visible());

        press(&mut view, KeyCode::Tab);
        press(&mut view, KeyCode::Tab);
        view.render(&mut surface).unwrap();
        assert!(!surface.cursor_visible());
    }
}
