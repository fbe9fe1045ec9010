//! Sectioned task detail pane.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::{Position, Size};
use ratatui::style::Style;

use taskdeck_core::Result;

use crate::terminal::TerminalSurface;
use crate::theme::Theme;
use crate::view::{TaskDetailPane, ViewComponent, ViewState};
use crate::view_model::TaskViewModel;

/// Detail sections, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailSection {
    #[default]
    Overview,
    Description,
    Metadata,
    Subtasks,
}

impl DetailSection {
    pub const ALL: [DetailSection; 4] = [
        DetailSection::Overview,
        DetailSection::Description,
        DetailSection::Metadata,
        DetailSection::Subtasks,
    ];

    fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> DetailSection {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> DetailSection {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn title(&self) -> &'static str {
        match self {
            DetailSection::Overview => "Overview",
            DetailSection::Description => "Description",
            DetailSection::Metadata => "Metadata",
            DetailSection::Subtasks => "Subtasks",
        }
    }
}

/// Task detail pane.
///
/// Tab/Shift+Tab cycle sections, `j`/`k` scroll the active section.
/// Changing section resets the scroll offset.
pub struct DetailView {
    state: ViewState,
    task: Option<TaskViewModel>,
    section: DetailSection,
    scroll_offset: usize,
    theme: Theme,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    pub fn new() -> Self {
        Self {
            state: ViewState::default(),
            task: None,
            section: DetailSection::default(),
            scroll_offset: 0,
            theme: Theme::default(),
        }
    }

    /// Rows available for section content: inside the border, below the
    /// tab bar and its separator.
    fn content_height(&self) -> usize {
        (self.state.size.height as usize).saturating_sub(4)
    }

    fn content_width(&self) -> usize {
        (self.state.size.width as usize).saturating_sub(2)
    }

    fn max_scroll(&self) -> usize {
        self.section_lines()
            .len()
            .saturating_sub(self.content_height())
    }

    fn switch_section(&mut self, section: DetailSection) {
        self.section = section;
        self.scroll_offset = 0;
        self.state.needs_redraw = true;
    }

    fn scroll_by(&mut self, delta: isize) {
        let next = self
            .scroll_offset
            .saturating_add_signed(delta)
            .min(self.max_scroll());
        if next != self.scroll_offset {
            self.scroll_offset = next;
            self.state.needs_redraw = true;
        }
    }

    /// Lines of the active section, wrapped to the pane width.
    fn section_lines(&self) -> Vec<(String, Style)> {
        let Some(task) = &self.task else {
            return Vec::new();
        };
        let text = self.theme.text();
        let dim = self.theme.dim();

        let lines: Vec<(String, Style)> = match self.section {
            DetailSection::Overview => {
                let mut lines = vec![
                    (task.title.clone(), self.theme.heading()),
                    (String::new(), text),
                    (
                        format!("Status:   {} {}", task.status_icon, task.status.label()),
                        self.theme.status(task.status),
                    ),
                    (
                        format!("Priority: {} {}", task.priority_badge, task.priority.label()),
                        self.theme.priority(task.priority),
                    ),
                    (format!("Duration: {}", task.duration), text),
                ];
                if let Some(progress) = task.progress {
                    lines.push((format!("Progress: {progress}%"), text));
                }
                if !task.tags.is_empty() {
                    lines.push((format!("Tags:     {}", task.tags.join(", ")), text));
                }
                lines
            }
            DetailSection::Description if task.description.is_empty() => {
                vec![("No description".to_string(), dim)]
            }
            DetailSection::Description => task
                .description
                .lines()
                .map(|l| (l.to_string(), text))
                .collect(),
            DetailSection::Metadata => {
                let mut lines = vec![
                    (format!("ID:        {}", task.id), text),
                    (format!("Created:   {}", task.created), text),
                    (format!("Updated:   {}", task.updated), text),
                ];
                if let Some(completed) = &task.completed {
                    lines.push((format!("Completed: {completed}"), text));
                }
                if let Some(assignee) = &task.assignee {
                    lines.push((format!("Assignee:  {assignee}"), text));
                }
                if let Some(hours) = task.estimated_hours {
                    lines.push((format!("Estimate:  {hours}h"), text));
                }
                if let Some(parent) = &task.parent_id {
                    lines.push((format!("Parent:    {parent}"), text));
                }
                lines
            }
            DetailSection::Subtasks if task.subtasks.is_empty() => {
                vec![("No subtasks".to_string(), dim)]
            }
            DetailSection::Subtasks => task
                .subtasks
                .iter()
                .map(|s| match (&s.title, s.status) {
                    (Some(title), Some(status)) => {
                        (format!("{} {title}", s.status_icon()), self.theme.status(status))
                    }
                    _ => (format!("{} {} (not loaded)", s.status_icon(), s.id), dim),
                })
                .collect(),
        };

        wrap_lines(lines, self.content_width())
    }
}

fn wrap_lines(lines: Vec<(String, Style)>, width: usize) -> Vec<(String, Style)> {
    if width == 0 {
        return lines;
    }
    let mut wrapped = Vec::with_capacity(lines.len());
    for (line, style) in lines {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            wrapped.push((String::new(), style));
            continue;
        }
        for chunk in chars.chunks(width) {
            wrapped.push((chunk.iter().collect(), style));
        }
    }
    wrapped
}

impl ViewComponent for DetailView {
    fn name(&self) -> &'static str {
        "detail"
    }

    fn state(&self) -> &ViewState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    fn set_dimensions(&mut self, size: Size) {
        if self.state.size != size {
            self.state.size = size;
            self.scroll_offset = self.scroll_offset.min(self.max_scroll());
            self.state.needs_redraw = true;
        }
    }

    fn paint(&mut self, surface: &mut dyn TerminalSurface) -> Result<()> {
        let area = self.state.area();
        surface.clear_area(area);
        surface.draw_box(area, Some(" Details "), Some(self.theme.border(self.state.focused)));
        if area.width < 3 || area.height < 3 {
            return Ok(());
        }
        let x = area.x + 1;
        let width = self.content_width();

        if self.task.is_none() {
            surface.write(
                "No task selected",
                Some(Position::new(x, area.y + 1)),
                Some(self.theme.dim()),
            );
            return Ok(());
        }

        surface.write("", Some(Position::new(x, area.y + 1)), None);
        for section in DetailSection::ALL {
            let style = if section == self.section {
                self.theme.heading()
            } else {
                self.theme.dim()
            };
            surface.write(&format!(" {} ", section.title()), None, Some(style));
        }
        if area.height > 3 {
            surface.write(
                &"─".repeat(width),
                Some(Position::new(x, area.y + 2)),
                Some(self.theme.dim()),
            );
        }

        let lines = self.section_lines();
        let visible = lines.iter().skip(self.scroll_offset).take(self.content_height());
        for (row, (line, style)) in visible.enumerate() {
            surface.write(line, Some(Position::new(x, area.y + 3 + row as u16)), Some(*style));
        }
        Ok(())
    }

    fn on_key_press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if self.task.is_none() || modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return false;
        }
        match code {
            KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => {
                self.switch_section(self.section.prev())
            }
            KeyCode::Tab => self.switch_section(self.section.next()),
            KeyCode::BackTab => self.switch_section(self.section.prev()),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::PageDown => self.scroll_by(self.content_height().max(1) as isize),
            KeyCode::PageUp => self.scroll_by(-(self.content_height().max(1) as isize)),
            _ => return false,
        }
        true
    }
}

impl TaskDetailPane for DetailView {
    fn set_task(&mut self, task: Option<TaskViewModel>) {
        let same_task = match (&self.task, &task) {
            (Some(current), Some(next)) => current.id == next.id,
            _ => false,
        };
        self.task = task;
        if same_task {
            self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        } else {
            self.section = DetailSection::default();
            self.scroll_offset = 0;
        }
        self.state.needs_redraw = true;
    }

    fn task(&self) -> Option<&TaskViewModel> {
        self.task.as_ref()
    }

    fn active_section(&self) -> DetailSection {
        self.section
    }

    fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }
}
