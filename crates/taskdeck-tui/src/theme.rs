//! Colors and styles shared by the views.

use ratatui::style::{Color, Modifier, Style};
use taskdeck_core::{TaskPriority, TaskStatus};

/// Color palette.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    /// Pane titles and focused borders
    pub header: Color,
    pub text: Color,
    /// Timestamps, hints, empty-state messages
    pub text_dim: Color,
    /// Unfocused borders
    pub border_dim: Color,
    /// Selected row background
    pub selection: Color,
    /// Characters matched by a search
    pub match_highlight: Color,
    pub status_pending: Color,
    pub status_active: Color,
    pub status_done: Color,
    pub status_blocked: Color,
    pub status_cancelled: Color,
    pub priority_critical: Color,
    pub priority_high: Color,
    pub priority_medium: Color,
    pub priority_low: Color,
}

/// Complete theme definition.
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ThemeColors,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ThemeColors {
                header: Color::Cyan,
                text: Color::White,
                text_dim: Color::Gray,
                border_dim: Color::DarkGray,
                selection: Color::Rgb(40, 60, 90),
                match_highlight: Color::Yellow,
                status_pending: Color::White,
                status_active: Color::Cyan,
                status_done: Color::Green,
                status_blocked: Color::Red,
                status_cancelled: Color::DarkGray,
                priority_critical: Color::Red,
                priority_high: Color::Yellow,
                priority_medium: Color::Blue,
                priority_low: Color::Gray,
            },
        }
    }
}

impl Theme {
    /// Border style for a pane, brighter when focused.
    pub fn border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.colors.header).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.colors.border_dim)
        }
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.colors.text)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.colors.text_dim)
    }

    pub fn heading(&self) -> Style {
        Style::default().fg(self.colors.header).add_modifier(Modifier::BOLD)
    }

    /// Style for the selected row; only emphasized while the pane has focus.
    pub fn selected(&self, focused: bool) -> Style {
        let style = Style::default().bg(self.colors.selection);
        if focused {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.colors.match_highlight)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    pub fn status(&self, status: TaskStatus) -> Style {
        let color = match status {
            TaskStatus::Pending => self.colors.status_pending,
            TaskStatus::InProgress => self.colors.status_active,
            TaskStatus::Completed => self.colors.status_done,
            TaskStatus::Blocked => self.colors.status_blocked,
            TaskStatus::Cancelled => self.colors.status_cancelled,
        };
        Style::default().fg(color)
    }

    pub fn priority(&self, priority: TaskPriority) -> Style {
        let color = match priority {
            TaskPriority::Critical => self.colors.priority_critical,
            TaskPriority::High => self.colors.priority_high,
            TaskPriority::Medium => self.colors.priority_medium,
            TaskPriority::Low => self.colors.priority_low,
        };
        let style = Style::default().fg(color);
        if priority == TaskPriority::Critical {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_changes_border() {
        let theme = Theme::default();
        assert_ne!(theme.border(true), theme.border(false));
    }

    #[test]
    fn test_status_colors_distinguish_done_and_blocked() {
        let theme = Theme::default();
        assert_ne!(
            theme.status(TaskStatus::Completed),
            theme.status(TaskStatus::Blocked)
        );
    }
}
