//! Global key bindings.
//!
//! Keys reach the focused view first. Whatever it declines is mapped here
//! to an application-level action.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::layout::LayoutKind;

/// Application-level actions bound to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Open the search overlay
    OpenSearch,
    /// Move focus to the other pane
    SwitchFocus,
    SetLayout(LayoutKind),
    /// Return from detail to list
    Back,
    /// Reload tasks from the repository
    Refresh,
    /// Cycle the list's status filter
    CycleFilter,
    /// Toggle the selected task's status
    ToggleStatus,
    /// Open the editor on the current task
    EditTask,
    Quit,
    /// Ctrl+C or Ctrl+Q
    ForceQuit,
    None,
}

/// Map a key the focused view did not consume.
pub fn global_action(key: &KeyEvent) -> AppEvent {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => AppEvent::ForceQuit,
            KeyCode::Char('r') => AppEvent::Refresh,
            _ => AppEvent::None,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => AppEvent::Quit,
        KeyCode::Char('/') => AppEvent::OpenSearch,
        KeyCode::Tab | KeyCode::BackTab => AppEvent::SwitchFocus,
        KeyCode::Char(c @ '1'..='3') => LayoutKind::from_hotkey(c)
            .map(AppEvent::SetLayout)
            .unwrap_or(AppEvent::None),
        KeyCode::Esc => AppEvent::Back,
        KeyCode::Char('r') | KeyCode::Char('R') => AppEvent::Refresh,
        KeyCode::Char('f') | KeyCode::Char('F') => AppEvent::CycleFilter,
        KeyCode::Char(' ') => AppEvent::ToggleStatus,
        KeyCode::Char('e') | KeyCode::Char('E') => AppEvent::EditTask,
        _ => AppEvent::None,
    }
}
