//! Search overlay with debounced queries.
//!
//! Typing edits the query; once input has been idle for the debounce
//! interval a [`ViewMessage::SearchRequested`] goes out carrying a
//! monotonically increasing sequence number. Results are accepted only for
//! the most recent sequence, so a slow query can never overwrite a newer one.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Position;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use taskdeck_core::Result;

use crate::terminal::TerminalSurface;
use crate::theme::Theme;
use crate::view::{SearchHit, SearchPane, ViewComponent, ViewMessage, ViewState};

/// Where the search session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    /// Never opened
    #[default]
    Idle,
    /// Accepting input
    Editing,
    /// A query is running
    Querying,
    Closed,
}

/// Search overlay.
///
/// Keys: printable characters edit, Left/Right/Home/End move the cursor,
/// Up/Down recall history, Tab/Shift+Tab or Ctrl+N/Ctrl+P move through
/// results, Enter picks a result, Esc closes.
pub struct SearchView {
    state: ViewState,
    phase: SearchState,
    query: String,
    /// Cursor position in chars
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
    results: Vec<SearchHit>,
    selected: usize,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
    latest_seq: u64,
    theme: Theme,
    messages: UnboundedSender<ViewMessage>,
}

impl SearchView {
    pub fn new(messages: UnboundedSender<ViewMessage>, debounce: Duration) -> Self {
        Self {
            state: ViewState::default(),
            phase: SearchState::Idle,
            query: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: None,
            results: Vec::new(),
            selected: 0,
            debounce,
            pending: None,
            latest_seq: 0,
            theme: Theme::default(),
            messages,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.results.is_empty()).then_some(self.selected)
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.query
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.query.len())
    }

    fn set_query(&mut self, query: String) {
        self.cursor = query.chars().count();
        self.query = query;
        self.query_changed();
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.query.insert(at, c);
        self.cursor += 1;
        self.history_index = None;
        self.query_changed();
    }

    fn delete_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_offset(self.cursor - 1);
        self.query.remove(at);
        self.cursor -= 1;
        self.history_index = None;
        self.query_changed();
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor >= self.query.chars().count() {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.query.remove(at);
        self.query_changed();
    }

    fn move_cursor(&mut self, to: usize) {
        self.cursor = to.min(self.query.chars().count());
        self.state.needs_redraw = true;
    }

    fn recall_history(&mut self, older: bool) {
        if self.history.is_empty() {
            return;
        }
        let last = self.history.len() - 1;
        let index = match (self.history_index, older) {
            (None, true) => last,
            (None, false) => return,
            (Some(i), true) => i.saturating_sub(1),
            (Some(i), false) if i >= last => {
                self.history_index = None;
                self.set_query(String::new());
                return;
            }
            (Some(i), false) => i + 1,
        };
        self.history_index = Some(index);
        self.set_query(self.history[index].clone());
    }

    fn move_selection(&mut self, forward: bool) {
        if self.results.is_empty() {
            return;
        }
        let len = self.results.len();
        self.selected = if forward {
            (self.selected + 1) % len
        } else {
            (self.selected + len - 1) % len
        };
        self.state.needs_redraw = true;
    }

    fn push_history(&mut self) {
        let query = self.query.trim();
        if !query.is_empty() && self.history.last().map(String::as_str) != Some(query) {
            self.history.push(query.to_string());
        }
        self.history_index = None;
    }

    fn submit(&mut self) {
        match self.results.get(self.selected) {
            Some(hit) => {
                let id = hit.task.id.clone();
                self.push_history();
                self.cancel_pending();
                self.phase = SearchState::Closed;
                self.emit(ViewMessage::SearchResultSelected(id));
            }
            None => {
                self.cancel_pending();
                self.dispatch_now();
            }
        }
    }

    fn query_changed(&mut self) {
        self.state.needs_redraw = true;
        self.phase = SearchState::Editing;
        self.schedule_search();
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Restart the debounce timer for the current query.
    fn schedule_search(&mut self) {
        self.cancel_pending();
        self.latest_seq += 1;
        let seq = self.latest_seq;
        let query = self.query.clone();
        let tx = self.messages.clone();
        let delay = self.debounce;

        match Handle::try_current() {
            Ok(runtime) => {
                self.pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(ViewMessage::SearchRequested { seq, query });
                }));
            }
            Err(_) => {
                warn!("no async runtime, search dispatched without debounce");
                self.emit(ViewMessage::SearchRequested { seq, query });
            }
        }
    }

    fn dispatch_now(&mut self) {
        self.latest_seq += 1;
        self.emit(ViewMessage::SearchRequested {
            seq: self.latest_seq,
            query: self.query.clone(),
        });
    }

    fn emit(&self, message: ViewMessage) {
        if self.messages.send(message).is_err() {
            debug!("search view message dropped, controller gone");
        }
    }

    fn status_line(&self) -> String {
        match self.phase {
            SearchState::Querying => "Searching...".to_string(),
            _ if self.query.trim().is_empty() => "Type to search".to_string(),
            _ if self.results.is_empty() => "No matches".to_string(),
            _ => format!("{} result(s)", self.results.len()),
        }
    }
}

impl ViewComponent for SearchView {
    fn name(&self) -> &'static str {
        "search"
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
        surface.draw_box(area, Some(" Search "), Some(self.theme.border(true)));
        if area.width < 4 || area.height < 4 {
            return Ok(());
        }
        let x = area.x + 1;
        let width = (area.width - 2) as usize;

        let prompt = format!("> {}", self.query);
        let visible_prompt: String = prompt.chars().take(width).collect();
        surface.write(&visible_prompt, Some(Position::new(x, area.y + 1)), Some(self.theme.text()));
        surface.write(
            &self.status_line(),
            Some(Position::new(x, area.y + 2)),
            Some(self.theme.dim()),
        );

        let rows = (area.height as usize).saturating_sub(4);
        let first = self.selected.saturating_sub(rows.saturating_sub(1));
        for (row, (index, hit)) in self.results.iter().enumerate().skip(first).take(rows).enumerate() {
            let y = area.y + 3 + row as u16;
            let selected = index == self.selected;
            let base = if selected {
                self.theme.selected(true)
            } else {
                self.theme.text()
            };
            let marker = if selected { "> " } else { "  " };
            let prefix = format!("{marker}{} {:<6} ", hit.task.status_icon, hit.task.priority_badge);
            surface.write(&prefix, Some(Position::new(x, y)), Some(base));

            let mut remaining = width.saturating_sub(prefix.chars().count());
            for (i, c) in hit.task.title.chars().enumerate() {
                if remaining == 0 {
                    break;
                }
                let matched = hit.title_spans.iter().any(|&(s, e)| i >= s && i < e);
                let style = if matched { base.patch(self.theme.highlight()) } else { base };
                surface.write(&c.to_string(), None, Some(style));
                remaining -= 1;
            }
        }

        if self.state.focused {
            let column = x as usize + 2 + self.cursor;
            let column = column.min((area.right() - 2) as usize) as u16;
            surface.set_cursor_position(Position::new(column, area.y + 1));
            surface.show_cursor()?;
        }
        Ok(())
    }

    fn on_key_press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match code {
                KeyCode::Char('n') => self.move_selection(true),
                KeyCode::Char('p') => self.move_selection(false),
                KeyCode::Char('u') => self.set_query(String::new()),
                _ => return false,
            }
            return true;
        }
        match code {
            KeyCode::Esc => {
                self.cancel_pending();
                self.phase = SearchState::Closed;
                self.emit(ViewMessage::SearchClosed);
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => self.move_selection(false),
            KeyCode::Tab => self.move_selection(true),
            KeyCode::BackTab => self.move_selection(false),
            KeyCode::Up => self.recall_history(true),
            KeyCode::Down => self.recall_history(false),
            KeyCode::Left => self.move_cursor(self.cursor.saturating_sub(1)),
            KeyCode::Right => self.move_cursor(self.cursor + 1),
            KeyCode::Home => self.move_cursor(0),
            KeyCode::End => self.move_cursor(usize::MAX),
            KeyCode::Backspace => self.delete_before_cursor(),
            KeyCode::Delete => self.delete_at_cursor(),
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::ALT) => self.insert_char(c),
            _ => return false,
        }
        true
    }

    fn dispose(&mut self) {
        self.cancel_pending();
        self.state.visible = false;
    }
}

impl SearchPane for SearchView {
    fn open(&mut self) {
        self.cancel_pending();
        self.phase = SearchState::Editing;
        self.query.clear();
        self.cursor = 0;
        self.history_index = None;
        self.results.clear();
        self.selected = 0;
        self.state.needs_redraw = true;
    }

    fn close(&mut self) {
        self.cancel_pending();
        self.phase = SearchState::Closed;
    }

    fn search_state(&self) -> SearchState {
        self.phase
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn results(&self) -> &[SearchHit] {
        &self.results
    }

    fn history(&self) -> &[String] {
        &self.history
    }

    fn begin_query(&mut self, seq: u64) -> bool {
        if seq != self.latest_seq || self.phase == SearchState::Closed {
            return false;
        }
        self.phase = SearchState::Querying;
        self.state.needs_redraw = true;
        true
    }

    fn apply_results(&mut self, seq: u64, hits: Vec<SearchHit>) -> bool {
        if seq != self.latest_seq || self.phase == SearchState::Closed {
            debug!(seq, latest = self.latest_seq, "discarding stale search results");
            return false;
        }
        self.results = hits;
        self.selected = 0;
        self.phase = SearchState::Editing;
        self.state.needs_redraw = true;
        true
    }

    fn abandon_query(&mut self, seq: u64) {
        if seq == self.latest_seq && self.phase == SearchState::Querying {
            self.phase = SearchState::Editing;
            self.state.needs_redraw = true;
        }
    }
}
