//! Terminal surface for the TaskDeck viewer.
//!
//! The surface abstracts a character grid: dimensions, cursor, styled text,
//! boxes, and key/resize event sources. Views paint into an off-screen
//! buffer; [`TerminalSurface::refresh`] flushes it to the display in one
//! frame.
//!
//! Key and resize events are fanned out to listeners over tokio channels, so
//! the single driver loop can `select!` over them alongside everything else.

use std::io::{self, IsTerminal, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::Style;
use ratatui::widgets::{Block, Clear, Widget};
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use taskdeck_core::{Result, TaskDeckError};

/// How long the input thread blocks on each poll before checking for shutdown.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Identifier returned when registering a listener.
pub type ListenerId = u64;

/// Character-grid display contract used by every view.
pub trait TerminalSurface {
    /// Blank the whole surface and force a full repaint on the next refresh.
    fn clear(&mut self) -> Result<()>;

    /// Flush pending writes to the display.
    fn refresh(&mut self) -> Result<()>;

    /// Current width and height in cells.
    fn dimensions(&self) -> Size;

    /// Off-screen contents as of the last write.
    fn buffer(&self) -> &Buffer;

    /// Adopt new dimensions after a resize event, keeping overlapping content.
    fn resize(&mut self, size: Size);

    fn show_cursor(&mut self) -> Result<()>;

    fn hide_cursor(&mut self) -> Result<()>;

    fn set_cursor_position(&mut self, position: Position);

    /// Write text at `position` (or where the last write ended). Newlines
    /// continue at the starting column on the next row. Text past the
    /// right edge is clipped.
    fn write(&mut self, text: &str, position: Option<Position>, style: Option<Style>);

    /// Write text, then move the write position to the start of the next row.
    fn write_line(&mut self, text: &str, position: Option<Position>, style: Option<Style>);

    /// Draw a bordered box with an optional title.
    fn draw_box(&mut self, area: Rect, title: Option<&str>, style: Option<Style>);

    /// Blank a rectangular region.
    fn clear_area(&mut self, area: Rect);

    /// Register for key presses.
    fn on_key_press(&mut self) -> EventListener<KeyEvent>;

    /// Register for terminal resizes.
    fn on_resize(&mut self) -> EventListener<Size>;

    /// Unregister a listener. Returns false if it was not registered.
    fn remove_listener(&mut self, id: ListenerId) -> bool;

    /// Release listeners and restore the terminal. Idempotent.
    fn dispose(&mut self) -> Result<()>;

    fn is_disposed(&self) -> bool;
}

/// Receiving end of a surface event registration.
#[derive(Debug)]
pub struct EventListener<T> {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> EventListener<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the listener is removed
    /// or the surface is disposed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Default)]
struct Listeners {
    next_id: ListenerId,
    keys: Vec<(ListenerId, mpsc::UnboundedSender<KeyEvent>)>,
    resizes: Vec<(ListenerId, mpsc::UnboundedSender<Size>)>,
}

impl Listeners {
    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared registry of key and resize listeners.
///
/// Cloning shares the registry; the input thread holds one clone and the
/// surface another.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_key_listener(&self) -> EventListener<KeyEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.lock();
        let id = listeners.allocate_id();
        listeners.keys.push((id, tx));
        EventListener { id, rx }
    }

    pub fn add_resize_listener(&self) -> EventListener<Size> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.lock();
        let id = listeners.allocate_id();
        listeners.resizes.push((id, tx));
        EventListener { id, rx }
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.keys.len() + listeners.resizes.len();
        listeners.keys.retain(|(lid, _)| *lid != id);
        listeners.resizes.retain(|(lid, _)| *lid != id);
        before != listeners.keys.len() + listeners.resizes.len()
    }

    /// Deliver a key press to every live listener. Returns the number reached.
    pub fn dispatch_key(&self, key: KeyEvent) -> usize {
        let mut listeners = self.lock();
        listeners.keys.retain(|(_, tx)| tx.send(key).is_ok());
        listeners.keys.len()
    }

    /// Deliver a resize to every live listener. Returns the number reached.
    pub fn dispatch_resize(&self, size: Size) -> usize {
        let mut listeners = self.lock();
        listeners.resizes.retain(|(_, tx)| tx.send(size).is_ok());
        listeners.resizes.len()
    }

    /// Drop every listener; their `recv` calls return `None`.
    pub fn clear(&self) {
        let mut listeners = self.lock();
        listeners.keys.clear();
        listeners.resizes.clear();
    }

    pub fn len(&self) -> usize {
        let listeners = self.lock();
        listeners.keys.len() + listeners.resizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background thread reading crossterm events into a [`ListenerRegistry`].
struct InputPump {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputPump {
    fn spawn(listeners: ListenerRegistry) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("taskdeck-input".into())
            .spawn(move || pump_input(&listeners, &thread_stop))
            .map_err(|e| TaskDeckError::terminal_init(format!("cannot start input thread: {e}")))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("input thread panicked");
            }
        }
    }
}

fn pump_input(listeners: &ListenerRegistry, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match event::poll(INPUT_POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    listeners.dispatch_key(key);
                }
                Ok(Event::Resize(width, height)) => {
                    listeners.dispatch_resize(Size::new(width, height));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "terminal read failed, input stopped");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "terminal poll failed, input stopped");
                break;
            }
        }
    }
    debug!("input thread exiting");
}

/// [`TerminalSurface`] over any ratatui backend.
pub struct RatatuiSurface<B: Backend> {
    terminal: Terminal<B>,
    buffer: Buffer,
    pen: Position,
    cursor: Option<Position>,
    cursor_visible: bool,
    listeners: ListenerRegistry,
    input: Option<InputPump>,
    owns_terminal: bool,
    disposed: bool,
}

/// Surface drawing to the real terminal through crossterm.
pub type CrosstermSurface = RatatuiSurface<CrosstermBackend<Stdout>>;

impl<B: Backend> RatatuiSurface<B> {
    /// Wrap a backend without touching terminal modes. Events only arrive
    /// through [`RatatuiSurface::listeners`].
    pub fn new(backend: B) -> Result<Self> {
        let terminal = Terminal::new(backend).map_err(|e| TaskDeckError::terminal_io("init", e))?;
        let size = terminal
            .size()
            .map_err(|e| TaskDeckError::terminal_io("size", e))?;
        Ok(Self {
            terminal,
            buffer: Buffer::empty(Rect::new(0, 0, size.width, size.height)),
            pen: Position::ORIGIN,
            cursor: None,
            cursor_visible: false,
            listeners: ListenerRegistry::default(),
            input: None,
            owns_terminal: false,
            disposed: false,
        })
    }

    /// Handle on the listener registry, for injecting events.
    pub fn listeners(&self) -> ListenerRegistry {
        self.listeners.clone()
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    fn write_at(&mut self, text: &str, position: Option<Position>, style: Option<Style>) -> Position {
        let start = position.unwrap_or(self.pen);
        let style = style.unwrap_or_default();
        let area = self.buffer.area;
        let mut end = start;

        for (row, line) in text.split('\n').enumerate() {
            let y = start.y.saturating_add(row as u16);
            end = Position::new(start.x, y);
            if !area.contains(end) {
                continue;
            }
            let max_width = area.right().saturating_sub(start.x) as usize;
            let (x, _) = self.buffer.set_stringn(start.x, y, line, max_width, style);
            end = Position::new(x, y);
        }
        end
    }
}

impl CrosstermSurface {
    /// Take over the real terminal: raw mode, alternate screen, hidden
    /// cursor, and an input thread feeding the listeners.
    ///
    /// Fails fast with [`TaskDeckError::TerminalInit`] when the terminal is
    /// unsuitable; there is no text-only fallback.
    pub fn acquire(min_width: u16, min_height: u16) -> Result<Self> {
        check_terminal_compatibility(min_width, min_height)?;

        crossterm::terminal::enable_raw_mode()
            .map_err(|e| TaskDeckError::terminal_init(format!("cannot enable raw mode: {e}")))?;

        let mut stdout = io::stdout();
        if let Err(e) = crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen) {
            let _ = restore_terminal();
            return Err(TaskDeckError::terminal_init(format!(
                "cannot enter alternate screen: {e}"
            )));
        }

        let mut surface = match Self::new(CrosstermBackend::new(stdout)) {
            Ok(surface) => surface,
            Err(e) => {
                let _ = restore_terminal();
                return Err(e);
            }
        };
        surface.owns_terminal = true;

        if let Err(e) = surface.hide_cursor() {
            let _ = restore_terminal();
            return Err(e);
        }

        match InputPump::spawn(surface.listeners()) {
            Ok(pump) => surface.input = Some(pump),
            Err(e) => {
                let _ = restore_terminal();
                return Err(e);
            }
        }

        info!(
            width = surface.dimensions().width,
            height = surface.dimensions().height,
            "terminal acquired"
        );
        Ok(surface)
    }
}

impl<B: Backend> TerminalSurface for RatatuiSurface<B> {
    fn clear(&mut self) -> Result<()> {
        self.buffer.reset();
        self.pen = Position::ORIGIN;
        self.terminal
            .clear()
            .map_err(|e| TaskDeckError::terminal_io("clear", e))
    }

    fn refresh(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let source = &self.buffer;
        let cursor = if self.cursor_visible { self.cursor } else { None };
        self.terminal
            .draw(|frame| {
                let area = frame.area().intersection(source.area);
                let target = frame.buffer_mut();
                for y in area.top()..area.bottom() {
                    for x in area.left()..area.right() {
                        target[(x, y)] = source[(x, y)].clone();
                    }
                }
                if let Some(position) = cursor {
                    frame.set_cursor_position(position);
                }
            })
            .map_err(|e| TaskDeckError::terminal_io("draw", e))?;
        Ok(())
    }

    fn dimensions(&self) -> Size {
        Size::new(self.buffer.area.width, self.buffer.area.height)
    }

    fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    fn resize(&mut self, size: Size) {
        let area = Rect::new(0, 0, size.width, size.height);
        if area == self.buffer.area {
            return;
        }
        let mut next = Buffer::empty(area);
        let overlap = area.intersection(self.buffer.area);
        for y in overlap.top()..overlap.bottom() {
            for x in overlap.left()..overlap.right() {
                next[(x, y)] = self.buffer[(x, y)].clone();
            }
        }
        self.buffer = next;
        debug!(width = size.width, height = size.height, "surface resized");
    }

    fn show_cursor(&mut self) -> Result<()> {
        self.cursor_visible = true;
        self.terminal
            .show_cursor()
            .map_err(|e| TaskDeckError::terminal_io("show cursor", e))
    }

    fn hide_cursor(&mut self) -> Result<()> {
        self.cursor_visible = false;
        self.terminal
            .hide_cursor()
            .map_err(|e| TaskDeckError::terminal_io("hide cursor", e))
    }

    fn set_cursor_position(&mut self, position: Position) {
        self.cursor = Some(position);
    }

    fn write(&mut self, text: &str, position: Option<Position>, style: Option<Style>) {
        self.pen = self.write_at(text, position, style);
    }

    fn write_line(&mut self, text: &str, position: Option<Position>, style: Option<Style>) {
        let start_x = position.unwrap_or(self.pen).x;
        let end = self.write_at(text, position, style);
        self.pen = Position::new(start_x, end.y.saturating_add(1));
    }

    fn draw_box(&mut self, area: Rect, title: Option<&str>, style: Option<Style>) {
        let area = area.intersection(self.buffer.area);
        if area.is_empty() {
            return;
        }
        let mut block = Block::bordered().border_style(style.unwrap_or_default());
        if let Some(title) = title {
            block = block.title(title.to_string());
        }
        block.render(area, &mut self.buffer);
    }

    fn clear_area(&mut self, area: Rect) {
        let area = area.intersection(self.buffer.area);
        Clear.render(area, &mut self.buffer);
    }

    fn on_key_press(&mut self) -> EventListener<KeyEvent> {
        self.listeners.add_key_listener()
    }

    fn on_resize(&mut self) -> EventListener<Size> {
        self.listeners.add_resize_listener()
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if let Some(mut pump) = self.input.take() {
            pump.stop();
        }
        self.listeners.clear();
        self.cursor_visible = true;
        if self.owns_terminal {
            restore_terminal().map_err(|e| TaskDeckError::TerminalRestore {
                message: e.to_string(),
            })?;
            info!("terminal restored");
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<B: Backend> Drop for RatatuiSurface<B> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(error = %e, "terminal restore on drop failed");
        }
    }
}

/// Restore terminal to its normal state.
///
/// Called on dispose, from the panic hook, and on signal-driven exit.
pub fn restore_terminal() -> io::Result<()> {
    let mut stdout = io::stdout();

    let _ = crossterm::terminal::disable_raw_mode();

    crossterm::execute!(
        stdout,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;

    stdout.flush()
}

/// Facts about the environment that decide whether the viewer can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEnvironment {
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub term: Option<String>,
    pub size: Option<Size>,
}

impl TerminalEnvironment {
    /// Inspect the current process.
    pub fn detect() -> Self {
        Self {
            stdin_is_tty: io::stdin().is_terminal(),
            stdout_is_tty: io::stdout().is_terminal(),
            term: std::env::var("TERM").ok(),
            size: crossterm::terminal::size()
                .ok()
                .map(|(width, height)| Size::new(width, height)),
        }
    }

    /// Returns why the viewer cannot run here, if it cannot.
    pub fn incompatibility(&self, min_width: u16, min_height: u16) -> Option<String> {
        if !self.stdin_is_tty || !self.stdout_is_tty {
            return Some("not running in a TTY (terminal required)".to_string());
        }
        let term = self.term.as_deref().unwrap_or_default();
        if matches!(term, "" | "dumb" | "unknown") || term.to_lowercase().contains("emacs") {
            return Some(format!(
                "unsupported terminal type: {}",
                if term.is_empty() { "none" } else { term }
            ));
        }
        match self.size {
            None => Some("cannot determine terminal size".to_string()),
            Some(size) if size.width < min_width || size.height < min_height => Some(format!(
                "terminal too small: {}x{} (minimum {min_width}x{min_height})",
                size.width, size.height
            )),
            Some(_) => None,
        }
    }
}

/// Fail with [`TaskDeckError::TerminalInit`] unless the process can run the viewer.
pub fn check_terminal_compatibility(min_width: u16, min_height: u16) -> Result<()> {
    match TerminalEnvironment::detect().incompatibility(min_width, min_height) {
        Some(reason) => Err(TaskDeckError::terminal_init(reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn surface(width: u16, height: u16) -> RatatuiSurface<TestBackend> {
        RatatuiSurface::new(TestBackend::new(width, height)).unwrap()
    }

    fn row(surface: &RatatuiSurface<TestBackend>, y: u16) -> String {
        let buffer = surface.backend().buffer();
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_write_and_refresh() {
        let mut s = surface(20, 4);
        s.write("hello", Some(Position::new(2, 1)), None);
        s.refresh().unwrap();
        assert!(row(&s, 1).starts_with("  hello"));
    }

    #[test]
    fn test_write_continues_at_pen() {
        let mut s = surface(20, 4);
        s.write("ab", Some(Position::new(0, 0)), None);
        s.write("cd", None, None);
        s.write_line("ef", None, None);
        s.write("gh", None, None);
        s.refresh().unwrap();
        assert!(row(&s, 0).starts_with("abcdef"));
        assert!(row(&s, 1).starts_with("    gh"));
    }

    #[test]
    fn test_write_clips_out_of_bounds() {
        let mut s = surface(5, 2);
        s.write("far away", Some(Position::new(3, 0)), None);
        s.write("gone", Some(Position::new(0, 9)), None);
        s.refresh().unwrap();
        assert_eq!(row(&s, 0), "   fa");
    }

    #[test]
    fn test_draw_box_and_clear_area() {
        let mut s = surface(10, 4);
        s.draw_box(Rect::new(0, 0, 10, 4), Some("T"), None);
        s.refresh().unwrap();
        assert!(row(&s, 0).starts_with("┌T"));
        s.clear_area(Rect::new(0, 0, 10, 4));
        s.refresh().unwrap();
        assert_eq!(row(&s, 0).trim(), "");
    }

    #[test]
    fn test_resize_keeps_overlap() {
        let mut s = surface(10, 3);
        s.write("keep", Some(Position::new(0, 0)), None);
        s.resize(Size::new(20, 6));
        assert_eq!(s.dimensions(), Size::new(20, 6));
        assert_eq!(s.buffer()[(0, 0)].symbol(), "k");
    }

    #[test]
    fn test_listeners_receive_and_unsubscribe() {
        let mut s = surface(10, 3);
        let mut keys = s.on_key_press();
        let mut resizes = s.on_resize();
        let registry = s.listeners();

        let key = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(registry.dispatch_key(key), 1);
        registry.dispatch_resize(Size::new(120, 40));
        assert_eq!(keys.try_recv(), Some(key));
        assert_eq!(resizes.try_recv(), Some(Size::new(120, 40)));

        assert!(s.remove_listener(keys.id()));
        assert!(!s.remove_listener(keys.id()));
        assert_eq!(registry.dispatch_key(key), 0);
    }

    #[test]
    fn test_dispose_releases_listeners() {
        let mut s = surface(10, 3);
        let _keys = s.on_key_press();
        s.dispose().unwrap();
        assert!(s.is_disposed());
        assert!(s.listeners().is_empty());
        s.dispose().unwrap();
    }

    #[test]
    fn test_incompatible_environments() {
        let good = TerminalEnvironment {
            stdin_is_tty: true,
            stdout_is_tty: true,
            term: Some("xterm-256color".into()),
            size: Some(Size::new(120, 40)),
        };
        assert_eq!(good.incompatibility(80, 24), None);

        let piped = TerminalEnvironment {
            stdout_is_tty: false,
            ..good.clone()
        };
        assert!(piped.incompatibility(80, 24).unwrap().contains("TTY"));

        let dumb = TerminalEnvironment {
            term: Some("dumb".into()),
            ..good.clone()
        };
        assert!(dumb.incompatibility(80, 24).unwrap().contains("dumb"));

        let small = TerminalEnvironment {
            size: Some(Size::new(60, 20)),
            ..good
        };
        assert!(small.incompatibility(80, 24).unwrap().contains("too small"));
    }
}
