//! Terminal task viewer for TaskDeck.
//!
//! This crate provides the ratatui-based viewer: a task list, a sectioned
//! detail pane, a fuzzy search overlay and a task editor, kept live by store change
//! subscriptions.
//!
//! ## Hotkeys
//!
//! - `j`/`k`, arrows, PageUp/PageDown, `g`/`G` - Move in the list
//! - `Enter` - Open the selected task
//! - `Tab` - Next detail section, or switch pane
//! - `/` - Search
//! - `1`/`2`/`3` - Single, side-by-side, stacked layout
//! - `f` - Cycle status filter
//! - `Space` - Toggle the selected task's status
//! - `e` - Edit the current task
//! - `r` - Reload
//! - `Esc` - Back
//! - `q`, `Ctrl+C`, `Ctrl+Q` - Quit

pub mod app;
pub mod controller;
pub mod detail_view;
pub mod edit_view;
pub mod event;
pub mod fuzzy;
pub mod layout;
pub mod list_view;
pub mod search_view;
pub mod subscription;
pub mod terminal;
pub mod theme;
pub mod view;
pub mod view_model;

mod integration_tests;

pub use app::{render_frame, App};
pub use controller::{Controller, ControllerOptions, Views};
pub use fuzzy::{FuzzyOptions, FuzzySearch, SearchField};
pub use layout::{Layout, LayoutKind, Pane};
pub use subscription::{SubscriptionHandle, TaskSubscriptionService};
pub use terminal::{
    check_terminal_compatibility, restore_terminal, CrosstermSurface, RatatuiSurface,
    TerminalSurface,
};
pub use view::{ViewComponent, ViewMessage};
pub use view_model::TaskViewModel;
