//! Pane arrangement.
//!
//! A [`Layout`] is a plain value: which arrangement is in use and which pane
//! is active. It is replaced wholesale on every change, and geometry is a
//! pure function of the layout and the terminal size.

use ratatui::layout::{Rect, Size};
use taskdeck_core::DefaultLayout;

/// Pane arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutKind {
    /// Only the active pane, full screen
    Single,
    /// List and detail side by side
    #[default]
    SplitHorizontal,
    /// List above detail
    SplitVertical,
}

impl LayoutKind {
    /// Layout selected by the `1`/`2`/`3` hotkeys.
    pub fn from_hotkey(c: char) -> Option<Self> {
        match c {
            '1' => Some(LayoutKind::Single),
            '2' => Some(LayoutKind::SplitHorizontal),
            '3' => Some(LayoutKind::SplitVertical),
            _ => None,
        }
    }

    pub fn is_split(&self) -> bool {
        !matches!(self, LayoutKind::Single)
    }
}

impl From<DefaultLayout> for LayoutKind {
    fn from(layout: DefaultLayout) -> Self {
        match layout {
            DefaultLayout::Single => LayoutKind::Single,
            DefaultLayout::SplitHorizontal => LayoutKind::SplitHorizontal,
            DefaultLayout::SplitVertical => LayoutKind::SplitVertical,
        }
    }
}

/// The two layout-managed panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    List,
    Detail,
}

impl Pane {
    pub fn other(&self) -> Pane {
        match self {
            Pane::List => Pane::Detail,
            Pane::Detail => Pane::List,
        }
    }
}

/// Current arrangement and active pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub kind: LayoutKind,
    pub active_pane: Pane,
}

/// Screen areas for each pane; `None` means hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneGeometry {
    pub list: Option<Rect>,
    pub detail: Option<Rect>,
}

impl PaneGeometry {
    pub fn area(&self, pane: Pane) -> Option<Rect> {
        match pane {
            Pane::List => self.list,
            Pane::Detail => self.detail,
        }
    }
}

impl Layout {
    pub fn new(kind: LayoutKind, active_pane: Pane) -> Self {
        Self { kind, active_pane }
    }

    /// Same arrangement, different active pane.
    pub fn with_active(self, active_pane: Pane) -> Self {
        Self { active_pane, ..self }
    }

    /// Same active pane, different arrangement.
    pub fn with_kind(self, kind: LayoutKind) -> Self {
        Self { kind, ..self }
    }

    /// Pane areas for a terminal of `size`.
    ///
    /// Split layouts give the list the first half (rounded down) and the
    /// detail pane the rest.
    pub fn geometry(&self, size: Size) -> PaneGeometry {
        let full = Rect::new(0, 0, size.width, size.height);
        match self.kind {
            LayoutKind::Single => match self.active_pane {
                Pane::List => PaneGeometry {
                    list: Some(full),
                    detail: None,
                },
                Pane::Detail => PaneGeometry {
                    list: None,
                    detail: Some(full),
                },
            },
            LayoutKind::SplitHorizontal => {
                let left = size.width / 2;
                PaneGeometry {
                    list: Some(Rect::new(0, 0, left, size.height)),
                    detail: Some(Rect::new(left, 0, size.width - left, size.height)),
                }
            }
            LayoutKind::SplitVertical => {
                let top = size.height / 2;
                PaneGeometry {
                    list: Some(Rect::new(0, 0, size.width, top)),
                    detail: Some(Rect::new(0, top, size.width, size.height - top)),
                }
            }
        }
    }
}

/// Centered area of the search overlay, independent of the pane layout.
pub fn search_area(size: Size) -> Rect {
    let width = (size.width * 3 / 5).max(size.width.min(40));
    let height = (size.height / 2).max(size.height.min(10));
    Rect::new(
        (size.width - width) / 2,
        (size.height - height) / 2,
        width,
        height,
    )
}

/// Centered area of the edit overlay: one row per field plus help.
pub fn edit_area(size: Size) -> Rect {
    let width = (size.width * 3 / 4).min(72).max(size.width.min(40));
    let height = size.height.min(11);
    Rect::new(
        (size.width - width) / 2,
        (size.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_horizontal_halves_width() {
        let g = Layout::new(LayoutKind::SplitHorizontal, Pane::List).geometry(Size::new(120, 40));
        assert_eq!(g.list, Some(Rect::new(0, 0, 60, 40)));
        assert_eq!(g.detail, Some(Rect::new(60, 0, 60, 40)));
    }

    #[test]
    fn test_split_odd_sizes_cover_screen() {
        let g = Layout::new(LayoutKind::SplitHorizontal, Pane::List).geometry(Size::new(81, 24));
        assert_eq!(g.list.unwrap().width + g.detail.unwrap().width, 81);

        let g = Layout::new(LayoutKind::SplitVertical, Pane::List).geometry(Size::new(80, 25));
        assert_eq!(g.list, Some(Rect::new(0, 0, 80, 12)));
        assert_eq!(g.detail, Some(Rect::new(0, 12, 80, 13)));
    }

    #[test]
    fn test_single_shows_only_active() {
        let size = Size::new(80, 24);
        let list = Layout::new(LayoutKind::Single, Pane::List).geometry(size);
        assert_eq!(list.detail, None);
        assert_eq!(list.list, Some(Rect::new(0, 0, 80, 24)));

        let detail = Layout::new(LayoutKind::Single, Pane::Detail).geometry(size);
        assert_eq!(detail.list, None);
        assert_eq!(detail.area(Pane::Detail), Some(Rect::new(0, 0, 80, 24)));
    }

    #[test]
    fn test_geometry_is_deterministic() {
        let layout = Layout::default();
        let size = Size::new(100, 30);
        assert_eq!(layout.geometry(size), layout.with_kind(layout.kind).geometry(size));
    }

    #[test]
    fn test_hotkeys() {
        assert_eq!(LayoutKind::from_hotkey('1'), Some(LayoutKind::Single));
        assert_eq!(LayoutKind::from_hotkey('3'), Some(LayoutKind::SplitVertical));
        assert_eq!(LayoutKind::from_hotkey('4'), None);
    }

    #[test]
    fn test_search_area_centered() {
        assert_eq!(search_area(Size::new(80, 24)), Rect::new(16, 6, 48, 12));
        let small = search_area(Size::new(30, 8));
        assert_eq!(small, Rect::new(0, 0, 30, 8));
    }

    #[test]
    fn test_edit_area_centered() {
        assert_eq!(edit_area(Size::new(80, 24)), Rect::new(10, 6, 60, 11));
        assert_eq!(edit_area(Size::new(200, 50)), Rect::new(64, 19, 72, 11));
        assert_eq!(edit_area(Size::new(30, 8)), Rect::new(0, 0, 30, 8));
    }
}
