//! What the core needs from the host UI.
//!
//! Widgets, scroll containers and the tab store are owned by the embedding
//! application; sessions only talk to them through these traits. Offsets into
//! an input layer are UTF-16 code units, scroll offsets are pixels.

use the_editor_backend::protocol::{
  DiffKind,
  DiffSide,
  SyntaxToken,
  TabId,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollOffset {
  pub top:  f64,
  pub left: f64,
}

/// A search match to highlight, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHighlight {
  pub line:   usize,
  pub column: usize,
  pub length: usize,
}

/// The editing surface of one tab: a text input layer inside an outer,
/// virtualized scroll container.
pub trait EditorView: Send + Sync {
  fn text(&self) -> String;
  fn set_text(&self, text: &str);
  fn selection(&self) -> (usize, usize);
  fn set_selection(&self, start: usize, end: usize);
  /// Move the input layer's own scroll back to the origin; the outer
  /// container is the only scroll position that matters.
  fn reset_input_scroll(&self);
  fn is_composing(&self) -> bool;
  /// Whether the input layer is mounted.
  fn is_attached(&self) -> bool;

  fn scroll_offset(&self) -> ScrollOffset;
  fn set_scroll_offset(&self, offset: ScrollOffset);
  fn viewport_height(&self) -> f64;
  fn row_height(&self) -> f64;

  fn show_lines(&self, start_line: usize, lines: &[String]);
  fn show_tokens(&self, start_line: usize, lines: &[Vec<SyntaxToken>]);
  /// Flash highlight of a 1-based line, `None` clears it.
  fn set_flash_line(&self, line: Option<usize>);
  fn set_search_highlight(&self, highlight: Option<SearchHighlight>);
}

/// Per-tab metadata kept by the host.
pub trait TabStore: Send + Sync {
  fn line_count(&self, id: &TabId) -> Option<usize>;
  fn set_line_count(&self, id: &TabId, line_count: usize);
  fn set_dirty(&self, id: &TabId, dirty: bool);
  /// 1-based cursor position for status displays.
  fn set_cursor(&self, id: &TabId, line: usize, column: usize);
}

/// The focused diff panel and its selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelFocus {
  pub side:            DiffSide,
  pub selection_start: usize,
  pub selection_end:   usize,
}

/// Scroll positions of both diff panels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanelScrollSnapshot {
  pub source_top:  f64,
  pub source_left: f64,
  pub target_top:  f64,
  pub target_left: f64,
}

/// The two text panels of a diff view. A panel shows one line per aligned
/// row, fillers included, joined with `\n`.
pub trait DiffPanels: Send + Sync {
  fn focused(&self) -> Option<PanelFocus>;
  fn panel_text(&self, side: DiffSide) -> String;
  fn set_panel_text(&self, side: DiffSide, text: &str);
  fn selection(&self, side: DiffSide) -> (usize, usize);
  /// Focus `side` and select `[start, end)`.
  fn focus(&self, side: DiffSide, start: usize, end: usize);
  fn scroll(&self) -> PanelScrollSnapshot;
  fn set_scroll(&self, snapshot: PanelScrollSnapshot);
  fn show_kinds(&self, kinds: &[Option<DiffKind>]);
}
