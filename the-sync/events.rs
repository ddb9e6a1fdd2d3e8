//! Window-scoped notifications exchanged with collaborators.

use the_editor_backend::protocol::{
  DiffSide,
  TabId,
};
use the_editor_event::topics;

/// Where a navigation request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
  Outline,
  Search,
  Bookmark,
  Other,
}

/// Jump to a 1-based line and column.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigate {
  pub tab_id:            TabId,
  pub line:              usize,
  pub column:            usize,
  /// Length of a search match to highlight at the target.
  pub length:            Option<usize>,
  pub line_text:         Option<String>,
  /// Width hidden by an overlay on the right edge of the viewport.
  pub occluded_right_px: Option<f64>,
  pub source:            Option<NavigationSource>,
}

impl Navigate {
  pub fn to_line(tab_id: TabId, line: usize) -> Self {
    Self {
      tab_id,
      line,
      column: 1,
      length: None,
      line_text: None,
      occluded_right_px: None,
      source: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceRefreshRequest {
  pub tab_id:          TabId,
  pub line_count:      Option<usize>,
  pub preserve_caret:  bool,
  pub preserve_scroll: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEvent {
  pub tab_id: TabId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
  Undo,
  Redo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHistoryRequest {
  pub diff_tab_id: TabId,
  /// The panel to act on; the focused panel when absent.
  pub panel:       Option<DiffSide>,
  pub action:      HistoryAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPasteRequest {
  pub diff_tab_id: TabId,
  pub panel:       Option<DiffSide>,
  pub text:        String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteRequest {
  pub tab_id: TabId,
  pub text:   String,
}

topics! {
  NavigateToLine("navigate-to-line") => Navigate;
  /// Navigation from a structural outline entry; the column is ignored.
  NavigateToOutline("navigate-to-outline") => Navigate;
  ForceRefresh("force-refresh") => ForceRefreshRequest;
  SearchClose("search-close") => TabEvent;
  /// A tab's text changed in the backend.
  DocumentUpdated("document-updated") => TabEvent;
  DiffHistoryAction("diff-history-action") => DiffHistoryRequest;
  DiffPasteText("diff-paste-text") => DiffPasteRequest;
  PasteText("paste-text") => PasteRequest;
}
