//! In-memory stand-ins for the host UI and an instrumented backend.

use std::{
  collections::{
    HashMap,
    HashSet,
  },
  sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use the_editor_backend::{
  Backend,
  BackendError,
  LocalBackend,
  Result,
  protocol::{
    AlignedRows,
    ApplyAlignedDiffEditRequest,
    ApplyAlignedDiffEditResult,
    DiffKind,
    DiffSide,
    LineDiffComparisonResult,
    SyntaxToken,
    TabId,
  },
};
use tokio::sync::Semaphore;

use crate::surface::{
  DiffPanels,
  EditorView,
  PanelFocus,
  PanelScrollSnapshot,
  ScrollOffset,
  SearchHighlight,
  TabStore,
};

/// A backend command as seen by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
  Chunk { start: usize, end: usize },
  Tokens { start: usize, end: usize },
  Visible { start: usize, end: usize },
  Replace { start: usize, end: usize, text: String },
  Edit { start: usize, end: usize, text: String },
  Compare,
  Apply { side: DiffSide, trailing_newline: bool },
  Preview,
  Undo(TabId),
  Redo(TabId),
}

impl Call {
  fn command(&self) -> &'static str {
    match self {
      Self::Chunk { .. } => "get_visible_lines_chunk",
      Self::Tokens { .. } => "get_syntax_token_lines",
      Self::Visible { .. } => "get_visible_lines",
      Self::Replace { .. } => "replace_line_range",
      Self::Edit { .. } => "edit_text",
      Self::Compare => "compare_documents_by_line",
      Self::Apply { .. } => "apply_aligned_diff_edit",
      Self::Preview => "preview_aligned_diff_state",
      Self::Undo(_) => "undo",
      Self::Redo(_) => "redo",
    }
  }
}

/// [`LocalBackend`] that records every call and can hold or fail commands.
#[derive(Default)]
pub(crate) struct RecordingBackend {
  pub(crate) local: LocalBackend,
  calls:            Mutex<Vec<Call>>,
  held:             Mutex<HashMap<&'static str, Arc<Semaphore>>>,
  failing:          Mutex<HashSet<&'static str>>,
}

impl RecordingBackend {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub(crate) fn open(&self, id: &TabId, text: &str) {
    self.local.open(id.clone(), text);
  }

  pub(crate) fn calls(&self) -> Vec<Call> {
    self.calls.lock().clone()
  }

  pub(crate) fn calls_to(&self, command: &str) -> Vec<Call> {
    self
      .calls
      .lock()
      .iter()
      .filter(|call| call.command() == command)
      .cloned()
      .collect()
  }

  pub(crate) fn clear_calls(&self) {
    self.calls.lock().clear();
  }

  /// Make calls to `command` wait until [`RecordingBackend::release`].
  pub(crate) fn hold(&self, command: &'static str) {
    self
      .held
      .lock()
      .insert(command, Arc::new(Semaphore::new(0)));
  }

  /// Let `permits` held calls to `command` through.
  pub(crate) fn release(&self, command: &'static str, permits: usize) {
    if let Some(semaphore) = self.held.lock().get(command) {
      semaphore.add_permits(permits);
    }
  }

  /// Stop holding `command`, letting every waiting call through.
  pub(crate) fn unhold(&self, command: &'static str) {
    if let Some(semaphore) = self.held.lock().remove(command) {
      semaphore.add_permits(Semaphore::MAX_PERMITS / 2);
    }
  }

  pub(crate) fn fail(&self, command: &'static str, failing: bool) {
    let mut set = self.failing.lock();
    if failing {
      set.insert(command);
    } else {
      set.remove(command);
    }
  }

  async fn enter(&self, call: Call) -> Result<()> {
    let command = call.command();
    self.calls.lock().push(call);
    let semaphore = self.held.lock().get(command).cloned();
    if let Some(semaphore) = semaphore
      && let Ok(permit) = semaphore.acquire().await
    {
      permit.forget();
    }
    if self.failing.lock().contains(command) {
      return Err(BackendError::Command {
        command,
        message: "injected failure".into(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl Backend for RecordingBackend {
  async fn get_visible_lines_chunk(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<String>> {
    self
      .enter(Call::Chunk {
        start: start_line,
        end:   end_line,
      })
      .await?;
    self
      .local
      .get_visible_lines_chunk(id, start_line, end_line)
      .await
  }

  async fn get_syntax_token_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<Vec<SyntaxToken>>> {
    self
      .enter(Call::Tokens {
        start: start_line,
        end:   end_line,
      })
      .await?;
    self
      .local
      .get_syntax_token_lines(id, start_line, end_line)
      .await
  }

  async fn get_visible_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<String> {
    self
      .enter(Call::Visible {
        start: start_line,
        end:   end_line,
      })
      .await?;
    self.local.get_visible_lines(id, start_line, end_line).await
  }

  async fn replace_line_range(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
    new_text: &str,
  ) -> Result<usize> {
    self
      .enter(Call::Replace {
        start: start_line,
        end:   end_line,
        text:  new_text.to_string(),
      })
      .await?;
    self
      .local
      .replace_line_range(id, start_line, end_line, new_text)
      .await
  }

  async fn edit_text(
    &self,
    id: &TabId,
    start_char: usize,
    end_char: usize,
    new_text: &str,
  ) -> Result<usize> {
    self
      .enter(Call::Edit {
        start: start_char,
        end:   end_char,
        text:  new_text.to_string(),
      })
      .await?;
    self
      .local
      .edit_text(id, start_char, end_char, new_text)
      .await
  }

  async fn compare_documents_by_line(
    &self,
    source_id: &TabId,
    target_id: &TabId,
  ) -> Result<LineDiffComparisonResult> {
    self.enter(Call::Compare).await?;
    self
      .local
      .compare_documents_by_line(source_id, target_id)
      .await
  }

  async fn apply_aligned_diff_edit(
    &self,
    request: ApplyAlignedDiffEditRequest,
  ) -> Result<ApplyAlignedDiffEditResult> {
    self
      .enter(Call::Apply {
        side:             request.edited_side,
        trailing_newline: request.edited_trailing_newline,
      })
      .await?;
    self.local.apply_aligned_diff_edit(request).await
  }

  async fn preview_aligned_diff_state(
    &self,
    rows: AlignedRows,
  ) -> Result<LineDiffComparisonResult> {
    self.enter(Call::Preview).await?;
    self.local.preview_aligned_diff_state(rows).await
  }

  async fn undo(&self, id: &TabId) -> Result<usize> {
    self.enter(Call::Undo(id.clone())).await?;
    self.local.undo(id).await
  }

  async fn redo(&self, id: &TabId) -> Result<usize> {
    self.enter(Call::Redo(id.clone())).await?;
    self.local.redo(id).await
  }
}

#[derive(Debug, Default)]
pub(crate) struct ViewState {
  pub(crate) text:                String,
  pub(crate) selection:           (usize, usize),
  pub(crate) composing:           bool,
  pub(crate) detached:            bool,
  pub(crate) scroll:              ScrollOffset,
  pub(crate) viewport_height:     f64,
  pub(crate) row_height:          f64,
  pub(crate) shown_lines:         Option<(usize, Vec<String>)>,
  pub(crate) shown_tokens:        Option<(usize, usize)>,
  pub(crate) flash:               Option<usize>,
  pub(crate) search:              Option<SearchHighlight>,
  /// Every scroll offset the session applied, in order.
  pub(crate) applied_scrolls:     Vec<ScrollOffset>,
  pub(crate) input_scroll_resets: usize,
}

/// An input layer inside a scroll container.
pub(crate) struct FakeView {
  state: Mutex<ViewState>,
}

impl FakeView {
  /// 20px rows in a viewport of `visible_rows` rows.
  pub(crate) fn new(visible_rows: usize) -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(ViewState {
        viewport_height: visible_rows as f64 * 20.0,
        row_height: 20.0,
        ..Default::default()
      }),
    })
  }

  pub(crate) fn with<T>(&self, f: impl FnOnce(&mut ViewState) -> T) -> T {
    f(&mut self.state.lock())
  }

  /// Replace the text like a keystroke would, caret at `caret`.
  pub(crate) fn type_text(&self, text: &str, caret: usize) {
    let mut state = self.state.lock();
    state.text = text.to_string();
    state.selection = (caret, caret);
  }
}

impl EditorView for FakeView {
  fn text(&self) -> String {
    self.state.lock().text.clone()
  }

  fn set_text(&self, text: &str) {
    let mut state = self.state.lock();
    state.text = text.to_string();
    // a rewritten input layer drops its selection and native scroll
    state.selection = (0, 0);
    state.scroll = ScrollOffset::default();
  }

  fn selection(&self) -> (usize, usize) {
    self.state.lock().selection
  }

  fn set_selection(&self, start: usize, end: usize) {
    self.state.lock().selection = (start, end);
  }

  fn reset_input_scroll(&self) {
    self.state.lock().input_scroll_resets += 1;
  }

  fn is_composing(&self) -> bool {
    self.state.lock().composing
  }

  fn is_attached(&self) -> bool {
    !self.state.lock().detached
  }

  fn scroll_offset(&self) -> ScrollOffset {
    self.state.lock().scroll
  }

  fn set_scroll_offset(&self, offset: ScrollOffset) {
    let mut state = self.state.lock();
    state.scroll = offset;
    state.applied_scrolls.push(offset);
  }

  fn viewport_height(&self) -> f64 {
    self.state.lock().viewport_height
  }

  fn row_height(&self) -> f64 {
    self.state.lock().row_height
  }

  fn show_lines(&self, start_line: usize, lines: &[String]) {
    self.state.lock().shown_lines = Some((start_line, lines.to_vec()));
  }

  fn show_tokens(&self, start_line: usize, lines: &[Vec<SyntaxToken>]) {
    self.state.lock().shown_tokens = Some((start_line, lines.len()));
  }

  fn set_flash_line(&self, line: Option<usize>) {
    self.state.lock().flash = line;
  }

  fn set_search_highlight(&self, highlight: Option<SearchHighlight>) {
    self.state.lock().search = highlight;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TabInfo {
  pub(crate) line_count: Option<usize>,
  pub(crate) dirty:      bool,
  pub(crate) cursor:     Option<(usize, usize)>,
}

#[derive(Default)]
pub(crate) struct FakeTabs {
  tabs: Mutex<HashMap<TabId, TabInfo>>,
}

impl FakeTabs {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub(crate) fn with_line_count(id: &TabId, line_count: usize) -> Arc<Self> {
    let tabs = Self::new();
    tabs.set_line_count(id, line_count);
    tabs
  }

  pub(crate) fn info(&self, id: &TabId) -> TabInfo {
    self.tabs.lock().get(id).cloned().unwrap_or_default()
  }
}

impl TabStore for FakeTabs {
  fn line_count(&self, id: &TabId) -> Option<usize> {
    self.tabs.lock().get(id).and_then(|tab| tab.line_count)
  }

  fn set_line_count(&self, id: &TabId, line_count: usize) {
    self.tabs.lock().entry(id.clone()).or_default().line_count = Some(line_count);
  }

  fn set_dirty(&self, id: &TabId, dirty: bool) {
    self.tabs.lock().entry(id.clone()).or_default().dirty = dirty;
  }

  fn set_cursor(&self, id: &TabId, line: usize, column: usize) {
    self.tabs.lock().entry(id.clone()).or_default().cursor = Some((line, column));
  }
}

#[derive(Debug, Default)]
pub(crate) struct PanelState {
  pub(crate) source:           String,
  pub(crate) target:           String,
  pub(crate) source_selection: (usize, usize),
  pub(crate) target_selection: (usize, usize),
  pub(crate) focused:          Option<DiffSide>,
  pub(crate) scroll:           PanelScrollSnapshot,
  pub(crate) kinds:            Vec<Option<DiffKind>>,
  /// Number of times the session rewrote a panel.
  pub(crate) rewrites:         usize,
}

impl PanelState {
  pub(crate) fn text_mut(&mut self, side: DiffSide) -> &mut String {
    match side {
      DiffSide::Source => &mut self.source,
      DiffSide::Target => &mut self.target,
    }
  }

  pub(crate) fn selection_mut(&mut self, side: DiffSide) -> &mut (usize, usize) {
    match side {
      DiffSide::Source => &mut self.source_selection,
      DiffSide::Target => &mut self.target_selection,
    }
  }
}

/// The two text panels of a diff tab.
#[derive(Default)]
pub(crate) struct FakePanels {
  state: Mutex<PanelState>,
}

impl FakePanels {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub(crate) fn with<T>(&self, f: impl FnOnce(&mut PanelState) -> T) -> T {
    f(&mut self.state.lock())
  }

  /// Focus `side` and replace its text like typing would.
  pub(crate) fn type_text(&self, side: DiffSide, text: &str, caret: usize) {
    let mut state = self.state.lock();
    state.focused = Some(side);
    *state.text_mut(side) = text.to_string();
    *state.selection_mut(side) = (caret, caret);
  }
}

impl DiffPanels for FakePanels {
  fn focused(&self) -> Option<PanelFocus> {
    let mut state = self.state.lock();
    let side = state.focused?;
    let (selection_start, selection_end) = *state.selection_mut(side);
    Some(PanelFocus {
      side,
      selection_start,
      selection_end,
    })
  }

  fn panel_text(&self, side: DiffSide) -> String {
    self.state.lock().text_mut(side).clone()
  }

  fn set_panel_text(&self, side: DiffSide, text: &str) {
    let mut state = self.state.lock();
    *state.text_mut(side) = text.to_string();
    state.rewrites += 1;
  }

  fn selection(&self, side: DiffSide) -> (usize, usize) {
    *self.state.lock().selection_mut(side)
  }

  fn focus(&self, side: DiffSide, start: usize, end: usize) {
    let mut state = self.state.lock();
    state.focused = Some(side);
    *state.selection_mut(side) = (start, end);
  }

  fn scroll(&self) -> PanelScrollSnapshot {
    self.state.lock().scroll
  }

  fn set_scroll(&self, snapshot: PanelScrollSnapshot) {
    self.state.lock().scroll = snapshot;
  }

  fn show_kinds(&self, kinds: &[Option<DiffKind>]) {
    self.state.lock().kinds = kinds.to_vec();
  }
}

/// Let spawned tasks run and paused timers advance by `ms`.
pub(crate) async fn settle(ms: u64) {
  tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
  for _ in 0..16 {
    tokio::task::yield_now().await;
  }
}
