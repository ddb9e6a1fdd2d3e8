use super::{
  EditorMode,
  EditorSession,
  FetchOutcome,
  viewport::window,
};
use crate::{
  events::{
    ForceRefreshRequest,
    Navigate,
    NavigationSource,
  },
  spawn_detached,
  surface::{
    ScrollOffset,
    SearchHighlight,
  },
  text::LogicalCaret,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct NavigationState {
  /// Bumped by every navigation; delayed applications of an older one are
  /// dropped.
  pub(crate) serial:     u64,
  pub(crate) flash_line: Option<usize>,
  pub(crate) search:     Option<SearchHighlight>,
}

/// Scroll offset that centres 0-based `row` in the viewport, aligned to whole
/// rows and clamped to the scrollable extent.
pub fn scroll_target(row: usize, row_height: f64, viewport_height: f64, total_rows: usize) -> f64 {
  let row_height = row_height.max(1.0);
  let visible_rows = (viewport_height / row_height).floor().max(1.0);
  let top_row = (row as f64 - (visible_rows / 2.0).floor()).max(0.0);
  let max_top = (total_rows as f64 * row_height - viewport_height).max(0.0);
  let max_top = (max_top / row_height).floor() * row_height;
  (top_row * row_height).min(max_top)
}

#[derive(Debug, Clone, Copy)]
struct Target {
  serial: u64,
  line:   usize,
  column: usize,
  scroll: ScrollOffset,
}

impl EditorSession {
  /// Jump to the 1-based line and column of `request`.
  pub async fn navigate(&self, request: Navigate, from_outline: bool) {
    let inner = &self.inner;
    let outline = from_outline || request.source == Some(NavigationSource::Outline);
    inner.fetch_timer.cancel_pending();

    let view = &inner.view;
    let (row_height, viewport_height) = (view.row_height(), view.viewport_height());
    let left = view.scroll_offset().left;

    let (target, search, line_count) = {
      let mut state = inner.state.lock();
      if state.closed {
        return;
      }
      state.version.bump();
      state.navigation.serial += 1;

      let line_count = state.line_count.max(1);
      let line = request.line.clamp(1, line_count);
      let column = if outline { 1 } else { request.column.max(1) };
      let top = scroll_target(line - 1, row_height, viewport_height, line_count);
      let target = Target {
        serial: state.navigation.serial,
        line,
        column,
        scroll: ScrollOffset { top, left },
      };

      let search = request.length.map(|length| SearchHighlight {
        line,
        column,
        length,
      });
      if search.is_some() {
        state.navigation.search = search;
      }
      if outline {
        state.navigation.flash_line = Some(line);
      }
      (target, search, line_count)
    };

    log::debug!(
      "navigate {} to {}:{} (serial {})",
      inner.id,
      target.line,
      target.column,
      target.serial
    );
    if search.is_some() {
      view.set_search_highlight(search);
    }
    if outline {
      view.set_flash_line(Some(target.line));
      self.schedule_flash_clear();
    }
    inner.tabs.set_cursor(&inner.id, target.line, target.column);

    self.apply_target(target);
    self.schedule_target_reapply(target);

    let row_height = row_height.max(1.0);
    let top_row = (target.scroll.top / row_height) as usize;
    let rows = (viewport_height / row_height).ceil() as usize;
    let (start, end) = window(
      top_row,
      top_row + rows.max(1),
      inner.config.prefetch_buffer,
      line_count,
    );
    self.inner.state.lock().visible = Some((top_row, top_row + rows.max(1)));
    self.fetch_window(start, end).await;
  }

  /// Apply caret and scroll of `target` unless a newer navigation replaced
  /// it. Returns whether it was applied.
  fn apply_target(&self, target: Target) -> bool {
    let inner = &self.inner;
    let first_line = {
      let state = inner.state.lock();
      if state.closed || state.navigation.serial != target.serial {
        return false;
      }
      state.input_first_line()
    };

    let view = &inner.view;
    let text = view.text();
    let caret = LogicalCaret {
      line:   target.line - 1,
      column: target.column - 1,
    };
    let offset = caret.to_code_units(&text, first_line);
    view.set_selection(offset, offset);
    view.set_scroll_offset(target.scroll);
    true
  }

  /// Re-apply after one frame, after a second frame and after the settle
  /// delay; the list may not have committed its own scroll before that.
  fn schedule_target_reapply(&self, target: Target) {
    let weak = self.downgrade();
    let frame = self.inner.config.navigation_frame;
    let settle = self.inner.config.navigation_settle;
    let delays = [frame, frame, settle.saturating_sub(frame * 2)];

    spawn_detached("navigation-reapply", async move {
      for delay in delays {
        tokio::time::sleep(delay).await;
        let Some(session) = weak.upgrade() else {
          return;
        };
        if !session.apply_target(target) {
          return;
        }
      }
    });
  }

  fn schedule_flash_clear(&self) {
    let weak = self.downgrade();
    self
      .inner
      .flash_timer
      .schedule(self.inner.config.outline_flash, move || async move {
        if let Some(session) = weak.upgrade() {
          session.clear_flash();
        }
      });
  }

  fn clear_flash(&self) {
    self.inner.state.lock().navigation.flash_line = None;
    self.inner.view.set_flash_line(None);
  }

  pub fn flash_line(&self) -> Option<usize> {
    self.inner.state.lock().navigation.flash_line
  }

  pub fn search_highlight(&self) -> Option<SearchHighlight> {
    self.inner.state.lock().navigation.search
  }

  pub fn search_close(&self) {
    self.inner.state.lock().navigation.search = None;
    self.inner.view.set_search_highlight(None);
  }

  /// Reload after the document changed behind the session's back.
  pub async fn force_refresh(&self, request: ForceRefreshRequest) -> FetchOutcome {
    let inner = &self.inner;
    let view = &inner.view;
    let preserve_scroll = request.preserve_scroll || request.preserve_caret;
    let caret = request.preserve_caret.then(|| self.logical_caret());
    let scroll = preserve_scroll.then(|| view.scroll_offset());

    inner.fetch_timer.cancel_pending();
    let line_count = request
      .line_count
      .or_else(|| inner.tabs.line_count(&inner.id));
    {
      let mut state = inner.state.lock();
      if state.closed {
        return FetchOutcome::Stale;
      }
      if let Some(line_count) = line_count {
        state.line_count = line_count.max(1);
        state.mode = EditorMode::for_line_count(state.line_count, &inner.config);
      }
    }
    if let Some(line_count) = request.line_count {
      inner.tabs.set_line_count(&inner.id, line_count);
    }

    let outcome = self.reload().await;
    if outcome == FetchOutcome::Applied {
      let first_line = inner.state.lock().input_first_line();
      if let Some(caret) = caret {
        let offset = caret.to_code_units(&view.text(), first_line);
        view.set_selection(offset, offset);
      }
      if let Some(scroll) = scroll {
        view.set_scroll_offset(scroll);
      }
      self.resync_visible().await;
    }
    outcome
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_centres_and_aligns() {
    // 20px rows, 10 rows visible
    assert_eq!(scroll_target(49, 20.0, 200.0, 1000), 44.0 * 20.0);
    assert_eq!(scroll_target(2, 20.0, 200.0, 1000), 0.0);
  }

  #[test]
  fn target_clamps_to_extent() {
    // 100 rows of 20px in a 200px viewport scroll at most 1800px
    assert_eq!(scroll_target(99, 20.0, 200.0, 100), 1800.0);
    assert_eq!(scroll_target(0, 20.0, 200.0, 3), 0.0);
  }

  #[test]
  fn fractional_viewports_align_to_rows() {
    let top = scroll_target(500, 18.0, 250.0, 10_000);
    assert_eq!(top % 18.0, 0.0);
  }
}
