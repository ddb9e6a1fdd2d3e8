use std::{
  ops::Range,
  time::Duration,
};

use tokio::time::Instant;

use super::{
  EditorMode,
  EditorSession,
  FetchMode,
  FetchOutcome,
};
use crate::config::SyncConfig;

/// A fetch the tracker wants scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
  pub start:        usize,
  pub end:          usize,
  pub delay:        Duration,
  pub fast_scroll:  bool,
  /// Prefetch lines added on top of the base buffer for this fetch.
  pub extra_buffer: usize,
}

/// What the tracker needs to know about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
  pub mode:           EditorMode,
  pub scrollbar_drag: bool,
  pub line_count:     usize,
  /// Lines currently materialized, if any.
  pub cached:         Option<Range<usize>>,
}

/// Decides when the visible range has left the cached lines.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
  last: Option<(usize, usize, Instant)>,
}

impl ViewportTracker {
  /// Record the visible range `[start, stop)` seen at `now` and return the
  /// adaptive extra buffer when the change counts as a fast scroll.
  fn observe(&mut self, start: usize, stop: usize, now: Instant, config: &SyncConfig) -> Option<usize> {
    let previous = self.last.replace((start, stop, now));
    let (last_start, last_stop, seen) = previous?;
    if now.saturating_duration_since(seen) > config.fast_scroll_window {
      return None;
    }
    let jump = start.abs_diff(last_start).max(stop.abs_diff(last_stop));
    (jump >= config.fast_scroll_jump).then(|| (jump / 2).min(config.max_adaptive_buffer))
  }

  pub fn plan(
    &mut self,
    start: usize,
    stop: usize,
    now: Instant,
    ctx: &PlanContext,
    config: &SyncConfig,
  ) -> Option<FetchPlan> {
    let extra = self.observe(start, stop, now, config);
    let buffer = config.prefetch_buffer + extra.unwrap_or(0);
    let (fetch_start, fetch_end) = window(start, stop, buffer, ctx.line_count);

    let outside = match &ctx.cached {
      None => true,
      Some(cached) => fetch_start < cached.start || fetch_end > cached.end,
    };
    if !outside {
      return None;
    }

    let delay = if ctx.mode == EditorMode::Huge {
      config.huge_debounce
    } else if ctx.mode == EditorMode::Large {
      config.large_debounce
    } else if ctx.scrollbar_drag {
      config.drag_debounce
    } else if extra.is_some() {
      config.fast_scroll_debounce
    } else {
      config.normal_debounce
    };

    Some(FetchPlan {
      start: fetch_start,
      end: fetch_end,
      delay,
      fast_scroll: extra.is_some(),
      extra_buffer: extra.unwrap_or(0),
    })
  }
}

/// `[start - buffer, stop + buffer)` clamped to the document.
pub(crate) fn window(start: usize, stop: usize, buffer: usize, line_count: usize) -> (usize, usize) {
  let end = stop.saturating_add(buffer).min(line_count);
  let start = start.saturating_sub(buffer).min(end);
  (start, end)
}

impl EditorSession {
  /// The virtualized list now renders rows `[start, stop)`.
  pub fn on_visible_range_changed(&self, start: usize, stop: usize) {
    let inner = &self.inner;
    let plan = {
      let mut state = inner.state.lock();
      if state.closed {
        return;
      }
      state.visible = Some((start, stop));
      let cached = match state.mode {
        EditorMode::Huge => state.segment.range(),
        EditorMode::Normal | EditorMode::Large => state.cache.range(),
      };
      let ctx = PlanContext {
        mode: state.mode,
        scrollbar_drag: state.scrollbar_drag,
        line_count: state.line_count,
        cached,
      };
      let plan = state
        .tracker
        .plan(start, stop, Instant::now(), &ctx, &inner.config);
      if plan.is_some() && state.mode == EditorMode::Huge && state.lock.is_locked() {
        state.lock.request_follow();
        return;
      }
      plan
    };

    let Some(plan) = plan else {
      return;
    };
    if plan.fast_scroll {
      log::trace!(
        "fast scroll in {}: +{} lines prefetch",
        inner.id,
        plan.extra_buffer
      );
    }

    inner.fetch_timer.cancel_pending();
    let weak = self.downgrade();
    inner.fetch_timer.schedule(plan.delay, move || async move {
      if let Some(session) = weak.upgrade() {
        session.fetch_window(plan.start, plan.end).await;
      }
    });
  }

  /// The user is (or stopped) dragging the scrollbar.
  pub fn set_scrollbar_drag(&self, dragging: bool) {
    self.inner.state.lock().scrollbar_drag = dragging;
  }

  /// Fetch `[start, end)` in the session's mode. In huge mode unsynced input
  /// is flushed first and the fetch is postponed to the window unlock when it
  /// could overwrite text that has not reached the backend.
  pub(crate) async fn fetch_window(&self, start: usize, end: usize) -> Option<FetchOutcome> {
    let mode = self.inner.state.lock().mode;
    if mode != EditorMode::Huge {
      return Some(self.fetch_range(start, end, mode.fetch_mode()).await);
    }

    self.flush_pending_sync().await;
    let text = self.inner.view.text();
    {
      let mut state = self.inner.state.lock();
      if state.closed {
        return None;
      }
      if state.gate.is_in_flight() || state.lock.is_locked() || text != state.synced_text {
        state.lock.request_follow();
        return None;
      }
    }
    Some(self.fetch_range(start, end, FetchMode::Editable).await)
  }

  /// Rows `[start, stop)` visible in the viewport: the last reported range,
  /// or one derived from the scroll position.
  pub(crate) fn visible_rows(&self) -> (usize, usize) {
    if let Some(visible) = self.inner.state.lock().visible {
      return visible;
    }
    self.rows_at_scroll()
  }

  pub(crate) fn rows_at_scroll(&self) -> (usize, usize) {
    let view = &self.inner.view;
    let row_height = view.row_height().max(1.0);
    let top = (view.scroll_offset().top.max(0.0) / row_height).floor() as usize;
    let rows = (view.viewport_height().max(0.0) / row_height).ceil() as usize;
    (top, top + rows.max(1))
  }

  /// Fetch window centred on the current scroll position.
  pub(crate) fn window_around_scroll(&self, line_count: usize) -> (usize, usize) {
    let (start, stop) = self.rows_at_scroll();
    window(start, stop, self.inner.config.prefetch_buffer, line_count)
  }

  /// Refresh the display cache for the visible rows after the line count
  /// changed. The editable window of huge documents is left alone.
  pub(crate) async fn resync_visible(&self) -> Option<FetchOutcome> {
    let (mode, line_count) = {
      let state = self.inner.state.lock();
      (state.mode, state.line_count)
    };
    if mode == EditorMode::Huge {
      return None;
    }
    let (start, stop) = self.visible_rows();
    let (start, end) = window(start, stop, self.inner.config.prefetch_buffer, line_count);
    Some(self.fetch_range(start, end, mode.fetch_mode()).await)
  }

  /// Fetch whatever the viewport shows right now.
  pub(crate) async fn refetch_viewport(&self) -> Option<FetchOutcome> {
    let line_count = self.inner.state.lock().line_count;
    let (start, stop) = self.visible_rows();
    let (start, end) = window(start, stop, self.inner.config.prefetch_buffer, line_count);
    self.fetch_window(start, end).await
  }
}
