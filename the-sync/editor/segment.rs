use std::ops::Range;

use the_editor_backend::protocol::SyntaxToken;

use super::EditorSession;
use crate::text::normalize_line;

/// What a fetch materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
  /// Normalized lines for display.
  Plain,
  /// Syntax tokens per line for display.
  Tokens,
  /// Lines joined into the input layer as the editable window.
  Editable,
}

/// The editable window of a huge document, `[start_line, end_line)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSegmentState {
  pub start_line: usize,
  pub end_line:   usize,
  pub text:       String,
}

impl EditorSegmentState {
  pub fn is_loaded(&self) -> bool {
    self.end_line > self.start_line
  }

  pub fn range(&self) -> Option<Range<usize>> {
    self.is_loaded().then_some(self.start_line..self.end_line)
  }

  pub fn covers(&self, start: usize, end: usize) -> bool {
    self.is_loaded() && self.start_line <= start && end <= self.end_line
  }
}

/// Monotonic counter guarding asynchronous fetches. A result applies only if
/// the version captured at dispatch is still current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestVersion(u64);

impl RequestVersion {
  /// Invalidate everything in flight and return the new version.
  pub fn bump(&mut self) -> u64 {
    self.0 += 1;
    self.0
  }

  pub fn current(&self) -> u64 {
    self.0
  }

  pub fn is_current(&self, captured: u64) -> bool {
    self.0 == captured
  }
}

/// Display cache of the visible lines, anchored at `start_line`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LineCache {
  #[default]
  Empty,
  Plain {
    start_line: usize,
    lines:      Vec<String>,
  },
  Tokens {
    start_line: usize,
    lines:      Vec<Vec<SyntaxToken>>,
  },
}

impl LineCache {
  pub fn range(&self) -> Option<Range<usize>> {
    let (start, len) = match self {
      Self::Empty => return None,
      Self::Plain { start_line, lines } => (*start_line, lines.len()),
      Self::Tokens { start_line, lines } => (*start_line, lines.len()),
    };
    (len > 0).then_some(start..start + len)
  }
}

/// Result of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
  Applied,
  /// Superseded while in flight; nothing changed.
  Stale,
  /// The backend failed; the cache is unchanged.
  Failed,
}

enum Fetched {
  Lines(Vec<String>),
  Tokens(Vec<Vec<SyntaxToken>>),
  Text(String),
}

impl EditorSession {
  /// Fetch `[start, end)` and store it according to `mode`.
  pub async fn fetch_range(&self, start: usize, end: usize, mode: FetchMode) -> FetchOutcome {
    let inner = &self.inner;
    let version = inner.state.lock().version.bump();

    let result = match mode {
      FetchMode::Plain | FetchMode::Editable => inner
        .backend
        .get_visible_lines_chunk(&inner.id, start, end)
        .await
        .map(Fetched::Lines),
      FetchMode::Tokens => inner
        .backend
        .get_syntax_token_lines(&inner.id, start, end)
        .await
        .map(Fetched::Tokens),
    };
    let fetched = match result {
      Ok(fetched) => fetched,
      Err(err) => {
        log::error!("failed to fetch lines {start}..{end} of {}: {err}", inner.id);
        return FetchOutcome::Failed;
      },
    };
    self.store_fetched(version, start, mode, fetched)
  }

  /// Reload the input layer from the backend: the whole document, or the
  /// window around the current scroll position for huge documents.
  pub(crate) async fn reload(&self) -> FetchOutcome {
    let inner = &self.inner;
    let (mode, line_count) = {
      let state = inner.state.lock();
      (state.mode, state.line_count)
    };

    if mode == super::EditorMode::Huge {
      let (start, end) = self.window_around_scroll(line_count);
      return self.fetch_range(start, end, FetchMode::Editable).await;
    }

    let version = inner.state.lock().version.bump();
    match inner.backend.get_visible_lines(&inner.id, 0, line_count).await {
      Ok(text) => self.store_fetched(version, 0, FetchMode::Editable, Fetched::Text(text)),
      Err(err) => {
        log::error!("failed to load {}: {err}", inner.id);
        FetchOutcome::Failed
      },
    }
  }

  fn store_fetched(&self, version: u64, start: usize, mode: FetchMode, fetched: Fetched) -> FetchOutcome {
    let inner = &self.inner;
    let mut state = inner.state.lock();
    if state.closed || !state.version.is_current(version) {
      return FetchOutcome::Stale;
    }

    match fetched {
      Fetched::Lines(lines) => {
        let lines: Vec<String> = lines.iter().map(|line| normalize_line(line)).collect();
        if mode == FetchMode::Editable {
          let text = lines.join("\n");
          state.segment = EditorSegmentState {
            start_line: start,
            end_line:   start + lines.len(),
            text:       text.clone(),
          };
          state.synced_text = text.clone();
          state.input_rewrites += 1;
          drop(state);
          inner.view.set_text(&text);
          inner.view.reset_input_scroll();
        } else {
          state.cache = LineCache::Plain {
            start_line: start,
            lines:      lines.clone(),
          };
          drop(state);
          inner.view.show_lines(start, &lines);
        }
      },
      Fetched::Tokens(lines) => {
        state.cache = LineCache::Tokens {
          start_line: start,
          lines:      lines.clone(),
        };
        drop(state);
        inner.view.show_tokens(start, &lines);
      },
      Fetched::Text(text) => {
        state.synced_text = text.clone();
        state.input_rewrites += 1;
        drop(state);
        inner.view.set_text(&text);
        inner.view.reset_input_scroll();
      },
    }
    FetchOutcome::Applied
  }
}
