use super::{
  EditorMode,
  EditorSegmentState,
  EditorSession,
};
use crate::{
  events::{
    DocumentUpdated,
    TabEvent,
  },
  text::{
    code_unit_diff,
    code_unit_to_char_offset,
  },
};

/// Result of one commit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
  /// The input matched the baseline; nothing was sent.
  Unchanged,
  /// The backend accepted the edit.
  Committed { line_count: usize },
  /// The backend rejected the edit; the baseline was kept.
  Failed,
}

impl EditorSession {
  /// Debounced entry point for keystrokes.
  pub fn schedule_sync(&self) {
    let weak = self.downgrade();
    self
      .inner
      .sync_timer
      .schedule(self.inner.config.edit_sync_debounce, move || async move {
        if let Some(session) = weak.upgrade() {
          session.flush_pending_sync().await;
        }
      });
  }

  /// Send the difference between the input layer and the synced baseline to
  /// the backend.
  ///
  /// Calls made while a commit is in flight return `None` immediately and
  /// make the running call replay once more with the latest text. Also a
  /// no-op while composing or when the input layer is detached.
  pub async fn flush_pending_sync(&self) -> Option<CommitOutcome> {
    let view = &self.inner.view;
    if !view.is_attached() || view.is_composing() {
      return None;
    }
    if !self.begin_commit() {
      return None;
    }

    let mut outcome = None;
    loop {
      if !view.is_attached() || view.is_composing() {
        self.inner.state.lock().gate.abandon();
        break;
      }
      let mode = self.inner.state.lock().mode;
      outcome = Some(match mode {
        EditorMode::Huge => self.commit_window().await,
        EditorMode::Normal | EditorMode::Large => self.commit_text().await,
      });
      if !self.inner.state.lock().gate.finish() {
        break;
      }
      log::trace!("replaying sync of {}", self.inner.id);
    }
    outcome
  }

  fn begin_commit(&self) -> bool {
    let mut state = self.inner.state.lock();
    !state.closed && state.gate.try_begin()
  }

  /// Normal and large documents: send the minimal changed span.
  async fn commit_text(&self) -> CommitOutcome {
    let inner = &self.inner;
    let current = inner.view.text();
    let (baseline, rewrites) = {
      let state = inner.state.lock();
      (state.synced_text.clone(), state.input_rewrites)
    };

    let Some(diff) = code_unit_diff(&baseline, &current) else {
      inner.state.lock().synced_text = current;
      return CommitOutcome::Unchanged;
    };
    let start_char = code_unit_to_char_offset(&baseline, diff.start);
    let end_char = code_unit_to_char_offset(&baseline, diff.end);

    let line_count = match inner
      .backend
      .edit_text(&inner.id, start_char, end_char, &diff.new_text)
      .await
    {
      Ok(line_count) => line_count,
      Err(err) => {
        log::error!("failed to sync edit of {}: {err}", inner.id);
        return CommitOutcome::Failed;
      },
    };

    {
      let mut state = inner.state.lock();
      if state.closed {
        return CommitOutcome::Committed { line_count };
      }
      state.line_count = line_count;
      // a reload replaced the input layer and its baseline meanwhile
      if state.input_rewrites == rewrites {
        state.synced_text = current;
      } else {
        log::debug!("input of {} reloaded during commit, keeping its baseline", inner.id);
      }
    }
    self.publish_committed(line_count);
    self.resync_visible().await;
    CommitOutcome::Committed { line_count }
  }

  /// Huge documents: replace the whole editable window.
  async fn commit_window(&self) -> CommitOutcome {
    let inner = &self.inner;
    let current = inner.view.text();
    let (segment, rewrites, serial) = {
      let mut state = inner.state.lock();
      if !state.segment.is_loaded() {
        return CommitOutcome::Unchanged;
      }
      if current == state.synced_text {
        state.synced_text = current;
        drop(state);
        self.schedule_unlock();
        return CommitOutcome::Unchanged;
      }
      (state.segment.clone(), state.input_rewrites, state.navigation.serial)
    };

    self.lock_window();
    let scroll = inner.view.scroll_offset();
    let result = inner
      .backend
      .replace_line_range(&inner.id, segment.start_line, segment.end_line, &current)
      .await;
    let line_count = match result {
      Ok(line_count) => line_count,
      Err(err) => {
        log::error!(
          "failed to replace lines {}..{} of {}: {err}",
          segment.start_line,
          segment.end_line,
          inner.id
        );
        self.schedule_unlock();
        return CommitOutcome::Failed;
      },
    };

    let (fresh_start, fresh_end) = self.window_around_scroll(line_count);
    let navigated = {
      let mut state = inner.state.lock();
      if state.closed {
        return CommitOutcome::Committed { line_count };
      }
      state.line_count = line_count;
      // the backend holds `current` as the window now, unless a fetch
      // rewrote the input layer meanwhile
      if state.input_rewrites == rewrites {
        let edited_lines = current.split('\n').count();
        state.segment = EditorSegmentState {
          start_line: segment.start_line,
          end_line:   segment.start_line + edited_lines,
          text:       current.clone(),
        };
        state.synced_text = current;
        if !state.segment.covers(fresh_start, fresh_end) {
          state.lock.request_follow();
        }
      } else {
        state.lock.request_follow();
      }
      state.navigation.serial != serial
    };

    self.publish_committed(line_count);
    if !navigated {
      inner.view.set_scroll_offset(scroll);
    }
    self.schedule_unlock();
    CommitOutcome::Committed { line_count }
  }

  fn publish_committed(&self, line_count: usize) {
    let inner = &self.inner;
    inner.tabs.set_line_count(&inner.id, line_count);
    inner.tabs.set_dirty(&inner.id, true);
    inner.bus.publish::<DocumentUpdated>(TabEvent {
      tab_id: inner.id.clone(),
    });
  }
}
