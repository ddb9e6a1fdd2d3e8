use the_editor_backend::protocol::{
  ApplyAlignedDiffEditRequest,
  DiffSide,
  LineDiffComparisonResult,
};

use super::DiffSession;
use crate::events::{
  DocumentUpdated,
  TabEvent,
};

/// Result of one side commit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideCommitOutcome {
  /// The side matched its committed text; nothing was sent.
  Unchanged,
  Committed {
    source_line_count: usize,
    target_line_count: usize,
  },
  /// The backend rejected the edit; the committed text was kept.
  Failed,
}

impl DiffSession {
  /// Commit `side` after the side commit debounce.
  pub fn schedule_side_commit(&self, side: DiffSide) {
    let weak = self.downgrade();
    self.inner.commit_timers.get(side).schedule(
      self.inner.config.side_commit_debounce,
      move || async move {
        if let Some(session) = weak.upgrade() {
          session.flush_side_commit(side).await;
        }
      },
    );
  }

  /// Returns whether a commit was still waiting.
  pub fn clear_side_commit_timer(&self, side: DiffSide) -> bool {
    self.inner.commit_timers.get(side).cancel_pending()
  }

  /// Send `side` to the backend if it differs from its committed text.
  ///
  /// Serialized per side like editor commits: a call made while one is in
  /// flight returns `None` and makes the running one replay once.
  pub async fn flush_side_commit(&self, side: DiffSide) -> Option<SideCommitOutcome> {
    {
      let mut state = self.inner.state.lock();
      if state.closed || !state.sides.get_mut(side).gate.try_begin() {
        return None;
      }
    }

    loop {
      let outcome = self.commit_side(side).await;
      if !self.inner.state.lock().sides.get_mut(side).gate.finish() {
        return Some(outcome);
      }
      log::trace!("replaying {side} commit of {}", self.inner.diff_tab_id);
    }
  }

  async fn commit_side(&self, side: DiffSide) -> SideCommitOutcome {
    let inner = &self.inner;
    let (request, committed) = {
      let state = inner.state.lock();
      let committed = state.model.committed_text(side);
      if state.closed || committed == state.sides.get(side).committed {
        return SideCommitOutcome::Unchanged;
      }
      let request = ApplyAlignedDiffEditRequest {
        source_id:               self.tab_id(DiffSide::Source).clone(),
        target_id:               self.tab_id(DiffSide::Target).clone(),
        edited_side:             side,
        rows:                    state.model.rows(),
        edited_trailing_newline: committed.trailing_newline,
      };
      (request, committed)
    };

    let result = match inner.backend.apply_aligned_diff_edit(request).await {
      Ok(result) => result,
      Err(err) => {
        log::error!(
          "failed to commit {side} panel of {}: {err}",
          inner.diff_tab_id
        );
        return SideCommitOutcome::Failed;
      },
    };
    let source_line_count = result.line_diff.source_line_count;
    let target_line_count = result.line_diff.target_line_count;
    let outcome = SideCommitOutcome::Committed {
      source_line_count,
      target_line_count,
    };

    {
      let mut state = inner.state.lock();
      if state.closed {
        return outcome;
      }
      state.sides.get_mut(side).committed = committed;
    }

    let (source, target) = (self.tab_id(DiffSide::Source), self.tab_id(DiffSide::Target));
    inner.tabs.set_line_count(source, source_line_count);
    inner.tabs.set_line_count(target, target_line_count);
    inner.tabs.set_dirty(source, result.source_is_dirty);
    inner.tabs.set_dirty(target, result.target_is_dirty);
    inner.bus.publish::<DocumentUpdated>(TabEvent {
      tab_id: self.tab_id(side).clone(),
    });

    self.receive_result(result.line_diff);
    outcome
  }

  /// Whether the user edited a panel within the typing hold.
  pub fn is_input_editing_active(&self) -> bool {
    let hold = self.inner.config.typing_hold;
    self
      .inner
      .state
      .lock()
      .last_input
      .is_some_and(|at| at.elapsed() < hold)
  }

  /// Apply a backend result now, or hold it while the user types.
  pub(crate) fn receive_result(&self, result: LineDiffComparisonResult) {
    if !self.is_input_editing_active() {
      self.apply_backend_result(result);
      return;
    }
    if self.inner.state.lock().deferred.replace(result).is_some() {
      log::trace!("newer result replaces held one in {}", self.inner.diff_tab_id);
    }
    self.schedule_deferred_poll();
  }

  fn schedule_deferred_poll(&self) {
    let weak = self.downgrade();
    self
      .inner
      .hold_timer
      .schedule(self.inner.config.typing_hold, move || async move {
        if let Some(session) = weak.upgrade() {
          session.poll_deferred();
        }
      });
  }

  /// Apply the held result once typing stopped, else look again later.
  pub(crate) fn poll_deferred(&self) {
    if !self.has_deferred_result() {
      return;
    }
    if self.is_input_editing_active() {
      self.schedule_deferred_poll();
      return;
    }
    let deferred = self.inner.state.lock().deferred.take();
    if let Some(result) = deferred {
      self.apply_backend_result(result);
    }
  }
}
