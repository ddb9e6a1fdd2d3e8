use the_editor_backend::protocol::{
  AlignedRows,
  DiffSide,
  LineDiffComparisonResult,
};

use super::{
  AlignedDiffModel,
  CaretSnapshot,
  DiffSession,
  PendingRestore,
};

impl DiffSession {
  /// Show a comparison from the backend.
  ///
  /// Both panels are rewritten and the committed baselines reset to the
  /// result. The scroll offsets and the focused caret are snapshotted first
  /// and restored once, one frame after the reflow.
  pub fn apply_backend_result(&self, result: LineDiffComparisonResult) {
    let inner = &self.inner;
    let panels = &inner.panels;
    let scroll = panels.scroll();
    let focus = panels
      .focused()
      .map(|focus| (focus, panels.panel_text(focus.side)));

    let model = AlignedDiffModel::new(result);
    let texts = DiffSide::BOTH.map(|side| model.panel_text(side));
    let kinds = model.kinds().to_vec();
    {
      let mut state = inner.state.lock();
      if state.closed {
        return;
      }
      let caret = focus.map(|(focus, text)| CaretSnapshot::capture(&state.model, focus, &text));
      for side in DiffSide::BOTH {
        state.sides.get_mut(side).committed = model.committed_text(side);
      }
      // the full result supersedes previews and held results
      state.preview_seq += 1;
      state.deferred = None;
      state.apply_serial += 1;
      state.restore = Some(PendingRestore {
        serial: state.apply_serial,
        scroll,
        caret,
      });
      state.model = model;
    }

    log::trace!("applied {} aligned rows to {}", kinds.len(), inner.diff_tab_id);
    for (side, text) in DiffSide::BOTH.into_iter().zip(texts) {
      panels.set_panel_text(side, &text);
    }
    panels.show_kinds(&kinds);
    self.schedule_restore();
  }

  fn schedule_restore(&self) {
    let weak = self.downgrade();
    self
      .inner
      .restore_timer
      .schedule(self.inner.config.restore_frame, move || async move {
        if let Some(session) = weak.upgrade() {
          session.restore_snapshots();
        }
      });
  }

  /// Put scroll and caret back after a reflow. Each snapshot is used once.
  pub(crate) fn restore_snapshots(&self) {
    let inner = &self.inner;
    let (restore, selection) = {
      let mut state = inner.state.lock();
      let Some(restore) = state.restore.take() else {
        return;
      };
      if state.closed || restore.serial != state.apply_serial {
        return;
      }
      let selection = restore
        .caret
        .map(|caret| (caret.side, caret.resolve(&state.model)));
      (restore, selection)
    };

    inner.panels.set_scroll(restore.scroll);
    if let Some((side, (start, end))) = selection {
      inner.panels.focus(side, start, end);
    }
  }

  /// Recompute diff kinds for the current rows after the preview debounce.
  /// A newer request or a full result supersedes it.
  pub fn schedule_preview_metadata(&self) {
    let (seq, rows) = {
      let mut state = self.inner.state.lock();
      state.preview_seq += 1;
      (state.preview_seq, state.model.rows())
    };
    let weak = self.downgrade();
    self
      .inner
      .preview_timer
      .schedule(self.inner.config.preview_debounce, move || async move {
        if let Some(session) = weak.upgrade() {
          session.compute_preview(seq, rows).await;
        }
      });
  }

  async fn compute_preview(&self, seq: u64, rows: AlignedRows) -> bool {
    let inner = &self.inner;
    let expected = rows.len();
    let preview = match inner.backend.preview_aligned_diff_state(rows).await {
      Ok(preview) => preview,
      Err(err) => {
        log::error!("failed to preview diff of {}: {err}", inner.diff_tab_id);
        return false;
      },
    };

    let kinds = {
      let mut state = inner.state.lock();
      if state.closed || state.preview_seq != seq || state.model.len() != expected {
        return false;
      }
      if !state.model.apply_preview(&preview) {
        return false;
      }
      state.model.kinds().to_vec()
    };
    inner.panels.show_kinds(&kinds);
    true
  }
}
