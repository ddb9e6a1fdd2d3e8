//! Dual panel diff view of two backend documents.
//!
//! A [`DiffSession`] owns the [`AlignedDiffModel`] of one diff tab. Each panel
//! shows one side of it, one line per aligned row, fillers included. Panel
//! edits are folded back into the model, committed per side after a short
//! debounce and answered by the backend with a fresh comparison. While the
//! user keeps typing such results are held back so they never overwrite the
//! text under the caret.

mod alignment;
mod commit;
mod model;
mod snapshot;


use std::sync::{
  Arc,
  Weak,
};

pub use commit::SideCommitOutcome;
pub use model::{
  AlignedDiffModel,
  CommittedText,
  normalize,
};
use parking_lot::Mutex;
pub use snapshot::CaretSnapshot;
use snapshot::PendingRestore;
use the_editor_backend::{
  Backend,
  protocol::{
    DiffSide,
    LineDiffComparisonResult,
    TabId,
  },
};
use the_editor_event::{
  DebouncedTask,
  EventBus,
  SubscriberId,
  Subscription,
};
use tokio::time::Instant;

use crate::{
  config::DiffConfig,
  editor::FetchOutcome,
  events::{
    DiffHistoryAction,
    DiffHistoryRequest,
    DiffPasteRequest,
    DiffPasteText,
    DocumentUpdated,
    ForceRefresh,
    HistoryAction,
    TabEvent,
  },
  gate::CommitGate,
  spawn_detached,
  surface::{
    DiffPanels,
    TabStore,
  },
  text::splice_code_units,
};

/// One value per diff side.
#[derive(Debug, Default)]
pub(crate) struct Sides<T> {
  source: T,
  target: T,
}

impl<T> Sides<T> {
  pub(crate) fn new(source: T, target: T) -> Self {
    Self { source, target }
  }

  pub(crate) fn get(&self, side: DiffSide) -> &T {
    match side {
      DiffSide::Source => &self.source,
      DiffSide::Target => &self.target,
    }
  }

  pub(crate) fn get_mut(&mut self, side: DiffSide) -> &mut T {
    match side {
      DiffSide::Source => &mut self.source,
      DiffSide::Target => &mut self.target,
    }
  }
}

#[derive(Debug, Default)]
pub(crate) struct SideState {
  pub(crate) gate:      CommitGate,
  /// Baseline for change detection.
  pub(crate) committed: CommittedText,
}

#[derive(Debug, Default)]
pub(crate) struct DiffState {
  pub(crate) model:        AlignedDiffModel,
  pub(crate) sides:        Sides<SideState>,
  /// Last panel edit, for the typing guard.
  pub(crate) last_input:   Option<Instant>,
  /// Newest backend result held back while typing.
  pub(crate) deferred:     Option<LineDiffComparisonResult>,
  pub(crate) preview_seq:  u64,
  pub(crate) apply_serial: u64,
  pub(crate) restore:      Option<PendingRestore>,
  pub(crate) closed:       bool,
}

pub(crate) struct Inner {
  pub(crate) diff_tab_id:   TabId,
  pub(crate) tab_ids:       Sides<TabId>,
  pub(crate) config:        DiffConfig,
  pub(crate) backend:       Arc<dyn Backend>,
  pub(crate) panels:        Arc<dyn DiffPanels>,
  pub(crate) tabs:          Arc<dyn TabStore>,
  pub(crate) bus:           EventBus,
  pub(crate) state:         Mutex<DiffState>,
  pub(crate) commit_timers: Sides<DebouncedTask>,
  pub(crate) preview_timer: DebouncedTask,
  pub(crate) refresh_timer: DebouncedTask,
  pub(crate) hold_timer:    DebouncedTask,
  pub(crate) restore_timer: DebouncedTask,
  pub(crate) subscriptions: Mutex<Vec<Subscription>>,
}

/// Handle to one diff tab. Clones share the session.
#[derive(Clone)]
pub struct DiffSession {
  pub(crate) inner: Arc<Inner>,
}

#[derive(Clone)]
pub(crate) struct WeakDiffSession(Weak<Inner>);

impl WeakDiffSession {
  pub(crate) fn upgrade(&self) -> Option<DiffSession> {
    self.0.upgrade().map(|inner| DiffSession { inner })
  }
}

impl DiffSession {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    diff_tab_id: TabId,
    source_id: TabId,
    target_id: TabId,
    backend: Arc<dyn Backend>,
    panels: Arc<dyn DiffPanels>,
    tabs: Arc<dyn TabStore>,
    bus: EventBus,
    config: DiffConfig,
  ) -> Self {
    log::debug!("diff session {diff_tab_id}: {source_id} against {target_id}");
    let session = Self {
      inner: Arc::new(Inner {
        diff_tab_id,
        tab_ids: Sides::new(source_id, target_id),
        config,
        backend,
        panels,
        tabs,
        bus,
        state: Mutex::new(DiffState::default()),
        commit_timers: Sides::new(
          DebouncedTask::new("source-commit"),
          DebouncedTask::new("target-commit"),
        ),
        preview_timer: DebouncedTask::new("diff-preview"),
        refresh_timer: DebouncedTask::new("diff-refresh"),
        hold_timer: DebouncedTask::new("diff-hold"),
        restore_timer: DebouncedTask::new("diff-restore"),
        subscriptions: Mutex::new(Vec::new()),
      }),
    };
    session.subscribe();
    session
  }

  fn subscribe(&self) {
    let owner = SubscriberId::next();
    let bus = &self.inner.bus;
    let mut subscriptions = Vec::with_capacity(3);

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<DiffHistoryAction, _>(owner, move |event| {
      if let Some(session) = weak
        .upgrade()
        .filter(|s| s.diff_tab_id() == &event.diff_tab_id)
      {
        let event = event.clone();
        spawn_detached("diff-history", async move {
          session.history(event).await;
        });
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<DiffPasteText, _>(owner, move |event| {
      if let Some(session) = weak
        .upgrade()
        .filter(|s| s.diff_tab_id() == &event.diff_tab_id)
      {
        session.paste(event);
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<ForceRefresh, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.compares(&event.tab_id)) {
        session.schedule_refresh();
      }
    }));

    *self.inner.subscriptions.lock() = subscriptions;
  }

  pub(crate) fn downgrade(&self) -> WeakDiffSession {
    WeakDiffSession(Arc::downgrade(&self.inner))
  }

  pub fn diff_tab_id(&self) -> &TabId {
    &self.inner.diff_tab_id
  }

  /// Tab of the document shown on `side`.
  pub fn tab_id(&self, side: DiffSide) -> &TabId {
    self.inner.tab_ids.get(side)
  }

  /// Whether `id` is one of the compared documents.
  pub fn compares(&self, id: &TabId) -> bool {
    DiffSide::BOTH.iter().any(|side| self.tab_id(*side) == id)
  }

  pub fn model(&self) -> AlignedDiffModel {
    self.inner.state.lock().model.clone()
  }

  pub fn committed(&self, side: DiffSide) -> CommittedText {
    self.inner.state.lock().sides.get(side).committed.clone()
  }

  /// Whether a backend result is waiting for typing to stop.
  pub fn has_deferred_result(&self) -> bool {
    self.inner.state.lock().deferred.is_some()
  }

  pub fn is_closed(&self) -> bool {
    self.inner.state.lock().closed
  }

  /// Compare the two documents and show the result.
  pub async fn open(&self) -> FetchOutcome {
    match self.compare().await {
      Some(result) => {
        self.apply_backend_result(result);
        FetchOutcome::Applied
      },
      None => FetchOutcome::Failed,
    }
  }

  async fn compare(&self) -> Option<LineDiffComparisonResult> {
    let inner = &self.inner;
    let (source, target) = (self.tab_id(DiffSide::Source), self.tab_id(DiffSide::Target));
    match inner.backend.compare_documents_by_line(source, target).await {
      Ok(result) => Some(result),
      Err(err) => {
        log::error!("failed to compare {source} with {target}: {err}");
        None
      },
    }
  }

  /// Debounced recompare after one of the documents changed elsewhere.
  pub fn schedule_refresh(&self) {
    let weak = self.downgrade();
    self
      .inner
      .refresh_timer
      .schedule(self.inner.config.refresh_debounce, move || async move {
        if let Some(session) = weak.upgrade() {
          session.refresh().await;
        }
      });
  }

  /// Recompare now. The result goes through the typing guard, so `Applied`
  /// may also mean it is held until typing stops.
  pub async fn refresh(&self) -> FetchOutcome {
    let Some(result) = self.compare().await else {
      return FetchOutcome::Failed;
    };
    if self.is_closed() {
      return FetchOutcome::Stale;
    }
    self.receive_result(result);
    FetchOutcome::Applied
  }

  /// A panel's text changed through user input.
  pub fn on_panel_input(&self, side: DiffSide) {
    let inner = &self.inner;
    let panels = &inner.panels;
    let text = panels.panel_text(side);
    let (texts, kinds) = {
      let mut state = inner.state.lock();
      if state.closed {
        return;
      }
      state.last_input = Some(Instant::now());
      if !state.model.update_side(side, &text) {
        return;
      }
      let texts = DiffSide::BOTH.map(|side| state.model.panel_text(side));
      (texts, state.model.kinds().to_vec())
    };

    // inserted or removed rows show up in both panels
    for (panel, expected) in DiffSide::BOTH.into_iter().zip(texts) {
      if panels.panel_text(panel) == expected {
        continue;
      }
      if panel == side {
        let (start, end) = panels.selection(side);
        panels.set_panel_text(side, &expected);
        panels.focus(side, start, end);
      } else {
        panels.set_panel_text(panel, &expected);
      }
    }
    panels.show_kinds(&kinds);

    self.schedule_side_commit(side);
    self.schedule_preview_metadata();
  }

  /// The panel a request addresses: the given one or the focused one.
  fn resolve_side(&self, panel: Option<DiffSide>) -> Option<DiffSide> {
    panel.or_else(|| self.inner.panels.focused().map(|focus| focus.side))
  }

  /// Insert pasted text into a panel's selection.
  pub fn paste(&self, request: &DiffPasteRequest) {
    let Some(side) = self.resolve_side(request.panel) else {
      log::debug!("paste into {} without a panel", self.inner.diff_tab_id);
      return;
    };
    let panels = &self.inner.panels;
    let (start, end) = panels.selection(side);
    let (text, caret) = splice_code_units(&panels.panel_text(side), start, end, &request.text);
    panels.set_panel_text(side, &text);
    panels.focus(side, caret, caret);
    self.on_panel_input(side);
  }

  /// Undo or redo in the document behind a panel. Pending input of both
  /// panels is committed first, the fresh comparison replaces them. Returns
  /// the document's new line count.
  pub async fn history(&self, request: DiffHistoryRequest) -> Option<usize> {
    let Some(side) = self.resolve_side(request.panel) else {
      log::debug!("history action on {} without a panel", self.inner.diff_tab_id);
      return None;
    };
    for pending in DiffSide::BOTH {
      self.clear_side_commit_timer(pending);
      self.flush_side_commit(pending).await;
    }

    let inner = &self.inner;
    let id = self.tab_id(side).clone();
    let (result, action) = match request.action {
      HistoryAction::Undo => (inner.backend.undo(&id).await, "undo"),
      HistoryAction::Redo => (inner.backend.redo(&id).await, "redo"),
    };
    let line_count = match result {
      Ok(line_count) => line_count,
      Err(err) => {
        log::warn!("{action} in {id} failed: {err}");
        return None;
      },
    };

    inner.tabs.set_line_count(&id, line_count);
    inner.tabs.set_dirty(&id, true);
    inner.bus.publish::<DocumentUpdated>(TabEvent { tab_id: id });

    // an explicit history step shows its result right away
    if let Some(result) = self.compare().await
      && !self.is_closed()
    {
      self.apply_backend_result(result);
    }
    Some(line_count)
  }

  /// Tear the session down: timers, subscriptions and held results.
  pub fn close(&self) {
    {
      let mut state = self.inner.state.lock();
      if state.closed {
        return;
      }
      state.closed = true;
      state.preview_seq += 1;
      state.deferred = None;
      state.restore = None;
      for side in DiffSide::BOTH {
        state.sides.get_mut(side).gate.abandon();
      }
    }
    let inner = &self.inner;
    for side in DiffSide::BOTH {
      inner.commit_timers.get(side).cancel_pending();
    }
    inner.preview_timer.cancel_pending();
    inner.refresh_timer.cancel_pending();
    inner.hold_timer.cancel_pending();
    inner.restore_timer.cancel_pending();
    inner.subscriptions.lock().clear();
    log::debug!("closed diff session {}", inner.diff_tab_id);
  }
}

impl std::fmt::Debug for DiffSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DiffSession")
      .field("diff_tab_id", &self.inner.diff_tab_id)
      .field("source", self.tab_id(DiffSide::Source))
      .field("target", self.tab_id(DiffSide::Target))
      .finish_non_exhaustive()
  }
}
