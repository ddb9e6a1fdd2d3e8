//! Viewport and content synchronization for one editor tab.
//!
//! The document lives in the backend. An [`EditorSession`] keeps the input
//! layer and the visible line cache in step with it:
//!
//! - `Normal` and `Large` documents hold the whole text in the input layer
//!   and cache a tokenized (`Normal`) or plain (`Large`) window of the visible
//!   lines for display.
//! - `Huge` documents only materialize an editable window of lines; edits
//!   replace that window as a whole and a window lock keeps scroll driven
//!   refetches from racing the commit.
//!
//! All asynchronous results are guarded: fetches by the request version,
//! commits by the commit gate and the input rewrite count, delayed
//! caret/scroll applications by the navigation serial.

mod commit;
mod navigation;
mod segment;
mod viewport;
mod window_lock;


use std::sync::{
  Arc,
  Weak,
};

pub use commit::CommitOutcome;
pub use navigation::scroll_target;
use navigation::NavigationState;
use parking_lot::Mutex;
pub use segment::{
  EditorSegmentState,
  FetchMode,
  FetchOutcome,
  LineCache,
  RequestVersion,
};
use the_editor_backend::{
  Backend,
  protocol::TabId,
};
use the_editor_event::{
  DebouncedTask,
  EventBus,
  SubscriberId,
  Subscription,
};
pub use viewport::{
  FetchPlan,
  PlanContext,
  ViewportTracker,
};
use window_lock::WindowLock;

use crate::{
  config::SyncConfig,
  events::{
    ForceRefresh,
    NavigateToLine,
    NavigateToOutline,
    PasteText,
    SearchClose,
  },
  gate::CommitGate,
  spawn_detached,
  surface::{
    EditorView,
    TabStore,
  },
  text::{
    LogicalCaret,
    splice_code_units,
  },
};

/// How a document is presented, chosen from its line count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
  /// Whole text editable, visible lines tokenized.
  Normal,
  /// Whole text editable, visible lines shown plain.
  Large,
  /// Only a window of lines is materialized and editable.
  Huge,
}

impl EditorMode {
  pub fn for_line_count(line_count: usize, config: &SyncConfig) -> Self {
    if line_count >= config.huge_file_lines {
      Self::Huge
    } else if line_count >= config.large_file_lines {
      Self::Large
    } else {
      Self::Normal
    }
  }

  /// Fetch mode used for the visible window.
  pub fn fetch_mode(self) -> FetchMode {
    match self {
      Self::Normal => FetchMode::Tokens,
      Self::Large => FetchMode::Plain,
      Self::Huge => FetchMode::Editable,
    }
  }
}

#[derive(Debug)]
pub(crate) struct EditorState {
  pub(crate) mode:           EditorMode,
  pub(crate) line_count:     usize,
  pub(crate) version:        RequestVersion,
  /// Editable window, huge mode only.
  pub(crate) segment:        EditorSegmentState,
  /// Text last known to match the backend.
  pub(crate) synced_text:    String,
  /// Bumped whenever a fetch rewrites the input layer. Commits only move the
  /// baseline when it did not change while they were in flight.
  pub(crate) input_rewrites: u64,
  pub(crate) cache:          LineCache,
  pub(crate) tracker:        ViewportTracker,
  /// Last visible range, `[start, stop)`.
  pub(crate) visible:        Option<(usize, usize)>,
  pub(crate) scrollbar_drag: bool,
  pub(crate) lock:           WindowLock,
  pub(crate) gate:           CommitGate,
  pub(crate) navigation:     NavigationState,
  pub(crate) closed:         bool,
}

impl EditorState {
  fn new(line_count: usize, config: &SyncConfig) -> Self {
    Self {
      mode: EditorMode::for_line_count(line_count, config),
      line_count,
      version: RequestVersion::default(),
      segment: EditorSegmentState::default(),
      synced_text: String::new(),
      input_rewrites: 0,
      cache: LineCache::default(),
      tracker: ViewportTracker::default(),
      visible: None,
      scrollbar_drag: false,
      lock: WindowLock::default(),
      gate: CommitGate::default(),
      navigation: NavigationState::default(),
      closed: false,
    }
  }

  /// First document line of the input layer.
  pub(crate) fn input_first_line(&self) -> usize {
    match self.mode {
      EditorMode::Huge => self.segment.start_line,
      EditorMode::Normal | EditorMode::Large => 0,
    }
  }
}

pub(crate) struct Inner {
  pub(crate) id:            TabId,
  pub(crate) config:        SyncConfig,
  pub(crate) backend:       Arc<dyn Backend>,
  pub(crate) view:          Arc<dyn EditorView>,
  pub(crate) tabs:          Arc<dyn TabStore>,
  pub(crate) bus:           EventBus,
  pub(crate) state:         Mutex<EditorState>,
  pub(crate) fetch_timer:   DebouncedTask,
  pub(crate) sync_timer:    DebouncedTask,
  pub(crate) unlock_timer:  DebouncedTask,
  pub(crate) flash_timer:   DebouncedTask,
  pub(crate) subscriptions: Mutex<Vec<Subscription>>,
}

/// Handle to the sync state of one editor tab. Clones share the session.
#[derive(Clone)]
pub struct EditorSession {
  pub(crate) inner: Arc<Inner>,
}

#[derive(Clone)]
pub(crate) struct WeakEditorSession(Weak<Inner>);

impl WeakEditorSession {
  pub(crate) fn upgrade(&self) -> Option<EditorSession> {
    self.0.upgrade().map(|inner| EditorSession { inner })
  }
}

impl EditorSession {
  /// Create the session and subscribe it to its events. Nothing is loaded
  /// until [`EditorSession::open`].
  pub fn new(
    id: TabId,
    backend: Arc<dyn Backend>,
    view: Arc<dyn EditorView>,
    tabs: Arc<dyn TabStore>,
    bus: EventBus,
    config: SyncConfig,
  ) -> Self {
    let line_count = tabs.line_count(&id).unwrap_or(1).max(1);
    let state = EditorState::new(line_count, &config);
    log::debug!("editor session for {id}: {line_count} lines, {:?} mode", state.mode);

    let session = Self {
      inner: Arc::new(Inner {
        id,
        config,
        backend,
        view,
        tabs,
        bus,
        state: Mutex::new(state),
        fetch_timer: DebouncedTask::new("segment-fetch"),
        sync_timer: DebouncedTask::new("edit-sync"),
        unlock_timer: DebouncedTask::new("window-unlock"),
        flash_timer: DebouncedTask::new("outline-flash"),
        subscriptions: Mutex::new(Vec::new()),
      }),
    };
    session.subscribe();
    session
  }

  fn subscribe(&self) {
    let owner = SubscriberId::next();
    let bus = &self.inner.bus;
    let mut subscriptions = Vec::with_capacity(5);

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<NavigateToLine, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.id() == &event.tab_id) {
        let event = event.clone();
        spawn_detached("navigate-to-line", async move {
          session.navigate(event, false).await;
        });
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<NavigateToOutline, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.id() == &event.tab_id) {
        let event = event.clone();
        spawn_detached("navigate-to-outline", async move {
          session.navigate(event, true).await;
        });
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<ForceRefresh, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.id() == &event.tab_id) {
        let event = event.clone();
        spawn_detached("force-refresh", async move {
          session.force_refresh(event).await;
        });
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<SearchClose, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.id() == &event.tab_id) {
        session.search_close();
      }
    }));

    let weak = self.downgrade();
    subscriptions.push(bus.subscribe::<PasteText, _>(owner, move |event| {
      if let Some(session) = weak.upgrade().filter(|s| s.id() == &event.tab_id) {
        session.paste(&event.text);
      }
    }));

    *self.inner.subscriptions.lock() = subscriptions;
  }

  pub(crate) fn downgrade(&self) -> WeakEditorSession {
    WeakEditorSession(Arc::downgrade(&self.inner))
  }

  pub fn id(&self) -> &TabId {
    &self.inner.id
  }

  pub fn mode(&self) -> EditorMode {
    self.inner.state.lock().mode
  }

  pub fn line_count(&self) -> usize {
    self.inner.state.lock().line_count
  }

  pub fn segment(&self) -> EditorSegmentState {
    self.inner.state.lock().segment.clone()
  }

  pub fn cache(&self) -> LineCache {
    self.inner.state.lock().cache.clone()
  }

  pub fn synced_text(&self) -> String {
    self.inner.state.lock().synced_text.clone()
  }

  pub fn is_window_locked(&self) -> bool {
    self.inner.state.lock().lock.is_locked()
  }

  pub fn is_closed(&self) -> bool {
    self.inner.state.lock().closed
  }

  /// Load the document into the input layer and the visible cache.
  pub async fn open(&self) -> FetchOutcome {
    let outcome = self.reload().await;
    if outcome == FetchOutcome::Applied {
      self.resync_visible().await;
    }
    outcome
  }

  /// The input layer changed.
  pub fn on_input(&self) {
    self.schedule_sync();
  }

  /// An input-method composition finished; its text can be committed now.
  pub fn on_composition_end(&self) {
    self.schedule_sync();
  }

  /// Report the caret position to the tab store.
  pub fn on_selection_changed(&self) {
    let caret = self.logical_caret();
    self
      .inner
      .tabs
      .set_cursor(&self.inner.id, caret.line + 1, caret.column + 1);
  }

  /// Caret of the input layer in document coordinates.
  pub fn logical_caret(&self) -> LogicalCaret {
    let view = &self.inner.view;
    let text = view.text();
    let (start, _) = view.selection();
    let first_line = self.inner.state.lock().input_first_line();
    LogicalCaret::from_code_units(&text, start, first_line)
  }

  /// Replace the selection with pasted text and sync it.
  pub fn paste(&self, pasted: &str) {
    let view = &self.inner.view;
    let (start, end) = view.selection();
    let (merged, caret) = splice_code_units(&view.text(), start, end, pasted);
    view.set_text(&merged);
    view.set_selection(caret, caret);
    self.schedule_sync();
  }

  /// Tear the session down: timers, subscriptions and pending results.
  pub fn close(&self) {
    {
      let mut state = self.inner.state.lock();
      if state.closed {
        return;
      }
      state.closed = true;
      state.version.bump();
      state.navigation.serial += 1;
      state.gate.abandon();
    }
    self.inner.fetch_timer.cancel_pending();
    self.inner.sync_timer.cancel_pending();
    self.inner.unlock_timer.cancel_pending();
    self.inner.flash_timer.cancel_pending();
    self.inner.subscriptions.lock().clear();
    log::debug!("closed editor session for {}", self.inner.id);
  }
}

impl std::fmt::Debug for EditorSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EditorSession")
      .field("id", &self.inner.id)
      .finish_non_exhaustive()
  }
}
