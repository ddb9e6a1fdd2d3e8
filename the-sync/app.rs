use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      Ordering,
    },
  },
};

use parking_lot::Mutex;
use the_editor_backend::{
  Backend,
  protocol::TabId,
};
use the_editor_event::EventBus;

use crate::{
  config::Config,
  diff::DiffSession,
  editor::{
    EditorSession,
    FetchOutcome,
  },
  surface::{
    DiffPanels,
    EditorView,
    TabStore,
  },
};

/// Owns the event bus, the backend and every open session of one window.
pub struct Application {
  pub bus:       EventBus,
  pub config:    Config,
  backend:       Arc<dyn Backend>,
  tabs:          Arc<dyn TabStore>,
  editors:       Mutex<HashMap<TabId, EditorSession>>,
  diffs:         Mutex<HashMap<TabId, DiffSession>>,
  // set once the startup tab was created for this window
  startup_ready: AtomicBool,
}

impl Application {
  pub fn new(backend: Arc<dyn Backend>, tabs: Arc<dyn TabStore>, config: Config) -> Self {
    Self {
      bus: EventBus::new(),
      config,
      backend,
      tabs,
      editors: Mutex::new(HashMap::new()),
      diffs: Mutex::new(HashMap::new()),
      startup_ready: AtomicBool::new(false),
    }
  }

  pub fn backend(&self) -> &Arc<dyn Backend> {
    &self.backend
  }

  /// Returns `true` exactly once per application, for the caller that
  /// should create the startup tab.
  pub fn initialize_startup_tab(&self) -> bool {
    let first = !self.startup_ready.swap(true, Ordering::AcqRel);
    if first {
      log::debug!("initializing startup tab");
    }
    first
  }

  pub fn is_startup_tab_initialized(&self) -> bool {
    self.startup_ready.load(Ordering::Acquire)
  }

  /// Start syncing editor tab `id` into `view` and load its first range.
  /// A session already open for `id` is closed first.
  pub async fn open_editor(&self, id: TabId, view: Arc<dyn EditorView>) -> FetchOutcome {
    let session = EditorSession::new(
      id.clone(),
      self.backend.clone(),
      view,
      self.tabs.clone(),
      self.bus.clone(),
      self.config.sync.clone(),
    );
    let previous = self.editors.lock().insert(id, session.clone());
    if let Some(previous) = previous {
      previous.close();
    }
    session.open().await
  }

  /// Open a diff tab comparing `source_id` against `target_id`.
  pub async fn open_diff(
    &self,
    diff_tab_id: TabId,
    source_id: TabId,
    target_id: TabId,
    panels: Arc<dyn DiffPanels>,
  ) -> FetchOutcome {
    let session = DiffSession::new(
      diff_tab_id.clone(),
      source_id,
      target_id,
      self.backend.clone(),
      panels,
      self.tabs.clone(),
      self.bus.clone(),
      self.config.diff.clone(),
    );
    let previous = self.diffs.lock().insert(diff_tab_id, session.clone());
    if let Some(previous) = previous {
      previous.close();
    }
    session.open().await
  }

  pub fn editor(&self, id: &TabId) -> Option<EditorSession> {
    self.editors.lock().get(id).cloned()
  }

  pub fn diff(&self, diff_tab_id: &TabId) -> Option<DiffSession> {
    self.diffs.lock().get(diff_tab_id).cloned()
  }

  /// Close the editor or diff session of tab `id`. Diff tabs comparing a
  /// closed document are closed with it.
  pub fn close_tab(&self, id: &TabId) -> bool {
    let editor = self.editors.lock().remove(id);
    let diffs: Vec<DiffSession> = {
      let mut diffs = self.diffs.lock();
      let ids: Vec<TabId> = diffs
        .iter()
        .filter(|(diff_id, session)| *diff_id == id || session.compares(id))
        .map(|(diff_id, _)| diff_id.clone())
        .collect();
      ids.iter().filter_map(|diff_id| diffs.remove(diff_id)).collect()
    };

    let found = editor.is_some() || !diffs.is_empty();
    if let Some(editor) = editor {
      editor.close();
    }
    for diff in diffs {
      diff.close();
    }
    found
  }

  /// Close every session.
  pub fn shutdown(&self) {
    let editors: Vec<_> = self.editors.lock().drain().map(|(_, s)| s).collect();
    let diffs: Vec<_> = self.diffs.lock().drain().map(|(_, s)| s).collect();
    log::info!("closing {} editor and {} diff sessions", editors.len(), diffs.len());
    for editor in editors {
      editor.close();
    }
    for diff in diffs {
      diff.close();
    }
  }
}

impl std::fmt::Debug for Application {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Application")
      .field("editors", &self.editors.lock().len())
      .field("diffs", &self.diffs.lock().len())
      .field("startup_ready", &self.is_startup_tab_initialized())
      .finish_non_exhaustive()
  }
}
