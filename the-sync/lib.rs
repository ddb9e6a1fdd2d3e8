//! `the_editor_sync` keeps frontend views of backend resident documents in
//! step with the backend.
//!
//! - [`editor`]: viewport windowing, edit commits, navigation and force
//!   refresh for one editor tab.
//! - [`diff`]: the aligned two column diff model and its per-side commit
//!   engine.
//! - [`app`]: the application controller owning the event bus, the backend
//!   and every open session.
//!
//! The host UI is reached only through the traits in [`surface`].

pub mod app;
pub mod config;
pub mod diff;
pub mod editor;
pub mod events;
pub mod gate;
pub mod logging;
pub mod paths;
pub mod surface;
pub mod text;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;

pub use app::Application;
pub use config::{
  Config,
  ConfigLoadError,
  DiffConfig,
  SyncConfig,
};
pub use diff::DiffSession;
pub use editor::{
  EditorMode,
  EditorSession,
};

/// Spawn `future` on the current runtime without keeping its handle.
pub(crate) fn spawn_detached<F>(what: &'static str, future: F)
where
  F: Future<Output = ()> + Send + 'static,
{
  match tokio::runtime::Handle::try_current() {
    Ok(runtime) => {
      runtime.spawn(future);
    },
    Err(_) => log::warn!("{what}: no async runtime, dropping task"),
  }
}
