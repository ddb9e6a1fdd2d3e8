//! A reusable debounced timer.

use std::{
  future::Future,
  time::Duration,
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// A single-slot debounced timer with "replace pending" semantics.
///
/// Scheduling while a previous timer is still waiting aborts the previous
/// timer, so at most one timer per `DebouncedTask` is ever pending. Once a
/// timer fires, the task it launches is spawned detached: cancelling or
/// rescheduling afterwards only affects timers that have not fired yet, so
/// work that already reached the backend always runs to completion.
///
/// Dropping the `DebouncedTask` aborts the pending timer, which is how
/// owners clear their timers on teardown.
pub struct DebouncedTask {
  name:    &'static str,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedTask {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      pending: Mutex::new(None),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Run `task` after `delay`, replacing any timer that has not fired yet.
  pub fn schedule<F, Fut>(&self, delay: Duration, task: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    // only spawn inside a runtime so unrelated unit tests do not need one
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      log::warn!("{}: no async runtime, dropping scheduled task", self.name);
      return;
    };

    let timer = runtime.spawn(async move {
      tokio::time::sleep(delay).await;
      tokio::spawn(task());
    });

    if let Some(previous) = self.pending.lock().replace(timer) {
      previous.abort();
    }
  }

  /// Abort the pending timer. Returns `true` if a timer was still waiting.
  pub fn cancel_pending(&self) -> bool {
    match self.pending.lock().take() {
      Some(timer) => {
        let waiting = !timer.is_finished();
        timer.abort();
        waiting
      },
      None => false,
    }
  }

  pub fn is_pending(&self) -> bool {
    self
      .pending
      .lock()
      .as_ref()
      .is_some_and(|timer| !timer.is_finished())
  }
}

impl std::fmt::Debug for DebouncedTask {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DebouncedTask")
      .field("name", &self.name)
      .field("pending", &self.is_pending())
      .finish()
  }
}

impl Drop for DebouncedTask {
  fn drop(&mut self) {
    if let Some(timer) = self.pending.get_mut().take() {
      timer.abort();
    }
  }
}
