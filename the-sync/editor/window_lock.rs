use super::EditorSession;

/// Keeps scroll driven refetches of a huge document's window from racing a
/// commit of that window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WindowLock {
  locked:        bool,
  follow_scroll: bool,
}

impl WindowLock {
  pub(crate) fn lock(&mut self) {
    self.locked = true;
  }

  pub(crate) fn is_locked(&self) -> bool {
    self.locked
  }

  /// A refetch was wanted while locked; replay it on unlock.
  pub(crate) fn request_follow(&mut self) {
    self.follow_scroll = true;
  }

  pub(crate) fn follow_requested(&self) -> bool {
    self.follow_scroll
  }

  /// Unlock and take the follow-scroll request.
  pub(crate) fn unlock(&mut self) -> bool {
    self.locked = false;
    std::mem::take(&mut self.follow_scroll)
  }
}

impl EditorSession {
  pub(crate) fn lock_window(&self) {
    self.inner.state.lock().lock.lock();
    self.inner.unlock_timer.cancel_pending();
  }

  /// (Re)start the unlock timer.
  pub(crate) fn schedule_unlock(&self) {
    let weak = self.downgrade();
    self
      .inner
      .unlock_timer
      .schedule(self.inner.config.window_unlock_delay, move || async move {
        if let Some(session) = weak.upgrade() {
          session.unlock_window().await;
        }
      });
  }

  pub(crate) async fn unlock_window(&self) {
    let follow = {
      let mut state = self.inner.state.lock();
      if state.closed {
        return;
      }
      state.lock.unlock()
    };
    if follow {
      log::debug!("window of {} unlocked, following scroll", self.inner.id);
      self.refetch_viewport().await;
    }
  }
}
