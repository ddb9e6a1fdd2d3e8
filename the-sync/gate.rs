/// Serializes commits of one logical unit.
///
/// At most one commit is in flight. A request that arrives meanwhile only
/// records that another pass is needed; the active committer replays once
/// when it finishes, reading whatever the latest state is by then.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitGate {
  in_flight: bool,
  retry:     bool,
}

impl CommitGate {
  /// Claim the gate. Returns `false` (and requests a replay) when a commit is
  /// already running.
  pub fn try_begin(&mut self) -> bool {
    if self.in_flight {
      self.retry = true;
      return false;
    }
    self.in_flight = true;
    true
  }

  /// End a pass. Returns `true` when another pass was requested, in which
  /// case the gate stays claimed for it.
  pub fn finish(&mut self) -> bool {
    if self.retry {
      self.retry = false;
      return true;
    }
    self.in_flight = false;
    false
  }

  /// Release the gate and forget any pending replay.
  pub fn abandon(&mut self) {
    self.in_flight = false;
    self.retry = false;
  }

  pub fn is_in_flight(&self) -> bool {
    self.in_flight
  }

  pub fn retry_requested(&self) -> bool {
    self.retry
  }
}
