use thiserror::Error;

use crate::protocol::TabId;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("unknown document {0}")]
  UnknownDocument(TabId),
  #[error("invalid range {start}..{end} for {id} ({len} available)")]
  InvalidRange {
    id:    TabId,
    start: usize,
    end:   usize,
    len:   usize,
  },
  #[error("nothing to {action} in {id}")]
  HistoryExhausted { id: TabId, action: &'static str },
  #[error("command {command} failed: {message}")]
  Command {
    command: &'static str,
    message: String,
  },
  #[error("malformed payload for {command}: {source}")]
  Payload {
    command: &'static str,
    #[source]
    source:  serde_json::Error,
  },
}

pub type Result<T> = std::result::Result<T, BackendError>;
