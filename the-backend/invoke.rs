use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{
  Value,
  json,
};

use crate::{
  Backend,
  BackendError,
  Result,
  protocol::{
    AlignedRows,
    ApplyAlignedDiffEditRequest,
    ApplyAlignedDiffEditResult,
    LineDiffComparisonResult,
    SyntaxToken,
    TabId,
  },
};

/// An asynchronous command channel: a command name plus a JSON object of
/// arguments in, a JSON value or an error message out.
#[async_trait]
pub trait Invoke: Send + Sync {
  async fn invoke(&self, command: &'static str, args: Value) -> std::result::Result<Value, String>;
}

/// [`Backend`] on top of an [`Invoke`] channel.
pub struct InvokeBackend<I> {
  channel: I,
}

impl<I: Invoke> InvokeBackend<I> {
  pub fn new(channel: I) -> Self {
    Self { channel }
  }

  pub fn channel(&self) -> &I {
    &self.channel
  }

  async fn call<T: DeserializeOwned>(&self, command: &'static str, args: Value) -> Result<T> {
    log::trace!("invoke {command}");
    let value = self
      .channel
      .invoke(command, args)
      .await
      .map_err(|message| BackendError::Command { command, message })?;
    serde_json::from_value(value).map_err(|source| BackendError::Payload { command, source })
  }
}

fn line_range_args(id: &TabId, start_line: usize, end_line: usize) -> Value {
  json!({
    "id": id,
    "startLine": start_line,
    "endLine": end_line,
  })
}

fn to_args(command: &'static str, payload: &impl serde::Serialize) -> Result<Value> {
  serde_json::to_value(payload).map_err(|source| BackendError::Payload { command, source })
}

#[async_trait]
impl<I: Invoke> Backend for InvokeBackend<I> {
  async fn get_visible_lines_chunk(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<String>> {
    self
      .call("get_visible_lines_chunk", line_range_args(id, start_line, end_line))
      .await
  }

  async fn get_syntax_token_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<Vec<SyntaxToken>>> {
    self
      .call("get_syntax_token_lines", line_range_args(id, start_line, end_line))
      .await
  }

  async fn get_visible_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<String> {
    self
      .call("get_visible_lines", line_range_args(id, start_line, end_line))
      .await
  }

  async fn replace_line_range(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
    new_text: &str,
  ) -> Result<usize> {
    let args = json!({
      "id": id,
      "startLine": start_line,
      "endLine": end_line,
      "newText": new_text,
    });
    self.call("replace_line_range", args).await
  }

  async fn edit_text(
    &self,
    id: &TabId,
    start_char: usize,
    end_char: usize,
    new_text: &str,
  ) -> Result<usize> {
    let args = json!({
      "id": id,
      "startChar": start_char,
      "endChar": end_char,
      "newText": new_text,
    });
    self.call("edit_text", args).await
  }

  async fn compare_documents_by_line(
    &self,
    source_id: &TabId,
    target_id: &TabId,
  ) -> Result<LineDiffComparisonResult> {
    let args = json!({ "sourceId": source_id, "targetId": target_id });
    self.call("compare_documents_by_line", args).await
  }

  async fn apply_aligned_diff_edit(
    &self,
    request: ApplyAlignedDiffEditRequest,
  ) -> Result<ApplyAlignedDiffEditResult> {
    const COMMAND: &str = "apply_aligned_diff_edit";
    let args = to_args(COMMAND, &request)?;
    self.call(COMMAND, args).await
  }

  async fn preview_aligned_diff_state(
    &self,
    rows: AlignedRows,
  ) -> Result<LineDiffComparisonResult> {
    const COMMAND: &str = "preview_aligned_diff_state";
    let args = to_args(COMMAND, &rows)?;
    self.call(COMMAND, args).await
  }

  async fn undo(&self, id: &TabId) -> Result<usize> {
    self.call("undo", json!({ "id": id })).await
  }

  async fn redo(&self, id: &TabId) -> Result<usize> {
    self.call("redo", json!({ "id": id })).await
  }
}

#[cfg(test)]
mod tests {
  use parking_lot::Mutex;

  use super::*;
  use crate::protocol::DiffSide;

  /// Records every call and answers with a canned value.
  struct Recorder {
    calls:    Mutex<Vec<(&'static str, Value)>>,
    response: std::result::Result<Value, String>,
  }

  impl Recorder {
    fn answering(response: Value) -> Self {
      Self {
        calls:    Mutex::new(Vec::new()),
        response: Ok(response),
      }
    }

    fn failing(message: &str) -> Self {
      Self {
        calls:    Mutex::new(Vec::new()),
        response: Err(message.to_string()),
      }
    }
  }

  #[async_trait]
  impl Invoke for Recorder {
    async fn invoke(&self, command: &'static str, args: Value) -> std::result::Result<Value, String> {
      self.calls.lock().push((command, args));
      self.response.clone()
    }
  }

  #[tokio::test]
  async fn line_range_arguments_are_camel_case() {
    let backend = InvokeBackend::new(Recorder::answering(json!(["a\n", "b"])));
    let lines = backend
      .get_visible_lines_chunk(&TabId::new("tab-1"), 3, 5)
      .await
      .unwrap();
    assert_eq!(lines, vec!["a\n", "b"]);

    let calls = backend.channel().calls.lock();
    assert_eq!(calls[0].0, "get_visible_lines_chunk");
    assert_eq!(calls[0].1, json!({ "id": "tab-1", "startLine": 3, "endLine": 5 }));
  }

  #[tokio::test]
  async fn edit_text_arguments() {
    let backend = InvokeBackend::new(Recorder::answering(json!(12)));
    let count = backend
      .edit_text(&TabId::new("t"), 3, 3, "X")
      .await
      .unwrap();
    assert_eq!(count, 12);
    let calls = backend.channel().calls.lock();
    assert_eq!(
      calls[0].1,
      json!({ "id": "t", "startChar": 3, "endChar": 3, "newText": "X" })
    );
  }

  #[tokio::test]
  async fn apply_request_is_flattened() {
    let response = json!({
      "lineDiff": { "alignedLineCount": 0 },
      "sourceIsDirty": true,
      "targetIsDirty": false,
    });
    let backend = InvokeBackend::new(Recorder::answering(response));
    let request = ApplyAlignedDiffEditRequest {
      source_id:               TabId::new("s"),
      target_id:               TabId::new("t"),
      edited_side:             DiffSide::Source,
      rows:                    AlignedRows {
        aligned_source_lines:   vec!["a".into()],
        aligned_target_lines:   vec!["b".into()],
        aligned_source_present: vec![true],
        aligned_target_present: vec![true],
      },
      edited_trailing_newline: true,
    };
    let result = backend.apply_aligned_diff_edit(request).await.unwrap();
    assert!(result.source_is_dirty);
    assert!(!result.target_is_dirty);

    let calls = backend.channel().calls.lock();
    assert_eq!(
      calls[0].1,
      json!({
        "sourceId": "s",
        "targetId": "t",
        "editedSide": "source",
        "alignedSourceLines": ["a"],
        "alignedTargetLines": ["b"],
        "alignedSourcePresent": [true],
        "alignedTargetPresent": [true],
        "editedTrailingNewline": true,
      })
    );
  }

  #[tokio::test]
  async fn failures_carry_the_command() {
    let backend = InvokeBackend::new(Recorder::failing("tab closed"));
    let err = backend.undo(&TabId::new("t")).await.unwrap_err();
    assert!(matches!(
      err,
      BackendError::Command { command: "undo", ref message } if message == "tab closed"
    ));
  }

  #[tokio::test]
  async fn malformed_responses_are_payload_errors() {
    let backend = InvokeBackend::new(Recorder::answering(json!("not a number")));
    let err = backend
      .replace_line_range(&TabId::new("t"), 0, 1, "x")
      .await
      .unwrap_err();
    assert!(matches!(err, BackendError::Payload { command: "replace_line_range", .. }));
  }
}
