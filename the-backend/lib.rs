//! The document backend contract consumed by the editor sync core.
//!
//! Documents live entirely in the backend; the frontend only ever holds
//! bounded windows of them. This crate describes the commands the core needs
//! ([`Backend`]), their payloads ([`protocol`]), a transport adapter that maps
//! them onto a generic command-invocation channel ([`InvokeBackend`]) and an
//! in-memory reference implementation ([`LocalBackend`]).

pub mod diff;
mod error;
mod invoke;
mod local;
pub mod protocol;

use async_trait::async_trait;
pub use error::{
  BackendError,
  Result,
};
pub use invoke::{
  Invoke,
  InvokeBackend,
};
pub use local::LocalBackend;
use protocol::{
  AlignedRows,
  ApplyAlignedDiffEditRequest,
  ApplyAlignedDiffEditResult,
  LineDiffComparisonResult,
  SyntaxToken,
  TabId,
};

/// Asynchronous document commands.
///
/// Line ranges are half-open `[start_line, end_line)` and 0-based. Character
/// offsets in [`Backend::edit_text`] count unicode scalar values. Calls are
/// independent request/response pairs: implementations give no ordering
/// guarantee between concurrent calls.
#[async_trait]
pub trait Backend: Send + Sync {
  /// Raw lines of `[start_line, end_line)`, line terminators included.
  async fn get_visible_lines_chunk(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<String>>;

  /// Syntax tokens of `[start_line, end_line)`, one entry per line.
  async fn get_syntax_token_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<Vec<SyntaxToken>>>;

  /// The text of `[start_line, end_line)` as one string.
  async fn get_visible_lines(&self, id: &TabId, start_line: usize, end_line: usize)
  -> Result<String>;

  /// Replace the lines `[start_line, end_line)` with `new_text` and return the
  /// new total line count.
  async fn replace_line_range(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
    new_text: &str,
  ) -> Result<usize>;

  /// Replace the characters `[start_char, end_char)` with `new_text` and
  /// return the new total line count.
  async fn edit_text(
    &self,
    id: &TabId,
    start_char: usize,
    end_char: usize,
    new_text: &str,
  ) -> Result<usize>;

  async fn compare_documents_by_line(
    &self,
    source_id: &TabId,
    target_id: &TabId,
  ) -> Result<LineDiffComparisonResult>;

  /// Persist one side of an aligned diff and return the recomputed comparison.
  async fn apply_aligned_diff_edit(
    &self,
    request: ApplyAlignedDiffEditRequest,
  ) -> Result<ApplyAlignedDiffEditResult>;

  /// Classify already aligned rows without realigning them. Only the diff
  /// kind and line number fields of the result are meaningful.
  async fn preview_aligned_diff_state(&self, rows: AlignedRows)
  -> Result<LineDiffComparisonResult>;

  /// Undo the last edit of a document and return its new line count.
  async fn undo(&self, id: &TabId) -> Result<usize>;

  /// Redo the last undone edit of a document and return its new line count.
  async fn redo(&self, id: &TabId) -> Result<usize>;
}
