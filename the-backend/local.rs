use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use ropey::Rope;

use crate::{
  Backend,
  BackendError,
  Result,
  diff::{
    classify_rows,
    compare_documents,
    trim_line_ending,
  },
  protocol::{
    AlignedRows,
    ApplyAlignedDiffEditRequest,
    ApplyAlignedDiffEditResult,
    DiffSide,
    LineDiffComparisonResult,
    SyntaxToken,
    TabId,
  },
};

const MAX_HISTORY: usize = 256;

#[derive(Debug, Default)]
struct Document {
  text:  Rope,
  dirty: bool,
  undo:  Vec<Rope>,
  redo:  Vec<Rope>,
}

impl Document {
  fn new(text: &str) -> Self {
    Self {
      text: Rope::from_str(text),
      ..Default::default()
    }
  }

  /// Record the current text as an undo point and replace it.
  fn commit(&mut self, text: Rope) -> usize {
    let previous = std::mem::replace(&mut self.text, text);
    self.undo.push(previous);
    if self.undo.len() > MAX_HISTORY {
      self.undo.remove(0);
    }
    self.redo.clear();
    self.dirty = true;
    self.text.len_lines()
  }

  fn line_range(&self, id: &TabId, start_line: usize, end_line: usize) -> Result<(usize, usize)> {
    let len = self.text.len_lines();
    if start_line > end_line || start_line > len {
      return Err(BackendError::InvalidRange {
        id: id.clone(),
        start: start_line,
        end: end_line,
        len,
      });
    }
    Ok((start_line, end_line.min(len)))
  }
}

/// An in-memory document service.
///
/// Documents are [`Rope`]s keyed by [`TabId`]. Every mutation records the
/// previous revision so `undo`/`redo` can step through them.
#[derive(Debug, Default)]
pub struct LocalBackend {
  documents: RwLock<HashMap<TabId, Document>>,
}

impl LocalBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open (or replace) a document.
  pub fn open(&self, id: impl Into<TabId>, text: &str) {
    self.documents.write().insert(id.into(), Document::new(text));
  }

  pub fn close(&self, id: &TabId) -> bool {
    self.documents.write().remove(id).is_some()
  }

  pub fn text(&self, id: &TabId) -> Option<String> {
    self.documents.read().get(id).map(|doc| doc.text.to_string())
  }

  pub fn line_count(&self, id: &TabId) -> Option<usize> {
    self.documents.read().get(id).map(|doc| doc.text.len_lines())
  }

  pub fn is_dirty(&self, id: &TabId) -> Option<bool> {
    self.documents.read().get(id).map(|doc| doc.dirty)
  }

  fn with_document<T>(&self, id: &TabId, f: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
    let documents = self.documents.read();
    let doc = documents
      .get(id)
      .ok_or_else(|| BackendError::UnknownDocument(id.clone()))?;
    f(doc)
  }

  fn with_document_mut<T>(
    &self,
    id: &TabId,
    f: impl FnOnce(&mut Document) -> Result<T>,
  ) -> Result<T> {
    let mut documents = self.documents.write();
    let doc = documents
      .get_mut(id)
      .ok_or_else(|| BackendError::UnknownDocument(id.clone()))?;
    f(doc)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenClass {
  Whitespace,
  Word,
  Punctuation,
}

impl TokenClass {
  fn of(ch: char) -> Self {
    if ch.is_whitespace() {
      Self::Whitespace
    } else if ch.is_alphanumeric() || ch == '_' {
      Self::Word
    } else {
      Self::Punctuation
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Whitespace => "whitespace",
      Self::Word => "word",
      Self::Punctuation => "punctuation",
    }
  }
}

/// Split a line into runs of one character class.
fn tokenize_line(line: &str) -> Vec<SyntaxToken> {
  let mut tokens = Vec::new();
  let mut buf = String::new();
  let mut class = None;

  for ch in line.chars() {
    let next_class = TokenClass::of(ch);
    if class == Some(next_class) {
      buf.push(ch);
      continue;
    }
    if let Some(class) = class {
      tokens.push(SyntaxToken::new(std::mem::take(&mut buf), class.name()));
    }
    buf.push(ch);
    class = Some(next_class);
  }

  if let Some(class) = class {
    tokens.push(SyntaxToken::new(buf, class.name()));
  }
  tokens
}

fn chunk(doc: &Document, start_line: usize, end_line: usize) -> Vec<String> {
  (start_line..end_line)
    .map(|line| doc.text.line(line).to_string())
    .collect()
}

#[async_trait]
impl Backend for LocalBackend {
  async fn get_visible_lines_chunk(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<String>> {
    self.with_document(id, |doc| {
      let (start, end) = doc.line_range(id, start_line, end_line)?;
      Ok(chunk(doc, start, end))
    })
  }

  async fn get_syntax_token_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<Vec<Vec<SyntaxToken>>> {
    self.with_document(id, |doc| {
      let (start, end) = doc.line_range(id, start_line, end_line)?;
      Ok(
        chunk(doc, start, end)
          .iter()
          .map(|line| tokenize_line(trim_line_ending(line)))
          .collect(),
      )
    })
  }

  async fn get_visible_lines(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
  ) -> Result<String> {
    self.with_document(id, |doc| {
      let (start, end) = doc.line_range(id, start_line, end_line)?;
      let start_char = doc.text.line_to_char(start);
      let end_char = doc.text.line_to_char(end);
      Ok(doc.text.slice(start_char..end_char).to_string())
    })
  }

  async fn replace_line_range(
    &self,
    id: &TabId,
    start_line: usize,
    end_line: usize,
    new_text: &str,
  ) -> Result<usize> {
    self.with_document_mut(id, |doc| {
      let (start, end) = doc.line_range(id, start_line, end_line)?;
      let start_char = doc.text.line_to_char(start);
      let end_char = doc.text.line_to_char(end);

      // the removed lines took their terminator with them when something
      // follows the range
      let mut replacement = new_text.to_string();
      if end < doc.text.len_lines() && end > start {
        replacement.push('\n');
      }

      let mut text = doc.text.clone();
      text.remove(start_char..end_char);
      text.insert(start_char, &replacement);
      let line_count = doc.commit(text);
      log::debug!("replaced lines {start}..{end} of {id}, now {line_count} lines");
      Ok(line_count)
    })
  }

  async fn edit_text(
    &self,
    id: &TabId,
    start_char: usize,
    end_char: usize,
    new_text: &str,
  ) -> Result<usize> {
    self.with_document_mut(id, |doc| {
      let len = doc.text.len_chars();
      if start_char > end_char || end_char > len {
        return Err(BackendError::InvalidRange {
          id: id.clone(),
          start: start_char,
          end: end_char,
          len,
        });
      }
      let mut text = doc.text.clone();
      text.remove(start_char..end_char);
      text.insert(start_char, new_text);
      Ok(doc.commit(text))
    })
  }

  async fn compare_documents_by_line(
    &self,
    source_id: &TabId,
    target_id: &TabId,
  ) -> Result<LineDiffComparisonResult> {
    let documents = self.documents.read();
    let source = documents
      .get(source_id)
      .ok_or_else(|| BackendError::UnknownDocument(source_id.clone()))?;
    let target = documents
      .get(target_id)
      .ok_or_else(|| BackendError::UnknownDocument(target_id.clone()))?;
    Ok(compare_documents(&source.text, &target.text))
  }

  async fn apply_aligned_diff_edit(
    &self,
    request: ApplyAlignedDiffEditRequest,
  ) -> Result<ApplyAlignedDiffEditResult> {
    let edited_id = match request.edited_side {
      DiffSide::Source => &request.source_id,
      DiffSide::Target => &request.target_id,
    };
    let text = request
      .rows
      .side_text(request.edited_side, request.edited_trailing_newline);

    let mut documents = self.documents.write();
    for id in [&request.source_id, &request.target_id] {
      if !documents.contains_key(id) {
        return Err(BackendError::UnknownDocument(id.clone()));
      }
    }
    if let Some(doc) = documents.get_mut(edited_id)
      && doc.text != text.as_str()
    {
      doc.commit(Rope::from_str(&text));
    }

    let (Some(source), Some(target)) = (
      documents.get(&request.source_id),
      documents.get(&request.target_id),
    ) else {
      return Err(BackendError::UnknownDocument(edited_id.clone()));
    };
    Ok(ApplyAlignedDiffEditResult {
      line_diff:       compare_documents(&source.text, &target.text),
      source_is_dirty: source.dirty,
      target_is_dirty: target.dirty,
    })
  }

  async fn preview_aligned_diff_state(
    &self,
    rows: AlignedRows,
  ) -> Result<LineDiffComparisonResult> {
    Ok(classify_rows(&rows))
  }

  async fn undo(&self, id: &TabId) -> Result<usize> {
    self.with_document_mut(id, |doc| {
      let previous = doc.undo.pop().ok_or_else(|| BackendError::HistoryExhausted {
        id:     id.clone(),
        action: "undo",
      })?;
      let current = std::mem::replace(&mut doc.text, previous);
      doc.redo.push(current);
      doc.dirty = true;
      Ok(doc.text.len_lines())
    })
  }

  async fn redo(&self, id: &TabId) -> Result<usize> {
    self.with_document_mut(id, |doc| {
      let next = doc.redo.pop().ok_or_else(|| BackendError::HistoryExhausted {
        id:     id.clone(),
        action: "redo",
      })?;
      let current = std::mem::replace(&mut doc.text, next);
      doc.undo.push(current);
      doc.dirty = true;
      Ok(doc.text.len_lines())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::protocol::DiffKind;

  fn backend_with(id: &str, text: &str) -> (LocalBackend, TabId) {
    let backend = LocalBackend::new();
    let id = TabId::new(id);
    backend.open(id.clone(), text);
    (backend, id)
  }

  #[test]
  fn tokenizer_splits_by_class() {
    let tokens = tokenize_line("let x_1 = a.b;");
    let kinds: Vec<_> = tokens
      .iter()
      .map(|token| (token.text.as_str(), token.kind.as_str()))
      .collect();
    assert_eq!(kinds, vec![
      ("let", "word"),
      (" ", "whitespace"),
      ("x_1", "word"),
      (" ", "whitespace"),
      ("=", "punctuation"),
      (" ", "whitespace"),
      ("a", "word"),
      (".", "punctuation"),
      ("b", "word"),
      (";", "punctuation"),
    ]);
    assert!(tokenize_line("").is_empty());
  }

  #[tokio::test]
  async fn chunks_keep_terminators_and_clamp() {
    let (backend, id) = backend_with("a", "one\ntwo\nthree");
    let lines = backend.get_visible_lines_chunk(&id, 1, 10).await.unwrap();
    assert_eq!(lines, vec!["two\n", "three"]);
    let text = backend.get_visible_lines(&id, 0, 2).await.unwrap();
    assert_eq!(text, "one\ntwo\n");
    let tokens = backend.get_syntax_token_lines(&id, 0, 1).await.unwrap();
    assert_eq!(tokens, vec![vec![SyntaxToken::new("one", "word")]]);

    assert!(matches!(
      backend.get_visible_lines_chunk(&id, 5, 2).await,
      Err(BackendError::InvalidRange { .. })
    ));
    assert!(matches!(
      backend.get_visible_lines(&TabId::new("missing"), 0, 1).await,
      Err(BackendError::UnknownDocument(_))
    ));
  }

  #[tokio::test]
  async fn edit_text_counts_chars() {
    let (backend, id) = backend_with("a", "héllo\nworld");
    assert_eq!(backend.is_dirty(&id), Some(false));
    let count = backend.edit_text(&id, 2, 2, "X\n").await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(backend.text(&id).unwrap(), "héX\nllo\nworld");
    assert_eq!(backend.is_dirty(&id), Some(true));
    assert!(backend.edit_text(&id, 4, 100, "").await.is_err());
  }

  #[tokio::test]
  async fn replace_line_range_keeps_following_lines() {
    let (backend, id) = backend_with("a", "l0\nl1\nl2\nl3\n");
    let count = backend
      .replace_line_range(&id, 1, 3, "new1\nnew2\nnew3")
      .await
      .unwrap();
    assert_eq!(backend.text(&id).unwrap(), "l0\nnew1\nnew2\nnew3\nl3\n");
    assert_eq!(count, 6);

    // replacing through the end leaves no extra terminator
    backend.replace_line_range(&id, 4, 6, "tail").await.unwrap();
    assert_eq!(backend.text(&id).unwrap(), "l0\nnew1\nnew2\nnew3\ntail");
  }

  #[tokio::test]
  async fn undo_redo_walk_history() {
    let (backend, id) = backend_with("a", "one");
    backend.edit_text(&id, 3, 3, " two").await.unwrap();
    backend.edit_text(&id, 7, 7, "\nthree").await.unwrap();

    assert_eq!(backend.undo(&id).await.unwrap(), 1);
    assert_eq!(backend.text(&id).unwrap(), "one two");
    assert_eq!(backend.undo(&id).await.unwrap(), 1);
    assert_eq!(backend.text(&id).unwrap(), "one");
    assert!(matches!(
      backend.undo(&id).await,
      Err(BackendError::HistoryExhausted { action: "undo", .. })
    ));

    assert_eq!(backend.redo(&id).await.unwrap(), 1);
    assert_eq!(backend.text(&id).unwrap(), "one two");

    // a new edit drops the redo branch
    backend.edit_text(&id, 0, 0, ">").await.unwrap();
    assert!(backend.redo(&id).await.is_err());
  }

  #[tokio::test]
  async fn apply_aligned_edit_rewrites_only_the_edited_side() {
    let backend = LocalBackend::new();
    let (source, target) = (TabId::new("s"), TabId::new("t"));
    backend.open(source.clone(), "a\nb\n");
    backend.open(target.clone(), "a\nx\nb\n");

    let compared = backend
      .compare_documents_by_line(&source, &target)
      .await
      .unwrap();
    let mut rows = AlignedRows::from(&compared);
    assert_eq!(rows.aligned_source_present, vec![true, false, true]);

    rows.aligned_source_lines[1] = "x".into();
    rows.aligned_source_present[1] = true;
    let result = backend
      .apply_aligned_diff_edit(ApplyAlignedDiffEditRequest {
        source_id: source.clone(),
        target_id: target.clone(),
        edited_side: DiffSide::Source,
        rows,
        edited_trailing_newline: true,
      })
      .await
      .unwrap();

    assert_eq!(backend.text(&source).unwrap(), "a\nx\nb\n");
    assert_eq!(backend.text(&target).unwrap(), "a\nx\nb\n");
    assert!(result.source_is_dirty);
    assert!(!result.target_is_dirty);
    assert!(result.line_diff.diff_line_numbers.is_empty());
    assert_eq!(result.line_diff.source_line_count, 4);
  }

  #[tokio::test]
  async fn preview_classifies_without_realigning() {
    let backend = LocalBackend::new();
    let rows = AlignedRows {
      aligned_source_lines:   vec!["a".into(), "b".into()],
      aligned_target_lines:   vec!["a".into(), "".into()],
      aligned_source_present: vec![true, true],
      aligned_target_present: vec![true, false],
    };
    let result = backend.preview_aligned_diff_state(rows).await.unwrap();
    assert_eq!(result.aligned_diff_kinds, Some(vec![None, Some(DiffKind::Delete)]));
  }
}
