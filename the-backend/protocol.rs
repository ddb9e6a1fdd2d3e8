//! Payloads exchanged with the backend. Field names serialize in camelCase to
//! match the command-invocation channel.

use std::{
  fmt,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};

/// Identifier of an open document tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TabId(Arc<str>);

impl TabId {
  pub fn new(id: impl AsRef<str>) -> Self {
    Self(Arc::from(id.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TabId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for TabId {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for TabId {
  fn from(value: String) -> Self {
    Self(Arc::from(value))
  }
}

impl From<TabId> for String {
  fn from(value: TabId) -> Self {
    value.0.to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxToken {
  pub text: String,
  #[serde(rename = "type")]
  pub kind: String,
}

impl SyntaxToken {
  pub fn new(text: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: kind.into(),
    }
  }
}

/// One of the two compared documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffSide {
  Source,
  Target,
}

impl DiffSide {
  pub const BOTH: [DiffSide; 2] = [DiffSide::Source, DiffSide::Target];

  pub fn other(self) -> Self {
    match self {
      Self::Source => Self::Target,
      Self::Target => Self::Source,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Source => "source",
      Self::Target => "target",
    }
  }
}

impl fmt::Display for DiffSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
  Insert,
  Delete,
  Modify,
}

/// Two documents laid out row by row.
///
/// Every `aligned_*` array has `aligned_line_count` entries. A row whose
/// `aligned_*_present` flag is `false` is a filler: the line exists only in
/// the other document. Line numbers in the `*diff_line_numbers` lists are
/// 1-based: aligned row numbers for `diff_line_numbers`, per-document line
/// numbers for the side specific lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDiffComparisonResult {
  #[serde(default)]
  pub aligned_source_lines:     Vec<String>,
  #[serde(default)]
  pub aligned_target_lines:     Vec<String>,
  #[serde(default)]
  pub aligned_source_present:   Vec<bool>,
  #[serde(default)]
  pub aligned_target_present:   Vec<bool>,
  #[serde(default)]
  pub diff_line_numbers:        Vec<usize>,
  #[serde(default)]
  pub source_diff_line_numbers: Vec<usize>,
  #[serde(default)]
  pub target_diff_line_numbers: Vec<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aligned_diff_kinds:       Option<Vec<Option<DiffKind>>>,
  #[serde(default)]
  pub source_line_count:        usize,
  #[serde(default)]
  pub target_line_count:        usize,
  #[serde(default)]
  pub aligned_line_count:       usize,
}

/// The four aligned arrays, without any derived metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedRows {
  pub aligned_source_lines:   Vec<String>,
  pub aligned_target_lines:   Vec<String>,
  pub aligned_source_present: Vec<bool>,
  pub aligned_target_present: Vec<bool>,
}

impl AlignedRows {
  pub fn len(&self) -> usize {
    self.aligned_source_lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn lines(&self, side: DiffSide) -> &[String] {
    match side {
      DiffSide::Source => &self.aligned_source_lines,
      DiffSide::Target => &self.aligned_target_lines,
    }
  }

  pub fn present(&self, side: DiffSide) -> &[bool] {
    match side {
      DiffSide::Source => &self.aligned_source_present,
      DiffSide::Target => &self.aligned_target_present,
    }
  }

  /// Text of one side: present rows joined with `\n`.
  pub fn side_text(&self, side: DiffSide, trailing_newline: bool) -> String {
    let mut text = self
      .lines(side)
      .iter()
      .zip(self.present(side))
      .filter(|(_, present)| **present)
      .map(|(line, _)| line.as_str())
      .collect::<Vec<_>>()
      .join("\n");
    if trailing_newline {
      text.push('\n');
    }
    text
  }
}

impl From<&LineDiffComparisonResult> for AlignedRows {
  fn from(result: &LineDiffComparisonResult) -> Self {
    Self {
      aligned_source_lines:   result.aligned_source_lines.clone(),
      aligned_target_lines:   result.aligned_target_lines.clone(),
      aligned_source_present: result.aligned_source_present.clone(),
      aligned_target_present: result.aligned_target_present.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAlignedDiffEditRequest {
  pub source_id:               TabId,
  pub target_id:               TabId,
  pub edited_side:             DiffSide,
  #[serde(flatten)]
  pub rows:                    AlignedRows,
  pub edited_trailing_newline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAlignedDiffEditResult {
  pub line_diff:       LineDiffComparisonResult,
  pub source_is_dirty: bool,
  pub target_is_dirty: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tab_id_is_a_plain_string_on_the_wire() {
    let id = TabId::new("notes.md");
    assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("notes.md"));
    let back: TabId = serde_json::from_str("\"notes.md\"").unwrap();
    assert_eq!(back, id);
  }
}
