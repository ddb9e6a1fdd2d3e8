use the_editor_backend::protocol::{
  AlignedRows,
  DiffKind,
  DiffSide,
  LineDiffComparisonResult,
};

/// The text of one side as the backend last persisted it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommittedText {
  pub text:             String,
  pub trailing_newline: bool,
}

/// Make every aligned array `aligned_line_count` long.
///
/// The longer line array is authoritative. Missing lines become empty
/// fillers; a missing present flag is `true` exactly when the row had a line
/// in the raw result.
pub fn normalize(mut result: LineDiffComparisonResult) -> LineDiffComparisonResult {
  let source_len = result.aligned_source_lines.len();
  let target_len = result.aligned_target_lines.len();
  let len = source_len.max(target_len);

  fill_present(&mut result.aligned_source_present, source_len, len);
  fill_present(&mut result.aligned_target_present, target_len, len);
  result.aligned_source_lines.resize(len, String::new());
  result.aligned_target_lines.resize(len, String::new());

  let mut kinds = result.aligned_diff_kinds.take().unwrap_or_default();
  kinds.resize(len, None);
  result.aligned_diff_kinds = Some(kinds);
  result.aligned_line_count = len;
  result
}

fn fill_present(present: &mut Vec<bool>, had_lines: usize, len: usize) {
  present.truncate(len);
  while present.len() < len {
    present.push(present.len() < had_lines);
  }
}

/// The two column row model behind a diff view.
///
/// Every operation keeps the four aligned arrays and the kinds the same
/// length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedDiffModel {
  result:   LineDiffComparisonResult,
  trailing: [bool; 2],
}

impl Default for AlignedDiffModel {
  fn default() -> Self {
    Self::new(LineDiffComparisonResult::default())
  }
}

fn index(side: DiffSide) -> usize {
  match side {
    DiffSide::Source => 0,
    DiffSide::Target => 1,
  }
}

impl AlignedDiffModel {
  pub fn new(result: LineDiffComparisonResult) -> Self {
    let result = normalize(result);
    let mut model = Self {
      result,
      trailing: [false; 2],
    };
    for side in DiffSide::BOTH {
      // a line count beyond the present rows is the empty line after a
      // final terminator
      model.trailing[index(side)] = model.side_line_count(side) > model.present_count(side);
    }
    model
  }

  pub fn result(&self) -> &LineDiffComparisonResult {
    &self.result
  }

  pub fn len(&self) -> usize {
    self.result.aligned_line_count
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn lines(&self, side: DiffSide) -> &[String] {
    match side {
      DiffSide::Source => &self.result.aligned_source_lines,
      DiffSide::Target => &self.result.aligned_target_lines,
    }
  }

  pub fn present(&self, side: DiffSide) -> &[bool] {
    match side {
      DiffSide::Source => &self.result.aligned_source_present,
      DiffSide::Target => &self.result.aligned_target_present,
    }
  }

  pub fn kinds(&self) -> &[Option<DiffKind>] {
    self.result.aligned_diff_kinds.as_deref().unwrap_or_default()
  }

  pub fn trailing_newline(&self, side: DiffSide) -> bool {
    self.trailing[index(side)]
  }

  pub fn rows(&self) -> AlignedRows {
    AlignedRows::from(&self.result)
  }

  fn side_line_count(&self, side: DiffSide) -> usize {
    match side {
      DiffSide::Source => self.result.source_line_count,
      DiffSide::Target => self.result.target_line_count,
    }
  }

  fn present_count(&self, side: DiffSide) -> usize {
    self.present(side).iter().filter(|present| **present).count()
  }

  /// Present rows of `side` serialized with its trailing newline convention.
  pub fn committed_text(&self, side: DiffSide) -> CommittedText {
    let trailing_newline = self.trailing_newline(side);
    CommittedText {
      text: self.rows().side_text(side, trailing_newline),
      trailing_newline,
    }
  }

  /// What the panel of `side` shows: one line per row, fillers empty.
  pub fn panel_text(&self, side: DiffSide) -> String {
    self.lines(side).join("\n")
  }

  /// Row holding the 1-based `line_number` of `side`.
  pub fn row_for_line(&self, side: DiffSide, line_number: usize) -> Option<usize> {
    if line_number == 0 {
      return None;
    }
    self
      .present(side)
      .iter()
      .enumerate()
      .filter(|(_, present)| **present)
      .nth(line_number - 1)
      .map(|(row, _)| row)
  }

  /// 1-based line number of `side` shown on `row`, `None` for fillers.
  pub fn line_for_row(&self, side: DiffSide, row: usize) -> Option<usize> {
    let present = self.present(side);
    if !present.get(row).copied().unwrap_or(false) {
      return None;
    }
    Some(present[..=row].iter().filter(|present| **present).count())
  }

  /// Take diff kinds and line number lists from a preview of these rows.
  /// Rejected when the row count changed since the preview was requested.
  pub fn apply_preview(&mut self, preview: &LineDiffComparisonResult) -> bool {
    let Some(kinds) = preview.aligned_diff_kinds.as_ref() else {
      return false;
    };
    if kinds.len() != self.len() {
      return false;
    }
    self.result.aligned_diff_kinds = Some(kinds.clone());
    self.result.diff_line_numbers = preview.diff_line_numbers.clone();
    self.result.source_diff_line_numbers = preview.source_diff_line_numbers.clone();
    self.result.target_diff_line_numbers = preview.target_diff_line_numbers.clone();
    true
  }

  /// Rewrite `side` from what its panel now shows. Returns whether any row
  /// changed.
  ///
  /// The edited block is found by trimming the common leading and trailing
  /// lines. Its rows are overwritten pairwise; extra lines become new rows
  /// with a filler on the other side; removed lines turn into fillers, or
  /// disappear when the other side is a filler too.
  pub fn update_side(&mut self, side: DiffSide, panel_text: &str) -> bool {
    let new_lines: Vec<&str> = panel_text.split('\n').collect();
    let old_lines = self.lines(side);
    if old_lines.len() == new_lines.len()
      && old_lines.iter().zip(&new_lines).all(|(old, new)| old == new)
    {
      return false;
    }

    let prefix = old_lines
      .iter()
      .zip(&new_lines)
      .take_while(|(old, new)| old.as_str() == **new)
      .count();
    let suffix = old_lines
      .iter()
      .rev()
      .zip(new_lines.iter().rev())
      .take(old_lines.len().min(new_lines.len()) - prefix)
      .take_while(|(old, new)| old.as_str() == **new)
      .count();
    let old_end = old_lines.len() - suffix;
    let new_end = new_lines.len() - suffix;
    let common = (old_end - prefix).min(new_end - prefix);

    for row in prefix..prefix + common {
      self.overwrite(side, row, new_lines[row]);
    }
    let at = prefix + common;
    for (offset, line) in new_lines[at..new_end].iter().enumerate() {
      self.insert_row(side, at + offset, line);
    }
    for row in (at..old_end).rev() {
      self.clear_row(side, row);
    }

    let count = self.present_count(side) + usize::from(self.trailing_newline(side));
    match side {
      DiffSide::Source => self.result.source_line_count = count,
      DiffSide::Target => self.result.target_line_count = count,
    }
    self.result.aligned_line_count = self.result.aligned_source_lines.len();
    true
  }

  fn side_mut(&mut self, side: DiffSide) -> (&mut Vec<String>, &mut Vec<bool>) {
    match side {
      DiffSide::Source => (
        &mut self.result.aligned_source_lines,
        &mut self.result.aligned_source_present,
      ),
      DiffSide::Target => (
        &mut self.result.aligned_target_lines,
        &mut self.result.aligned_target_present,
      ),
    }
  }

  fn kinds_mut(&mut self) -> &mut Vec<Option<DiffKind>> {
    self.result.aligned_diff_kinds.get_or_insert_with(Vec::new)
  }

  fn overwrite(&mut self, side: DiffSide, row: usize, line: &str) {
    let (lines, present) = self.side_mut(side);
    lines[row] = line.to_string();
    present[row] = true;
    self.kinds_mut()[row] = None;
  }

  fn insert_row(&mut self, side: DiffSide, row: usize, line: &str) {
    let (lines, present) = self.side_mut(side);
    lines.insert(row, line.to_string());
    present.insert(row, true);
    let (lines, present) = self.side_mut(side.other());
    lines.insert(row, String::new());
    present.insert(row, false);
    self.kinds_mut().insert(row, None);
  }

  fn clear_row(&mut self, side: DiffSide, row: usize) {
    if self.present(side.other())[row] {
      let (lines, present) = self.side_mut(side);
      lines[row].clear();
      present[row] = false;
      self.kinds_mut()[row] = None;
      return;
    }
    for side in DiffSide::BOTH {
      let (lines, present) = self.side_mut(side);
      lines.remove(row);
      present.remove(row);
    }
    self.kinds_mut().remove(row);
  }
}
