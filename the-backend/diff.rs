//! Line level comparison laid out as aligned rows.

use imara_diff::{
  Algorithm,
  Diff,
  IndentHeuristic,
  IndentLevel,
  InternedInput,
};
use ropey::Rope;

use crate::protocol::{
  AlignedRows,
  DiffKind,
  LineDiffComparisonResult,
};

const ALGORITHM: Algorithm = Algorithm::Histogram;
const INDENT_WIDTH: u8 = 4;

/// Strip one trailing line terminator.
pub fn trim_line_ending(line: &str) -> &str {
  if let Some(stripped) = line.strip_suffix("\r\n") {
    return stripped;
  }
  match line.chars().next_back() {
    Some('\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}') => {
      let mut chars = line.chars();
      chars.next_back();
      chars.as_str()
    },
    _ => line,
  }
}

/// Lines of a document without their terminators.
///
/// A document always has at least one line. The empty line that follows a
/// final line terminator is not reported, which is why
/// `text.len_lines() > document_lines(text).len()` exactly when the document
/// ends with a line terminator.
pub fn document_lines(text: &Rope) -> Vec<String> {
  let mut lines: Vec<String> = text
    .lines()
    .map(|line| trim_line_ending(&line.to_string()).to_string())
    .collect();
  if lines.len() > 1 && lines.last().is_some_and(String::is_empty) {
    lines.pop();
  }
  if lines.is_empty() {
    lines.push(String::new());
  }
  lines
}

#[derive(Default)]
struct AlignedBuilder {
  result: LineDiffComparisonResult,
  kinds:  Vec<Option<DiffKind>>,
}

impl AlignedBuilder {
  /// Push one row. Each side is its 0-based document line (`None` for a
  /// filler) and the row text.
  fn row(&mut self, source: (Option<usize>, &str), target: (Option<usize>, &str), kind: Option<DiffKind>) {
    let row = self.kinds.len();
    let result = &mut self.result;

    result.aligned_source_lines.push(source.1.to_string());
    result.aligned_source_present.push(source.0.is_some());
    result.aligned_target_lines.push(target.1.to_string());
    result.aligned_target_present.push(target.0.is_some());

    if kind.is_some() {
      result.diff_line_numbers.push(row + 1);
      if let Some(line) = source.0 {
        result.source_diff_line_numbers.push(line + 1);
      }
      if let Some(line) = target.0 {
        result.target_diff_line_numbers.push(line + 1);
      }
    }
    self.kinds.push(kind);
  }

  fn finish(mut self, source_line_count: usize, target_line_count: usize) -> LineDiffComparisonResult {
    self.result.aligned_line_count = self.kinds.len();
    self.result.aligned_diff_kinds = Some(self.kinds);
    self.result.source_line_count = source_line_count;
    self.result.target_line_count = target_line_count;
    self.result
  }
}

/// Align `source` against `target`.
///
/// Unchanged lines share a row. Inside a changed hunk, lines are paired up as
/// modifications; the surplus of the longer side gets filler rows on the
/// other side.
pub fn compare_lines(
  source: &[String],
  target: &[String],
  source_line_count: usize,
  target_line_count: usize,
) -> LineDiffComparisonResult {
  let mut input = InternedInput::default();
  input.update_before(source.iter().map(String::as_str));
  input.update_after(target.iter().map(String::as_str));

  let mut diff = Diff::compute(ALGORITHM, &input);
  diff.postprocess_with_heuristic(
    &input,
    IndentHeuristic::new(|token| {
      IndentLevel::for_ascii_line(input.interner[token].bytes(), INDENT_WIDTH)
    }),
  );

  let mut builder = AlignedBuilder::default();
  let mut before_pos = 0usize;
  let mut after_pos = 0usize;

  for hunk in diff.hunks() {
    let before = hunk.before.start as usize..hunk.before.end as usize;
    let after = hunk.after.start as usize..hunk.after.end as usize;

    while before_pos < before.start && after_pos < after.start {
      builder.row(
        (Some(before_pos), &source[before_pos]),
        (Some(after_pos), &target[after_pos]),
        None,
      );
      before_pos += 1;
      after_pos += 1;
    }

    let paired = before.len().min(after.len());
    for offset in 0..paired {
      let (b, a) = (before.start + offset, after.start + offset);
      builder.row((Some(b), &source[b]), (Some(a), &target[a]), Some(DiffKind::Modify));
    }
    for b in before.start + paired..before.end {
      builder.row((Some(b), &source[b]), (None, ""), Some(DiffKind::Delete));
    }
    for a in after.start + paired..after.end {
      builder.row((None, ""), (Some(a), &target[a]), Some(DiffKind::Insert));
    }

    before_pos = before.end;
    after_pos = after.end;
  }

  while before_pos < source.len() && after_pos < target.len() {
    builder.row(
      (Some(before_pos), &source[before_pos]),
      (Some(after_pos), &target[after_pos]),
      None,
    );
    before_pos += 1;
    after_pos += 1;
  }

  builder.finish(source_line_count, target_line_count)
}

/// Compare two documents.
pub fn compare_documents(source: &Rope, target: &Rope) -> LineDiffComparisonResult {
  compare_lines(
    &document_lines(source),
    &document_lines(target),
    source.len_lines(),
    target.len_lines(),
  )
}

/// Classify rows that are already aligned, without moving any of them.
///
/// Line counts are reported as the number of present rows per side.
pub fn classify_rows(rows: &AlignedRows) -> LineDiffComparisonResult {
  let mut builder = AlignedBuilder::default();
  let mut source_line = 0usize;
  let mut target_line = 0usize;

  for row in 0..rows.len() {
    let source_present = rows.aligned_source_present.get(row).copied().unwrap_or(false);
    let target_present = rows.aligned_target_present.get(row).copied().unwrap_or(false);
    let source_text = rows.aligned_source_lines.get(row).map_or("", String::as_str);
    let target_text = rows.aligned_target_lines.get(row).map_or("", String::as_str);

    let kind = match (source_present, target_present) {
      (true, true) if source_text == target_text => None,
      (true, true) => Some(DiffKind::Modify),
      (true, false) => Some(DiffKind::Delete),
      (false, true) => Some(DiffKind::Insert),
      (false, false) => None,
    };

    builder.row(
      (source_present.then_some(source_line), source_text),
      (target_present.then_some(target_line), target_text),
      kind,
    );

    source_line += usize::from(source_present);
    target_line += usize::from(target_present);
  }

  builder.finish(source_line, target_line)
}

#[cfg(test)]
mod test;
