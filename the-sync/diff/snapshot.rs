use the_editor_backend::protocol::DiffSide;

use super::AlignedDiffModel;
use crate::{
  surface::{
    PanelFocus,
    PanelScrollSnapshot,
  },
  text::{
    code_unit_len,
    line_at_code_unit,
  },
};

/// Where the caret of the focused panel was before a reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretSnapshot {
  pub side:            DiffSide,
  pub row_index:       usize,
  /// Line of `side` on that row, `None` on a filler.
  pub line_number:     Option<usize>,
  /// Selection in code units from the start of the row.
  pub selection_start: usize,
  pub selection_end:   usize,
}

/// Code unit offset where `row` starts in a panel showing `lines`.
pub(crate) fn row_start(lines: &[String], row: usize) -> usize {
  lines.iter().take(row).map(|line| code_unit_len(line) + 1).sum()
}

fn text_row_start(text: &str, row: usize) -> usize {
  text
    .split('\n')
    .take(row)
    .map(|line| code_unit_len(line) + 1)
    .sum()
}

impl CaretSnapshot {
  /// Snapshot `focus` in `panel_text`, the text the panel shows right now.
  pub fn capture(model: &AlignedDiffModel, focus: PanelFocus, panel_text: &str) -> Self {
    let row_index = line_at_code_unit(panel_text, focus.selection_start);
    let start = text_row_start(panel_text, row_index);
    Self {
      side: focus.side,
      row_index,
      line_number: model.line_for_row(focus.side, row_index),
      selection_start: focus.selection_start.saturating_sub(start),
      selection_end: focus.selection_end.saturating_sub(start),
    }
  }

  /// Selection in the panel of the reflowed `model`: on the row that now
  /// holds the same line, else on the old row, clamped to the rows.
  pub fn resolve(&self, model: &AlignedDiffModel) -> (usize, usize) {
    let lines = model.lines(self.side);
    let row = self
      .line_number
      .and_then(|line| model.row_for_line(self.side, line))
      .unwrap_or(self.row_index)
      .min(lines.len().saturating_sub(1));

    let start = row_start(lines, row);
    let row_len = lines.get(row).map_or(0, |line| code_unit_len(line));
    let total = row_start(lines, lines.len()).saturating_sub(1);
    let caret = start + self.selection_start.min(row_len);
    let end = (start + self.selection_end).min(total).max(caret);
    (caret, end)
  }
}

/// Snapshots taken before a result was applied, restored once after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingRestore {
  pub(crate) serial: u64,
  pub(crate) scroll: PanelScrollSnapshot,
  pub(crate) caret:  Option<CaretSnapshot>,
}

#[cfg(test)]
mod tests {
  use the_editor_backend::protocol::LineDiffComparisonResult;

  use super::*;

  fn model(source: &[&str], target: &[&str]) -> AlignedDiffModel {
    let lines = |rows: &[&str]| rows.iter().map(|row| row.to_string()).collect::<Vec<_>>();
    let present = |rows: &[&str]| rows.iter().map(|row| !row.is_empty()).collect::<Vec<_>>();
    AlignedDiffModel::new(LineDiffComparisonResult {
      aligned_source_lines: lines(source),
      aligned_target_lines: lines(target),
      aligned_source_present: present(source),
      aligned_target_present: present(target),
      ..Default::default()
    })
  }

  #[test]
  fn caret_follows_its_line_to_a_new_row() {
    let before = model(&["a", "bb", "cc"], &["a", "bb", "cc"]);
    let focus = PanelFocus {
      side:            DiffSide::Source,
      selection_start: 6,
      selection_end:   6,
    };
    let caret = CaretSnapshot::capture(&before, focus, &before.panel_text(DiffSide::Source));
    assert_eq!(caret.row_index, 2);
    assert_eq!(caret.line_number, Some(3));
    assert_eq!(caret.selection_start, 1);

    // a filler row was inserted above
    let after = model(&["a", "", "bb", "cc"], &["a", "x", "bb", "cc"]);
    assert_eq!(caret.resolve(&after), (7, 7));
  }

  #[test]
  fn caret_falls_back_to_old_row_and_clamps() {
    let before = model(&["a", "b", "c", "dddd"], &["a", "b", "c", "dddd"]);
    let caret = CaretSnapshot {
      side:            DiffSide::Target,
      row_index:       3,
      line_number:     Some(9),
      selection_start: 3,
      selection_end:   40,
    };
    assert_eq!(caret.resolve(&before), (9, 10));

    let shorter = model(&["a", "b"], &["a", "b"]);
    assert_eq!(caret.resolve(&shorter), (3, 3));
  }
}
