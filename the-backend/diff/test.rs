use ropey::Rope;

use crate::{
  diff::{
    classify_rows,
    compare_documents,
    document_lines,
    trim_line_ending,
  },
  protocol::{
    AlignedRows,
    DiffKind,
    DiffSide,
  },
};

fn compare(source: &str, target: &str) -> crate::protocol::LineDiffComparisonResult {
  compare_documents(&Rope::from_str(source), &Rope::from_str(target))
}

#[test]
fn line_endings_are_trimmed_once() {
  assert_eq!(trim_line_ending("foo\r\n"), "foo");
  assert_eq!(trim_line_ending("foo\n"), "foo");
  assert_eq!(trim_line_ending("foo\n\n"), "foo\n");
  assert_eq!(trim_line_ending("foo"), "foo");
  assert_eq!(trim_line_ending(""), "");
}

#[test]
fn document_lines_drop_final_terminator() {
  assert_eq!(document_lines(&Rope::from_str("")), vec![String::new()]);
  assert_eq!(document_lines(&Rope::from_str("a\nb")), vec!["a", "b"]);
  assert_eq!(document_lines(&Rope::from_str("a\nb\n")), vec!["a", "b"]);
  assert_eq!(document_lines(&Rope::from_str("a\n\n")), vec!["a", ""]);
  assert_eq!(document_lines(&Rope::from_str("a\r\nb\r\n")), vec!["a", "b"]);
}

#[test]
fn identical_documents() {
  let result = compare("foo\nbar\n", "foo\nbar\n");
  assert_eq!(result.aligned_line_count, 2);
  assert!(result.diff_line_numbers.is_empty());
  assert_eq!(result.aligned_diff_kinds, Some(vec![None, None]));
  assert_eq!(result.source_line_count, 3);
  assert_eq!(result.target_line_count, 3);
}

#[test]
fn append_line() {
  let result = compare("foo\n", "foo\nbar\n");
  assert_eq!(result.aligned_source_lines, vec!["foo", ""]);
  assert_eq!(result.aligned_source_present, vec![true, false]);
  assert_eq!(result.aligned_target_lines, vec!["foo", "bar"]);
  assert_eq!(result.aligned_target_present, vec![true, true]);
  assert_eq!(result.diff_line_numbers, vec![2]);
  assert!(result.source_diff_line_numbers.is_empty());
  assert_eq!(result.target_diff_line_numbers, vec![2]);
  assert_eq!(result.aligned_diff_kinds, Some(vec![None, Some(DiffKind::Insert)]));
}

#[test]
fn modify() {
  let result = compare("foo\nbar\n", "foo bar\nbar\n");
  assert_eq!(result.aligned_line_count, 2);
  assert_eq!(result.diff_line_numbers, vec![1]);
  assert_eq!(result.source_diff_line_numbers, vec![1]);
  assert_eq!(result.target_diff_line_numbers, vec![1]);
  assert_eq!(result.aligned_diff_kinds, Some(vec![Some(DiffKind::Modify), None]));
}

#[test]
fn delete_line() {
  let result = compare("foo\nfoo bar\nbar\n", "foo\nbar\n");
  assert_eq!(result.aligned_source_present, vec![true, true, true]);
  assert_eq!(result.aligned_target_present, vec![true, false, true]);
  assert_eq!(result.aligned_target_lines[1], "");
  assert_eq!(result.diff_line_numbers, vec![2]);
  assert_eq!(result.source_diff_line_numbers, vec![2]);
  assert!(result.target_diff_line_numbers.is_empty());
  assert_eq!(
    result.aligned_diff_kinds,
    Some(vec![None, Some(DiffKind::Delete), None])
  );
}

#[test]
fn inserted_line_leaves_source_filler() {
  let result = compare("a\nb", "a\nx\nb");
  assert_eq!(result.aligned_line_count, 3);
  assert_eq!(result.aligned_source_present, vec![true, false, true]);
  assert_eq!(result.aligned_target_lines, vec!["a", "x", "b"]);
  assert_eq!(result.source_line_count, 2);
  assert_eq!(result.target_line_count, 3);

  let rows = AlignedRows::from(&result);
  assert_eq!(rows.side_text(DiffSide::Source, false), "a\nb");
  assert_eq!(rows.side_text(DiffSide::Target, false), "a\nx\nb");
}

#[test]
fn uneven_hunk_pairs_then_pads() {
  let result = compare("keep\none\ntwo\nthree\n", "keep\nuno\n");
  assert_eq!(
    result.aligned_diff_kinds,
    Some(vec![
      None,
      Some(DiffKind::Modify),
      Some(DiffKind::Delete),
      Some(DiffKind::Delete),
    ])
  );
  assert_eq!(result.aligned_target_present, vec![true, true, false, false]);
  assert_eq!(result.source_diff_line_numbers, vec![2, 3, 4]);
  assert_eq!(result.target_diff_line_numbers, vec![2]);
}

#[test]
fn classify_keeps_alignment() {
  let rows = AlignedRows {
    aligned_source_lines:   vec!["a".into(), "".into(), "c".into(), "d".into()],
    aligned_target_lines:   vec!["a".into(), "b".into(), "C".into(), "".into()],
    aligned_source_present: vec![true, false, true, true],
    aligned_target_present: vec![true, true, true, false],
  };
  let result = classify_rows(&rows);
  assert_eq!(result.aligned_line_count, 4);
  assert_eq!(AlignedRows::from(&result), rows);
  assert_eq!(
    result.aligned_diff_kinds,
    Some(vec![
      None,
      Some(DiffKind::Insert),
      Some(DiffKind::Modify),
      Some(DiffKind::Delete),
    ])
  );
  assert_eq!(result.diff_line_numbers, vec![2, 3, 4]);
  assert_eq!(result.source_diff_line_numbers, vec![2, 3]);
  assert_eq!(result.target_diff_line_numbers, vec![2, 3]);
  assert_eq!(result.source_line_count, 3);
  assert_eq!(result.target_line_count, 3);
}

quickcheck::quickcheck! {
    fn aligned_rows_reproduce_both_documents(source: Vec<String>, target: Vec<String>) -> bool {
        let source: Vec<String> = source.into_iter().map(|line| line.replace(['\n', '\r'], "")).collect();
        let target: Vec<String> = target.into_iter().map(|line| line.replace(['\n', '\r'], "")).collect();
        let result = crate::diff::compare_lines(&source, &target, source.len(), target.len());
        let rows = AlignedRows::from(&result);
        let side = |side: DiffSide| -> Vec<String> {
            rows.lines(side)
                .iter()
                .zip(rows.present(side))
                .filter(|(_, present)| **present)
                .map(|(line, _)| line.clone())
                .collect()
        };
        let kinds = result.aligned_diff_kinds.unwrap_or_default();
        side(DiffSide::Source) == source
            && side(DiffSide::Target) == target
            && kinds.len() == result.aligned_line_count
            && kinds.iter().filter(|kind| kind.is_some()).count() == result.diff_line_numbers.len()
    }
}
