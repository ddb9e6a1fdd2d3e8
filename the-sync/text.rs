//! Text helpers shared by the editor and the diff view.
//!
//! The input layer addresses text in UTF-16 code units while the backend
//! counts unicode scalar values, so every offset that crosses that boundary
//! goes through [`code_unit_to_char_offset`] or [`char_to_code_unit_offset`].

use the_editor_backend::diff::trim_line_ending;

/// Strip the line terminator of a fetched line and any stray carriage return
/// left inside it.
pub fn normalize_line(line: &str) -> String {
  let line = trim_line_ending(line);
  if line.contains('\r') {
    line.replace('\r', "")
  } else {
    line.to_string()
  }
}

/// Replace the code units `[start, end)` of the old text with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiff {
  pub start:    usize,
  pub end:      usize,
  pub new_text: String,
}

/// The smallest single span that turns `old` into `new`, or `None` when they
/// are equal. The span never splits a surrogate pair.
pub fn code_unit_diff(old: &str, new: &str) -> Option<TextDiff> {
  if old == new {
    return None;
  }

  let mut prefix_bytes = 0;
  let mut prefix_units = 0;
  for (a, b) in old.chars().zip(new.chars()) {
    if a != b {
      break;
    }
    prefix_bytes += a.len_utf8();
    prefix_units += a.len_utf16();
  }

  let old_rest = &old[prefix_bytes..];
  let new_rest = &new[prefix_bytes..];
  let mut suffix_bytes = 0;
  let mut suffix_units = 0;
  for (a, b) in old_rest.chars().rev().zip(new_rest.chars().rev()) {
    if a != b {
      break;
    }
    suffix_bytes += a.len_utf8();
    suffix_units += a.len_utf16();
  }

  let old_units = old.encode_utf16().count();
  Some(TextDiff {
    start:    prefix_units,
    end:      old_units - suffix_units,
    new_text: new_rest[..new_rest.len() - suffix_bytes].to_string(),
  })
}

/// Number of chars that start before code unit `offset`. An offset inside a
/// surrogate pair rounds up to the end of that char.
pub fn code_unit_to_char_offset(text: &str, offset: usize) -> usize {
  let mut units = 0;
  for (idx, ch) in text.chars().enumerate() {
    if units >= offset {
      return idx;
    }
    units += ch.len_utf16();
  }
  text.chars().count()
}

pub fn char_to_code_unit_offset(text: &str, offset: usize) -> usize {
  text.chars().take(offset).map(char::len_utf16).sum()
}

/// Length of `text` in UTF-16 code units.
pub fn code_unit_len(text: &str) -> usize {
  text.encode_utf16().count()
}

/// Replace the code units `[start, end)` of `text` with `insert`, clamping
/// the selection to the text. Returns the new text and the caret offset after
/// the insertion.
pub fn splice_code_units(text: &str, start: usize, end: usize, insert: &str) -> (String, usize) {
  let units: Vec<u16> = text.encode_utf16().collect();
  let (start, end) = (start.min(units.len()), end.min(units.len()));
  let (start, end) = (start.min(end), start.max(end));

  let mut spliced = String::from_utf16_lossy(&units[..start]);
  spliced.push_str(insert);
  spliced.push_str(&String::from_utf16_lossy(&units[end..]));
  (spliced, start + code_unit_len(insert))
}

/// Index of the line holding code unit `offset`.
pub fn line_at_code_unit(text: &str, offset: usize) -> usize {
  let mut units = 0;
  let mut line = 0;
  for ch in text.chars() {
    if units >= offset {
      break;
    }
    if ch == '\n' {
      line += 1;
    }
    units += ch.len_utf16();
  }
  line
}

/// A caret position that survives a change of input-layer offsets: 0-based
/// document line and a column in chars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalCaret {
  pub line:   usize,
  pub column: usize,
}

impl LogicalCaret {
  /// Resolve a code unit offset into `text`, whose first line is document
  /// line `first_line`.
  pub fn from_code_units(text: &str, offset: usize, first_line: usize) -> Self {
    let mut units = 0;
    let mut line = 0;
    let mut column = 0;
    for ch in text.chars() {
      if units >= offset {
        break;
      }
      if ch == '\n' {
        line += 1;
        column = 0;
      } else {
        column += 1;
      }
      units += ch.len_utf16();
    }
    Self {
      line: first_line + line,
      column,
    }
  }

  /// Code unit offset of this caret in `text` (first line `first_line`),
  /// clamped to the text.
  pub fn to_code_units(self, text: &str, first_line: usize) -> usize {
    let target_line = self.line.saturating_sub(first_line);
    let mut units = 0;
    let mut line = 0;
    let mut column = 0;
    for ch in text.chars() {
      if line == target_line && (column == self.column || ch == '\n') {
        return units;
      }
      if ch == '\n' {
        if line == target_line {
          return units;
        }
        line += 1;
        column = 0;
      } else if line == target_line {
        column += 1;
      }
      units += ch.len_utf16();
    }
    units
  }
}
