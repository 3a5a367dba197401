//! Translation between the editor's (row, col) cursor coordinates and the
//! absolute character offsets the analysis server speaks.

/// Absolute character offset of a 1-based row and 0-based column, counting
/// one character per line break.
pub fn char_offset(lines: &[String], row: usize, col: usize) -> u64 {
  let preceding: usize = lines
    .iter()
    .take(row.saturating_sub(1))
    .map(|line| line.chars().count() + 1)
    .sum();
  (preceding + col) as u64
}

/// Inverse of [`char_offset`]: the (row, col) containing an absolute
/// character offset. Offsets past the end of the buffer clamp to the last
/// line's end.
pub fn position_at(lines: &[String], offset: u64) -> (usize, usize) {
  let mut remaining = offset as usize;
  for (index, line) in lines.iter().enumerate() {
    let width = line.chars().count() + 1;
    if remaining < width {
      return (index + 1, remaining);
    }
    remaining -= width;
  }
  match lines.last() {
    Some(line) => (lines.len(), line.chars().count()),
    None => (1, 0),
  }
}
