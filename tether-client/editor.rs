//! The editor collaborator surface the engine drives. The host editor
//! implements this; the engine never talks to buffers or windows directly.
//!
//! Methods take `&self` and may be called from the receive-loop thread (user
//! warnings on transport faults), so implementations manage their own
//! interior mutability.

use std::path::{
  Path,
  PathBuf,
};

use tether_protocol::Note;

/// Where to open a file when navigating to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenTarget {
  #[default]
  CurrentWindow,
  Split,
  VerticalSplit,
}

/// Rows are 1-based, columns 0-based, matching the host editor's cursor
/// coordinates.
pub trait Editor: Send + Sync {
  /// Path of the file in the active buffer.
  fn path(&self) -> PathBuf;

  fn cursor(&self) -> (usize, usize);

  fn set_cursor(&self, row: usize, col: usize);

  /// All lines of the active buffer.
  fn lines(&self) -> Vec<String>;

  /// The line under the cursor.
  fn current_line(&self) -> String;

  /// Full contents of the active buffer, including unsaved edits.
  fn file_contents(&self) -> String;

  /// Start and end coordinates of the word under the cursor.
  fn word_under_cursor_range(&self) -> ((usize, usize), (usize, usize));

  /// Start and end coordinates of the visual selection.
  fn selection_range(&self) -> ((usize, usize), (usize, usize));

  fn current_word(&self) -> String;

  /// Write the active buffer to disk without triggering save hooks.
  fn write_buffer(&self);

  /// Prompt the user for a line of input; `None` when dismissed.
  fn ask_input(&self, prompt: &str) -> Option<String>;

  /// Status-line feedback.
  fn message(&self, text: &str);

  /// A user-visible warning. May be called from the receive-loop thread.
  fn warn(&self, text: &str);

  fn open_file(&self, path: &Path, target: OpenTarget);

  /// Hand a URL to the host environment (documentation browsing).
  fn open_external(&self, url: &str);

  /// Re-read the active buffer from disk and redraw.
  fn reload_buffer(&self);

  /// Show read-only content in a scratch buffer.
  fn show_scratch(&self, title: &str, lines: &[String]);

  /// Publish analysis notes (errors/warnings) for display.
  fn publish_notes(&self, notes: &[Note]);

  /// Drop all published notes.
  fn clear_notes(&self);

  /// Give the editor a chance to display queued errors for `path`; called on
  /// the steady tick before draining.
  fn display_deferred_errors(&self, path: &Path);
}
