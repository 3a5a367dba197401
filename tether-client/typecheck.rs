//! Buffers typecheck note events between the start of a typecheck and the
//! server's completion event, so the user sees one coherent batch instead of
//! a trickle of partial results.

use tether_protocol::Note;

use crate::editor::Editor;

#[derive(Debug, Default)]
pub struct TypecheckCoordinator {
  buffering: bool,
  notes:     Vec<Note>,
}

impl TypecheckCoordinator {
  pub fn new() -> Self {
    Self::default()
  }

  /// A typecheck was just requested; drop stale notes and start buffering.
  pub fn start(&mut self) {
    self.buffering = true;
    self.notes.clear();
  }

  pub fn is_buffering(&self) -> bool {
    self.buffering
  }

  pub fn pending_notes(&self) -> usize {
    self.notes.len()
  }

  /// Note events arriving mid-typecheck are buffered; unsolicited ones are
  /// published immediately.
  pub fn handle_new_notes(&mut self, editor: &dyn Editor, notes: Vec<Note>) {
    if self.buffering {
      self.notes.extend(notes);
    } else {
      editor.publish_notes(&notes);
    }
  }

  pub fn handle_clear_all(&mut self, editor: &dyn Editor) {
    self.notes.clear();
    editor.clear_notes();
  }

  /// The server finished the full typecheck; publish the batch.
  pub fn handle_complete(&mut self, editor: &dyn Editor) {
    if !self.buffering {
      return;
    }
    self.buffering = false;
    editor.publish_notes(&self.notes);
    self.notes.clear();
  }
}
