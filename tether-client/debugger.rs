//! Debug-event handling: remembers the paused thread so continue/backtrace
//! requests can reference it, and renders debug output through the editor.

use tether_protocol::{
  DebugBacktrace,
  DebugBreak,
  DebugOutput,
};
use tracing::warn;

use crate::{
  editor::Editor,
  feedback,
};

#[derive(Debug, Default)]
pub struct DebuggerCoordinator {
  thread_id: Option<String>,
}

impl DebuggerCoordinator {
  pub fn new() -> Self {
    Self::default()
  }

  /// The thread the debuggee last stopped on, if any.
  pub fn thread_id(&self) -> Option<&str> {
    self.thread_id.as_deref()
  }

  pub fn handle_output(&self, editor: &dyn Editor, output: DebugOutput) {
    editor.message(output.body.trim_end());
  }

  pub fn handle_break(&mut self, editor: &dyn Editor, brk: DebugBreak) {
    let location = match (&brk.file, brk.line) {
      (Some(file), Some(line)) => format!("{file}:{line}"),
      (Some(file), None) => file.clone(),
      _ => String::new(),
    };
    if location.is_empty() {
      editor.message(feedback::NOTIFY_BREAK);
    } else {
      editor.message(&format!("{} {}", feedback::NOTIFY_BREAK, location));
    }
    self.thread_id = Some(brk.thread_id);
  }

  pub fn handle_backtrace(&self, editor: &dyn Editor, backtrace: DebugBacktrace) {
    match serde_json::to_string_pretty(&backtrace.frames) {
      Ok(rendered) => {
        let lines: Vec<String> = rendered.lines().map(str::to_string).collect();
        editor.show_scratch("backtrace.json", &lines);
      },
      Err(err) => warn!(error = %err, "could not render backtrace frames"),
    }
  }
}
