//! User-facing operations: everything the host editor binds to commands.
//! Each method issues one request through the correlating send path and, when
//! the handler needs caller context, records call options against the id.

use std::path::Path;

use serde_json::Value;
use tether_protocol::{
  CompletionInfo,
  requests,
};
use tracing::debug;

use crate::{
  client::{
    COMPLETION_TIMEOUT,
    Client,
    TICK_TIMEOUT,
  },
  correlate::CallOptions,
  feedback,
  position,
};

const COMPLETION_MAX_RESULTS: u64 = 100;
const IMPORT_SUGGESTION_MAX_RESULTS: u64 = 10;
const SYMBOL_SEARCH_MAX_RESULTS: u64 = 25;

impl Client {
  fn current_path_string(&self) -> String {
    self.editor.path().to_string_lossy().into_owned()
  }

  fn cursor_offset(&self) -> u64 {
    let (row, col) = self.editor.cursor();
    position::char_offset(&self.editor.lines(), row, col)
  }

  fn range_under_cursor(&self, use_selection: bool) -> (u64, u64) {
    let (beg, end) = if use_selection {
      self.editor.selection_range()
    } else {
      self.editor.word_under_cursor_range()
    };
    let lines = self.editor.lines();
    (
      position::char_offset(&lines, beg.0, beg.1),
      position::char_offset(&lines, end.0, end.1),
    )
  }

  /// Ask the server to perform an operation on the word under the cursor or
  /// the current selection. `range_key` names the request property holding
  /// the range; most requests call it `range`, some call it `point`.
  fn send_at_position(&mut self, what: &str, use_selection: bool, range_key: &str) -> u64 {
    let (beg, end) = self.range_under_cursor(use_selection);
    debug!(use_selection, beg, end, "send_at_position");
    let file = self.current_path_string();
    self.send_request(&requests::at_range(what, &file, beg, end, range_key))
  }

  pub fn type_at_point(&mut self, use_selection: bool) {
    debug!("type_at_point: in");
    self.send_at_position("Type", use_selection, "range");
  }

  pub fn toggle_full_types(&mut self) {
    self.full_types_enabled = !self.full_types_enabled;
    if self.full_types_enabled {
      self.editor.message(feedback::FULL_TYPES_ENABLED_ON);
    } else {
      self.editor.message(feedback::FULL_TYPES_ENABLED_OFF);
    }
  }

  fn symbol_at_point_req(&mut self, open_definition: bool, display: bool, split: bool, vert: bool) {
    let point = self.cursor_offset();
    let file = self.current_path_string();
    let call_id = self.send_request(&requests::symbol_at_point(&file, point + 1));
    self.session.record_call_options(call_id, CallOptions {
      open_definition,
      display,
      split,
      vert,
      ..CallOptions::default()
    });
  }

  pub fn open_declaration(&mut self) {
    debug!("open_declaration: in");
    self.symbol_at_point_req(true, false, false, false);
  }

  pub fn open_declaration_split(&mut self, vertical: bool) {
    debug!("open_declaration_split: in");
    self.symbol_at_point_req(true, false, true, vertical);
  }

  pub fn symbol(&mut self) {
    debug!("symbol: in");
    self.symbol_at_point_req(false, true, false, false);
  }

  pub fn symbol_by_name(&mut self, type_full_name: &str, member_name: Option<&str>) {
    debug!("symbol_by_name: in");
    if type_full_name.is_empty() {
      self.editor.message(feedback::SYMBOL_NAME_REQUIRED);
      return;
    }
    let call_id = self.send_request(&requests::symbol_by_name(type_full_name, member_name));
    self.session.record_call_options(call_id, CallOptions {
      split: true,
      vert: true,
      open_definition: true,
      ..CallOptions::default()
    });
  }

  /// Issue a completion request for the word being typed and report the
  /// column completion candidates should replace from.
  pub fn start_completion(&mut self) -> usize {
    debug!("start_completion: in");
    let (row, col) = self.editor.cursor();
    let line = self.editor.current_line();
    let start = completion_anchor(&line, col);

    let point = position::char_offset(&self.editor.lines(), row, col);
    let file = self.current_path_string();
    let contents = self.editor.file_contents();
    let file_info = requests::file_info(&file, &contents);
    self.send_request(&requests::completions(
      point,
      file_info,
      COMPLETION_MAX_RESULTS,
    ));
    self.completion_started = true;

    start.max(1)
  }

  /// Block until the completion response arrives (bounded by the completion
  /// timeout) and return the candidates. Empty when no request is in flight
  /// or the server stayed silent.
  pub fn completion_results(&mut self) -> Vec<CompletionInfo> {
    if !self.completion_started {
      return Vec::new();
    }
    self.drain(COMPLETION_TIMEOUT, true);
    self.completion_started = false;
    self.suggestions.take().unwrap_or_default()
  }

  /// Clear stale notes and request a typecheck of the current file.
  pub fn typecheck_file(&mut self) {
    debug!("typecheck_file: in");
    self.typecheck.start();
    self.editor.clear_notes();
    let file = self.current_path_string();
    self.send_request(&requests::typecheck_files(&[file.as_str()]));
    self.editor.message(feedback::TYPECHECKING);
  }

  /// The user is leaving the buffer; drop its notes.
  pub fn buffer_leave(&mut self) {
    debug!("buffer_leave: in");
    self.editor.clear_notes();
  }

  pub fn suggest_import(&mut self) {
    debug!("suggest_import: in");
    let point = self.cursor_offset();
    let word = self.editor.current_word();
    let file = self.current_path_string();
    self.send_request(&requests::import_suggestions(
      &file,
      point,
      &[word.as_str()],
      IMPORT_SUGGESTION_MAX_RESULTS,
    ));
  }

  pub fn inspect_type(&mut self) {
    debug!("inspect_type: in");
    let point = self.cursor_offset();
    let file = self.current_path_string();
    self.send_request(&requests::inspect_type_at_point(&file, point));
  }

  /// Request the documentation URI for the symbol under the cursor; with
  /// `browse` the result is handed to the host environment instead of
  /// displayed.
  pub fn doc_uri(&mut self, browse: bool) {
    debug!(browse, "doc_uri: in");
    let call_id = self.send_at_position("DocUri", false, "point");
    if browse {
      self.session.record_call_options(call_id, CallOptions {
        browse: true,
        ..CallOptions::default()
      });
    }
  }

  pub fn usages(&mut self) {
    debug!("usages: in");
    let word = self.editor.current_word();
    let point = self.cursor_offset();
    let file = self.current_path_string();
    let call_id = self.send_request(&requests::uses_of_symbol(&file, point));
    self.session.record_call_options(call_id, CallOptions {
      word_under_cursor: Some(word),
      false_resp_msg: Some(feedback::NOT_A_SYMBOL),
      ..CallOptions::default()
    });
  }

  /// Inspect a package by path, defaulting to the package declared at the
  /// top of the current buffer.
  pub fn inspect_package(&mut self, path: Option<&str>) {
    let target = match path {
      Some(path) => path.to_string(),
      None => {
        self.editor.message(feedback::PACKAGE_INSPECT_CURRENT);
        match leading_package_name(&self.editor.lines()) {
          Some(name) => name,
          None => {
            self.editor.message(feedback::UNKNOWN_SYMBOL);
            return;
          },
        }
      },
    };
    self.send_request(&requests::inspect_package_by_path(&target));
  }

  pub fn symbol_search(&mut self, keywords: &[String]) {
    debug!("symbol_search: in");
    if keywords.is_empty() {
      self.editor.message(feedback::SYMBOL_SEARCH_SYMBOL_REQUIRED);
      return;
    }
    self.send_request(&requests::public_symbol_search(
      keywords,
      SYMBOL_SEARCH_MAX_RESULTS,
    ));
  }

  /// Request a rename of the word under the cursor, prompting for the new
  /// name when none is given.
  pub fn rename(&mut self, new_name: Option<&str>) {
    debug!("rename: in");
    let new_name = match new_name {
      Some(name) => name.to_string(),
      None => match self.editor.ask_input("Rename to:") {
        Some(name) => name,
        None => return,
      },
    };
    self.editor.write_buffer();
    let (beg, end) = self.range_under_cursor(false);
    let file = self.current_path_string();
    let params = requests::rename_descriptor(&new_name, &file, beg, end + 1);
    self.send_refactor_request(&file, params);
  }

  pub fn inline_local(&mut self) {
    debug!("inline_local: in");
    self.editor.write_buffer();
    let (beg, end) = self.range_under_cursor(false);
    let file = self.current_path_string();
    let params = requests::inline_local_descriptor(&file, beg, end + 1);
    self.send_refactor_request(&file, params);
  }

  pub fn organize_imports(&mut self) {
    debug!("organize_imports: in");
    self.editor.write_buffer();
    let file = self.current_path_string();
    let params = requests::organize_imports_descriptor(&file);
    self.send_refactor_request(&file, params);
  }

  pub fn add_import(&mut self, name: Option<&str>) {
    debug!("add_import: in");
    let name = match name {
      Some(name) => name.to_string(),
      None => match self.editor.ask_input("Qualified name to import:") {
        Some(name) => name,
        None => return,
      },
    };
    self.editor.write_buffer();
    let file = self.current_path_string();
    let params = requests::add_import_descriptor(&file, &name);
    self.send_refactor_request(&file, params);
  }

  fn send_refactor_request(&mut self, file: &str, params: Value) {
    let proc_id = self.refactors.begin(Path::new(file));
    self.send_request(&requests::refactor(proc_id, params, false));
  }

  pub fn debug_set_breakpoint(&mut self) {
    debug!("debug_set_breakpoint: in");
    let (row, _) = self.editor.cursor();
    let file = self.current_path_string();
    self.send_request(&requests::debug_set_break(&file, row as u64));
  }

  pub fn debug_clear_breakpoints(&mut self) {
    debug!("debug_clear_breakpoints: in");
    self.send_request(&requests::debug_clear_all_breaks());
  }

  pub fn debug_attach(&mut self, hostname: Option<&str>, port: Option<&str>) {
    debug!("debug_attach: in");
    self.send_request(&requests::debug_attach(
      hostname.unwrap_or("localhost"),
      port.unwrap_or("5005"),
    ));
  }

  pub fn debug_continue(&mut self) {
    debug!("debug_continue: in");
    let Some(thread_id) = self.debugger.thread_id().map(str::to_string) else {
      debug!("debug_continue: no active debug thread");
      return;
    };
    self.send_request(&requests::debug_continue(&thread_id));
  }

  pub fn debug_backtrace(&mut self) {
    debug!("debug_backtrace: in");
    let Some(thread_id) = self.debugger.thread_id().map(str::to_string) else {
      debug!("debug_backtrace: no active debug thread");
      return;
    };
    self.send_request(&requests::debug_backtrace(&thread_id));
  }

  /// Steady tick: surface deferred feedback, then flush already-arrived
  /// messages.
  pub fn tick(&mut self) {
    let path = self.editor.path();
    self.editor.display_deferred_errors(&path);
    self.drain(TICK_TIMEOUT, false);
  }
}

/// Column the current completion word starts at: scan left from the cursor
/// until a separator.
fn completion_anchor(line: &str, col: usize) -> usize {
  let chars: Vec<char> = line.chars().collect();
  let mut start = col.min(chars.len());
  while start > 0 && !" .,([{".contains(chars[start - 1]) {
    start -= 1;
  }
  start
}

/// The package declared at the top of a buffer, if any.
fn leading_package_name(lines: &[String]) -> Option<String> {
  lines.iter().find_map(|line| {
    line
      .trim()
      .strip_prefix("package ")
      .map(|rest| rest.trim_end_matches(';').trim().to_string())
  })
}
