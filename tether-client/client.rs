//! The client engine: one composed type owning the transport session, the
//! protocol variant strategy, and the typecheck/debugger coordinators.
//! Inbound payloads decode into a closed variant set and dispatch through a
//! single exhaustive match.

use std::{
  path::PathBuf,
  sync::Arc,
  thread,
  time::{
    Duration,
    Instant,
  },
};

use serde_json::Value;
use tether_protocol::{
  CompletionInfo,
  ProtocolVariant,
  RangePositions,
  ServerMessage,
  SourcePosition,
  StringResponse,
  SymbolInfo,
};
use tracing::{
  debug,
  warn,
};

use crate::{
  config::ProjectConfig,
  debugger::DebuggerCoordinator,
  editor::{
    Editor,
    OpenTarget,
  },
  feedback,
  position,
  refactor::{
    RefactorState,
    RefactorWorkflow,
  },
  session::{
    ServerHandle,
    Session,
  },
  transport::Connector,
  typecheck::TypecheckCoordinator,
};

/// How long request/response style operations wait for their reply.
pub(crate) const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Steady-tick drain bound.
pub(crate) const TICK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between checks while waiting for a first message. Low to keep
/// wait-for-result operations responsive.
const WAIT_POLL: Duration = Duration::from_millis(250);

pub struct Client {
  pub(crate) session:            Session,
  pub(crate) editor:             Arc<dyn Editor>,
  pub(crate) variant:            Arc<dyn ProtocolVariant>,
  pub(crate) config:             ProjectConfig,
  pub(crate) typecheck:          TypecheckCoordinator,
  pub(crate) debugger:           DebuggerCoordinator,
  pub(crate) refactors:          RefactorWorkflow,
  pub(crate) suggestions:        Option<Vec<CompletionInfo>>,
  pub(crate) completion_started: bool,
  pub(crate) full_types_enabled: bool,
  pub(crate) server_version:     Option<String>,
}

impl Client {
  pub fn new(
    editor: Arc<dyn Editor>,
    config: ProjectConfig,
    variant: Arc<dyn ProtocolVariant>,
    connector: Box<dyn Connector>,
  ) -> Self {
    config.ensure_cache_dir();
    let session = Session::new(
      config.name(),
      Arc::clone(&editor),
      connector,
      Arc::clone(&variant),
    );
    Self {
      session,
      editor,
      variant,
      config,
      typecheck: TypecheckCoordinator::new(),
      debugger: DebuggerCoordinator::new(),
      refactors: RefactorWorkflow::new(),
      suggestions: None,
      completion_started: false,
      full_types_enabled: false,
      server_version: None,
    }
  }

  pub fn connect(&mut self, server: &Arc<dyn ServerHandle>) {
    self.session.connect(server, false);
  }

  pub fn disconnect(&mut self) {
    self.session.disconnect();
  }

  /// Tear down the client and clean up. Cleanup faults are ignored.
  pub fn teardown(&mut self) {
    self.session.teardown();
    self.refactors.teardown();
  }

  pub fn is_connected(&self) -> bool {
    self.session.is_connected()
  }

  pub fn is_running(&self) -> bool {
    self.session.is_running()
  }

  pub fn set_retry_budget(&mut self, budget: u32) {
    self.session.set_retry_budget(budget);
  }

  pub fn server_version(&self) -> Option<&str> {
    self.server_version.as_deref()
  }

  pub fn config(&self) -> &ProjectConfig {
    &self.config
  }

  /// Substitute the external diff tool used to apply refactorings.
  pub fn set_patch_program(&mut self, program: impl Into<String>) {
    self.refactors.set_patch_program(program);
  }

  pub fn refactor_state(&self, refactor_id: u64) -> Option<RefactorState> {
    self.refactors.state(refactor_id)
  }

  /// Send a bare request through the correlating send path, returning its
  /// call id.
  pub fn send_request(&mut self, request: &Value) -> u64 {
    self.session.send_request(request)
  }

  /// Dispatch queued inbound messages to their handlers.
  ///
  /// The timeout bounds *silence between messages*, not total drain
  /// duration: every non-empty message restarts the window. With
  /// `block_until_non_empty` the drain sleeps until at least one non-empty
  /// message arrives (or the window elapses); otherwise it only flushes
  /// what has already arrived. Timing out is a valid, non-fatal outcome.
  pub fn drain(&mut self, timeout: Duration, block_until_non_empty: bool) {
    let variant = Arc::clone(&self.variant);
    let mut window = Instant::now();
    let mut waiting = block_until_non_empty && self.session.queue_is_empty();

    while (!self.session.queue_is_empty() || waiting) && window.elapsed() < timeout {
      if waiting && self.session.queue_is_empty() {
        thread::sleep(WAIT_POLL);
        continue;
      }
      let Some(raw) = self.session.try_pop() else {
        continue;
      };
      match variant.decode_envelope(&raw) {
        Ok(Some(envelope)) if !envelope.is_empty() => {
          waiting = false;
          // Restart the silence window.
          window = Instant::now();
          if let Some(payload) = envelope.payload {
            self.dispatch(envelope.call_id, &payload);
          }
        },
        Ok(_) => debug!("drain: empty frame skipped"),
        Err(err) => warn!(error = %err, "drain: undecodable frame skipped"),
      }
    }

    if window.elapsed() >= timeout {
      warn!(?timeout, "drain: no reply from server");
    }
  }

  fn dispatch(&mut self, call_id: Option<u64>, payload: &Value) {
    let message = match ServerMessage::decode(payload) {
      Ok(message) => message,
      Err(err) => {
        warn!(error = %err, "dispatch: dropping undecodable payload");
        return;
      },
    };
    debug!(typehint = message.typehint(), ?call_id, "dispatch: in");

    let editor = Arc::clone(&self.editor);
    match message {
      ServerMessage::ConnectionInfo(info) => {
        debug!(version = ?info.version, "connected to analysis server");
        self.server_version = info.version;
      },
      ServerMessage::CompletionInfoList(list) => {
        self.suggestions = Some(list.completions);
      },
      ServerMessage::SymbolInfo(info) => self.handle_symbol_info(call_id, info),
      ServerMessage::TypeInfo(info) => {
        let shown = if self.full_types_enabled {
          info.full_name.unwrap_or(info.name)
        } else {
          info.name
        };
        editor.message(&shown);
      },
      ServerMessage::StringResponse(response) => self.handle_string_response(call_id, response),
      ServerMessage::ImportSuggestions(suggestions) => {
        let names: Vec<String> = suggestions
          .sym_lists
          .into_iter()
          .flatten()
          .map(|import| import.name)
          .collect();
        if names.is_empty() {
          editor.message(feedback::UNKNOWN_SYMBOL);
        } else {
          editor.show_scratch("import-suggestions", &names);
        }
      },
      ServerMessage::PackageInfo(info) => {
        editor.show_scratch("package-info", &[info.full_name]);
      },
      ServerMessage::SymbolSearchResults(results) => {
        let lines: Vec<String> = results
          .syms
          .iter()
          .map(|sym| match &sym.pos {
            Some(pos) => format!("{}  {}", sym.name, pos.file()),
            None => sym.name.clone(),
          })
          .collect();
        if lines.is_empty() {
          editor.message(feedback::UNKNOWN_SYMBOL);
        } else {
          editor.show_scratch("symbol-search", &lines);
        }
      },
      ServerMessage::RangePositions(positions) => self.handle_usages(call_id, positions),
      ServerMessage::RefactorDiff(diff) => self.refactors.apply(editor.as_ref(), &diff),
      ServerMessage::NewNotes(event) => {
        self.typecheck.handle_new_notes(editor.as_ref(), event.notes);
      },
      ServerMessage::ClearAllNotes => self.typecheck.handle_clear_all(editor.as_ref()),
      ServerMessage::FullTypecheckComplete => self.typecheck.handle_complete(editor.as_ref()),
      ServerMessage::IndexerReady => editor.message(feedback::INDEXER_READY),
      ServerMessage::AnalyzerReady => editor.message(feedback::ANALYZER_READY),
      ServerMessage::BackgroundMessage(message) => {
        debug!(code = ?message.code, detail = ?message.detail, "background message from server");
      },
      ServerMessage::DebugOutput(output) => self.debugger.handle_output(editor.as_ref(), output),
      ServerMessage::DebugBreak(brk) => self.debugger.handle_break(editor.as_ref(), brk),
      ServerMessage::DebugBacktrace(backtrace) => {
        self.debugger.handle_backtrace(editor.as_ref(), backtrace);
      },
      ServerMessage::VoidResponse => {},
      ServerMessage::FalseResponse => {
        let notice = call_id
          .and_then(|id| self.session.call_options(id))
          .and_then(|options| options.false_resp_msg);
        if let Some(notice) = notice {
          editor.message(notice);
        }
      },
      ServerMessage::Unknown { typehint } => {
        warn!(%typehint, "dispatch: unhandled response variant");
      },
    }
  }

  fn handle_symbol_info(&mut self, call_id: Option<u64>, info: SymbolInfo) {
    let options = call_id
      .and_then(|id| self.session.call_options(id))
      .unwrap_or_default();
    let Some(pos) = info.decl_pos else {
      self.editor.message(feedback::UNKNOWN_SYMBOL);
      return;
    };
    if options.display {
      self.editor.message(&info.name);
    }
    if !options.open_definition {
      return;
    }

    let editor = Arc::clone(&self.editor);
    let target = if options.split {
      if options.vert {
        OpenTarget::VerticalSplit
      } else {
        OpenTarget::Split
      }
    } else {
      OpenTarget::CurrentWindow
    };
    let file = PathBuf::from(pos.file());
    if file != editor.path() || target != OpenTarget::CurrentWindow {
      editor.open_file(&file, target);
    }
    match pos {
      SourcePosition::Line { line, .. } => editor.set_cursor(line as usize, 0),
      SourcePosition::Offset { offset, .. } => {
        let lines = editor.lines();
        let (row, col) = position::position_at(&lines, offset);
        editor.set_cursor(row, col);
      },
    }
  }

  fn handle_string_response(&mut self, call_id: Option<u64>, response: StringResponse) {
    let options = call_id
      .and_then(|id| self.session.call_options(id))
      .unwrap_or_default();
    if options.browse {
      self.editor.open_external(&response.text);
    } else {
      self
        .editor
        .message(&format!("{} {}", feedback::GO_TO, response.text));
    }
  }

  fn handle_usages(&mut self, call_id: Option<u64>, positions: RangePositions) {
    let options = call_id
      .and_then(|id| self.session.call_options(id))
      .unwrap_or_default();
    if positions.positions.is_empty() {
      let notice = options.false_resp_msg.unwrap_or(feedback::UNKNOWN_SYMBOL);
      self.editor.message(notice);
      return;
    }
    let title = match &options.word_under_cursor {
      Some(word) => format!("usages-of-{word}"),
      None => "usages".to_string(),
    };
    let lines: Vec<String> = positions
      .positions
      .iter()
      .map(|pos| format!("{}:{}", pos.file, pos.offset))
      .collect();
    self.editor.show_scratch(&title, &lines);
  }
}
