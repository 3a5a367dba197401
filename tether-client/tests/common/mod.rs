//! Test doubles: an in-memory transport scripted from the outside, a server
//! descriptor with a switchable liveness flag, and an editor that records
//! every call the engine makes.

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      AtomicUsize,
      Ordering,
    },
  },
  time::Duration,
};

use crossbeam::channel::{
  Receiver,
  RecvTimeoutError,
  Sender,
  unbounded,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tether_client::{
  Client,
  Connector,
  Editor,
  HandshakeOptions,
  OpenTarget,
  ProjectConfig,
  ServerHandle,
  TransportError,
  TransportReader,
  TransportWriter,
};
use tether_protocol::{
  Note,
  ProtocolVariant,
  VariantV1,
};

#[derive(Default)]
pub struct FakeNet {
  pub attempts:          AtomicUsize,
  pub fail_connects:     AtomicBool,
  pub fail_next_send:    AtomicBool,
  pub sent:              Mutex<Vec<String>>,
  pub frame_tx:          Mutex<Option<Sender<String>>>,
  pub seen_subprotocols: Mutex<Vec<Vec<String>>>,
}

impl FakeNet {
  /// Deliver a raw frame as if the server had sent it.
  pub fn push_frame(&self, raw: &str) {
    let guard = self.frame_tx.lock();
    let tx = guard.as_ref().expect("no live connection to push frames into");
    tx.send(raw.to_string()).expect("reader hung up");
  }

  /// Kill the connection out from under the reader, as a mid-read transport
  /// fault would.
  pub fn drop_connection(&self) {
    *self.frame_tx.lock() = None;
  }

  pub fn sent_messages(&self) -> Vec<String> {
    self.sent.lock().clone()
  }

  pub fn attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }
}

pub struct FakeConnector {
  pub net: Arc<FakeNet>,
}

impl Connector for FakeConnector {
  fn connect(
    &self,
    _address: &str,
    options: &HandshakeOptions,
  ) -> Result<(Box<dyn TransportWriter>, Box<dyn TransportReader>), TransportError> {
    self.net.attempts.fetch_add(1, Ordering::SeqCst);
    self
      .net
      .seen_subprotocols
      .lock()
      .push(options.subprotocols.clone());
    if self.net.fail_connects.load(Ordering::SeqCst) {
      return Err(TransportError::Handshake("scripted connect failure".to_string()));
    }

    let (tx, rx) = unbounded();
    *self.net.frame_tx.lock() = Some(tx);
    let closed = Arc::new(AtomicBool::new(false));
    let writer = FakeWriter {
      net:    Arc::clone(&self.net),
      closed: Arc::clone(&closed),
    };
    let reader = FakeReader { rx, closed };
    Ok((Box::new(writer), Box::new(reader)))
  }
}

struct FakeWriter {
  net:    Arc<FakeNet>,
  closed: Arc<AtomicBool>,
}

impl TransportWriter for FakeWriter {
  fn send(&mut self, text: &str) -> Result<(), TransportError> {
    if self.net.fail_next_send.swap(false, Ordering::SeqCst) {
      return Err(TransportError::NotConnected);
    }
    self.net.sent.lock().push(text.to_string());
    Ok(())
  }

  fn shutdown(&mut self) {
    self.closed.store(true, Ordering::SeqCst);
  }
}

struct FakeReader {
  rx:     Receiver<String>,
  closed: Arc<AtomicBool>,
}

impl TransportReader for FakeReader {
  fn recv(&mut self) -> Result<Option<String>, TransportError> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(TransportError::Closed);
    }
    match self.rx.recv_timeout(Duration::from_millis(20)) {
      Ok(frame) => Ok(Some(frame)),
      Err(RecvTimeoutError::Timeout) => Ok(None),
      Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
    }
  }
}

pub struct FakeServer {
  running: AtomicBool,
}

impl FakeServer {
  pub fn new(running: bool) -> Arc<Self> {
    Arc::new(Self {
      running: AtomicBool::new(running),
    })
  }

  pub fn set_running(&self, running: bool) {
    self.running.store(running, Ordering::SeqCst);
  }
}

impl ServerHandle for FakeServer {
  fn address(&self) -> String {
    "ws://127.0.0.1:9999/engine".to_string()
  }

  fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }
}

#[derive(Default)]
pub struct EditorState {
  pub path:                 PathBuf,
  pub cursor:               (usize, usize),
  pub lines:                Vec<String>,
  pub word_range:           ((usize, usize), (usize, usize)),
  pub selection:            ((usize, usize), (usize, usize)),
  pub current_word:         String,
  pub input_response:       Option<String>,
  pub messages:             Vec<String>,
  pub warnings:             Vec<String>,
  pub opened:               Vec<(PathBuf, OpenTarget)>,
  pub external:             Vec<String>,
  pub scratches:            Vec<(String, Vec<String>)>,
  pub published_notes:      Vec<Vec<Note>>,
  pub set_cursor_calls:     Vec<(usize, usize)>,
  pub writes:               usize,
  pub reloads:              usize,
  pub note_clears:          usize,
  pub deferred_error_calls: usize,
}

pub struct RecordingEditor {
  pub state: Mutex<EditorState>,
}

impl RecordingEditor {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(EditorState {
        path: PathBuf::from("/work/demo/src/main.x"),
        cursor: (1, 4),
        lines: vec!["let demo = 1".to_string(), "demo + 1".to_string()],
        word_range: ((1, 4), (1, 8)),
        selection: ((1, 0), (1, 8)),
        current_word: "demo".to_string(),
        ..EditorState::default()
      }),
    })
  }

  pub fn messages(&self) -> Vec<String> {
    self.state.lock().messages.clone()
  }

  pub fn warnings(&self) -> Vec<String> {
    self.state.lock().warnings.clone()
  }

  pub fn reloads(&self) -> usize {
    self.state.lock().reloads
  }
}

impl Editor for RecordingEditor {
  fn path(&self) -> PathBuf {
    self.state.lock().path.clone()
  }

  fn cursor(&self) -> (usize, usize) {
    self.state.lock().cursor
  }

  fn set_cursor(&self, row: usize, col: usize) {
    let mut state = self.state.lock();
    state.cursor = (row, col);
    state.set_cursor_calls.push((row, col));
  }

  fn lines(&self) -> Vec<String> {
    self.state.lock().lines.clone()
  }

  fn current_line(&self) -> String {
    let state = self.state.lock();
    let (row, _) = state.cursor;
    state.lines.get(row.saturating_sub(1)).cloned().unwrap_or_default()
  }

  fn file_contents(&self) -> String {
    self.state.lock().lines.join("\n")
  }

  fn word_under_cursor_range(&self) -> ((usize, usize), (usize, usize)) {
    self.state.lock().word_range
  }

  fn selection_range(&self) -> ((usize, usize), (usize, usize)) {
    self.state.lock().selection
  }

  fn current_word(&self) -> String {
    self.state.lock().current_word.clone()
  }

  fn write_buffer(&self) {
    self.state.lock().writes += 1;
  }

  fn ask_input(&self, _prompt: &str) -> Option<String> {
    self.state.lock().input_response.clone()
  }

  fn message(&self, text: &str) {
    self.state.lock().messages.push(text.to_string());
  }

  fn warn(&self, text: &str) {
    self.state.lock().warnings.push(text.to_string());
  }

  fn open_file(&self, path: &Path, target: OpenTarget) {
    self.state.lock().opened.push((path.to_path_buf(), target));
  }

  fn open_external(&self, url: &str) {
    self.state.lock().external.push(url.to_string());
  }

  fn reload_buffer(&self) {
    self.state.lock().reloads += 1;
  }

  fn show_scratch(&self, title: &str, lines: &[String]) {
    self
      .state
      .lock()
      .scratches
      .push((title.to_string(), lines.to_vec()));
  }

  fn publish_notes(&self, notes: &[Note]) {
    self.state.lock().published_notes.push(notes.to_vec());
  }

  fn clear_notes(&self) {
    self.state.lock().note_clears += 1;
  }

  fn display_deferred_errors(&self, _path: &Path) {
    self.state.lock().deferred_error_calls += 1;
  }
}

pub struct Harness {
  pub client: Client,
  pub editor: Arc<RecordingEditor>,
  pub net:    Arc<FakeNet>,
  _cache:     TempDir,
}

pub fn harness() -> Harness {
  harness_with_variant(Arc::new(VariantV1))
}

pub fn harness_with_variant(variant: Arc<dyn ProtocolVariant>) -> Harness {
  let cache = tempfile::tempdir().expect("tempdir");
  let config = ProjectConfig::parse(&format!(
    "name = \"demo\"\nroot-dir = \"/work/demo\"\ncache-dir = \"{}\"\n",
    cache.path().join("cache").display(),
  ))
  .expect("valid config");

  let editor = RecordingEditor::new();
  let net = Arc::new(FakeNet::default());
  let connector = FakeConnector {
    net: Arc::clone(&net),
  };
  let client = Client::new(
    Arc::clone(&editor) as Arc<dyn Editor>,
    config,
    variant,
    Box::new(connector),
  );

  Harness {
    client,
    editor,
    net,
    _cache: cache,
  }
}

/// Poll until `check` passes or the deadline elapses; background-thread
/// effects need a grace period.
pub fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
  let start = std::time::Instant::now();
  while start.elapsed() < deadline {
    if check() {
      return true;
    }
    std::thread::sleep(Duration::from_millis(10));
  }
  check()
}
