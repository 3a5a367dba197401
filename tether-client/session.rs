//! Connection lifecycle, the outbound send path, and the background receive
//! loop.
//!
//! Concurrency contract: exactly two flows touch a session. The caller's
//! thread drives `connect`/`disconnect`/`send`/`teardown` and owns the writer
//! half; the receive loop owns the reader half and only ever *clears* the
//! `connected`/`running` flags, on a transport fault. The inbound queue is
//! the only channel between the two.

use std::{
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      Ordering,
    },
  },
  thread,
  time::Duration,
};

use crossbeam::channel::{
  Receiver,
  Sender,
  unbounded,
};
use parking_lot::Mutex;
use serde_json::Value;
use tether_protocol::{
  ProtocolVariant,
  requests,
};
use tracing::{
  debug,
  warn,
};

use crate::{
  config,
  correlate::{
    CallOptions,
    CallRegistry,
  },
  editor::Editor,
  feedback,
  transport::{
    Connector,
    HandshakeOptions,
    TransportError,
    TransportReader,
    TransportWriter,
  },
};

/// Total connection attempts a session may make before giving up for good.
pub const DEFAULT_RETRY_BUDGET: u32 = 6;

/// How long the receive loop sleeps between checks while disconnected, so it
/// doesn't busy-wait for a reconnect.
const DISCONNECTED_POLL: Duration = Duration::from_millis(500);

/// Descriptor of the analysis server a session connects to.
pub trait ServerHandle: Send + Sync {
  fn address(&self) -> String;
  fn is_running(&self) -> bool;
}

struct SessionShared {
  connected:  AtomicBool,
  running:    AtomicBool,
  reader:     Mutex<Option<Box<dyn TransportReader>>>,
  inbound_tx: Sender<String>,
}

pub struct Session {
  shared:            Arc<SessionShared>,
  inbound_rx:        Receiver<String>,
  writer:            Option<Box<dyn TransportWriter>>,
  server:            Option<Arc<dyn ServerHandle>>,
  connector:         Box<dyn Connector>,
  variant:           Arc<dyn ProtocolVariant>,
  editor:            Arc<dyn Editor>,
  calls:             CallRegistry,
  name:              String,
  retries_left:      u32,
  log_full_outbound: bool,
}

impl Session {
  pub fn new(
    name: impl Into<String>,
    editor: Arc<dyn Editor>,
    connector: Box<dyn Connector>,
    variant: Arc<dyn ProtocolVariant>,
  ) -> Self {
    let (inbound_tx, inbound_rx) = unbounded();
    Self {
      shared: Arc::new(SessionShared {
        connected: AtomicBool::new(false),
        running: AtomicBool::new(false),
        reader: Mutex::new(None),
        inbound_tx,
      }),
      inbound_rx,
      writer: None,
      server: None,
      connector,
      variant,
      editor,
      calls: CallRegistry::new(),
      name: name.into(),
      retries_left: DEFAULT_RETRY_BUDGET,
      log_full_outbound: config::debug_verbosity(),
    }
  }

  pub fn is_connected(&self) -> bool {
    self.shared.connected.load(Ordering::SeqCst)
  }

  pub fn is_running(&self) -> bool {
    self.shared.running.load(Ordering::SeqCst)
  }

  pub fn retries_left(&self) -> u32 {
    self.retries_left
  }

  pub fn set_retry_budget(&mut self, budget: u32) {
    self.retries_left = budget;
  }

  /// Start a connection with the server. No-op when already connected,
  /// unless `force_reconnect` is set.
  pub fn connect(&mut self, server: &Arc<dyn ServerHandle>, force_reconnect: bool) {
    debug!("connect: in");
    if self.is_connected() && !force_reconnect {
      return;
    }
    if self.retries_left < 1 {
      // Permanent for this session; a fresh session is the only way out.
      warn!("connect: retry budget exhausted");
      self.editor.warn(feedback::TRANSPORT_WARNING);
      return;
    }
    if !server.is_running() {
      debug!("connect: server is not running, nothing to connect to");
      return;
    }

    // Burn budget per attempt and never replenish, so a permanently dead
    // server cannot trigger an unbounded reconnect storm.
    self.retries_left -= 1;

    let options = HandshakeOptions {
      subprotocols: self
        .variant
        .subprotocols()
        .iter()
        .map(|proto| proto.to_string())
        .collect(),
    };
    let address = server.address();
    debug!(%address, subprotocols = ?options.subprotocols, "connect: establishing connection");

    match self.connector.connect(&address, &options) {
      Ok((writer, reader)) => {
        *self.shared.reader.lock() = Some(reader);
        self.writer = Some(writer);
        self.shared.connected.store(true, Ordering::SeqCst);
        self.server = Some(Arc::clone(server));
        if !self.is_running() {
          self.start_receive_loop();
        }
        let _ = self.send_request(&requests::connection_info());
      },
      Err(err) => {
        self.shared.connected.store(false, Ordering::SeqCst);
        warn!(error = %err, "connect: connection attempt failed");
        self.editor.warn(feedback::TRANSPORT_WARNING);
      },
    }
  }

  /// Close the server connection. Idempotent. Not a graceful close: the
  /// shutdown is what wakes a receive loop blocked on a read.
  pub fn disconnect(&mut self) {
    debug!("disconnect: in");
    if !self.shared.connected.swap(false, Ordering::SeqCst) {
      return;
    }
    // Flag is already cleared, so the receive loop treats the read failure
    // this causes as an intentional close rather than a fault.
    if let Some(mut writer) = self.writer.take() {
      writer.shutdown();
    }
    *self.shared.reader.lock() = None;
  }

  /// Stop the session. Resource cleanup past this point is best-effort.
  pub fn teardown(&mut self) {
    debug!("teardown: in");
    self.shared.running.store(false, Ordering::SeqCst);
    self.disconnect();
  }

  /// Wrap a request in the next call-id envelope and send it. Returns the
  /// call id, which is consumed even when the session is not in a state to
  /// transmit.
  pub fn send_request(&mut self, request: &Value) -> u64 {
    let call_id = self.calls.next_call_id();
    match self.variant.encode_envelope(call_id, request) {
      Ok(encoded) => {
        if self.log_full_outbound {
          debug!(call_id, message = %encoded, "send_request");
        } else {
          debug!(call_id, "send_request");
        }
        self.send(&encoded);
      },
      Err(err) => warn!(call_id, error = %err, "send_request: failed to encode envelope"),
    }
    call_id
  }

  /// Send an already-serialized message. Fire-and-forget: on a transport
  /// fault this makes exactly one inline reconnect attempt and one resend,
  /// then swallows the failure. Callers must not assume delivery.
  pub fn send(&mut self, text: &str) {
    debug!("send: in");
    if !(self.is_running() && self.is_connected()) {
      return;
    }
    if let Err(err) = self.write(text) {
      warn!(error = %err, "send: transport fault, attempting inline reconnect");
      let Some(server) = self.server.clone() else {
        warn!("send: no server descriptor recorded, cannot reconnect");
        return;
      };
      self.connect(&server, true);
      if self.is_connected()
        && let Err(err) = self.write(text)
      {
        warn!(error = %err, "send: resend after reconnect failed");
      }
    }
  }

  fn write(&mut self, text: &str) -> Result<(), TransportError> {
    match self.writer.as_mut() {
      Some(writer) => writer.send(text),
      None => Err(TransportError::NotConnected),
    }
  }

  pub fn record_call_options(&mut self, call_id: u64, options: CallOptions) {
    self.calls.record_options(call_id, options);
  }

  pub fn call_options(&self, call_id: u64) -> Option<CallOptions> {
    self.calls.options(call_id).cloned()
  }

  pub fn queue_is_empty(&self) -> bool {
    self.inbound_rx.is_empty()
  }

  /// Pop one raw inbound message without blocking.
  pub fn try_pop(&self) -> Option<String> {
    self.inbound_rx.try_recv().ok()
  }

  fn start_receive_loop(&mut self) {
    // Swap doubles as the start guard: a second start while one loop is
    // active is a no-op.
    if self.shared.running.swap(true, Ordering::SeqCst) {
      return;
    }
    let shared = Arc::clone(&self.shared);
    let editor = Arc::clone(&self.editor);
    let spawned = thread::Builder::new()
      .name(format!("{}-receive", self.name))
      .spawn(move || receive_loop(shared, editor));
    if let Err(err) = spawned {
      warn!(error = %err, "failed to spawn receive loop thread");
      self.shared.running.store(false, Ordering::SeqCst);
    }
  }
}

enum LoopStep {
  Progress,
  Disconnected,
  Fault,
}

/// Enqueue inbound messages as they arrive. Runs until `running` is cleared;
/// there is no explicit join, teardown just clears the flag and the loop
/// observes it on its next wake or read fault.
fn receive_loop(shared: Arc<SessionShared>, editor: Arc<dyn Editor>) {
  debug!("receive loop: started");
  while shared.running.load(Ordering::SeqCst) {
    let step = {
      let mut slot = shared.reader.lock();
      match slot.as_mut() {
        Some(reader) if shared.connected.load(Ordering::SeqCst) => match reader.recv() {
          Ok(Some(frame)) => {
            debug!("receive loop: queueing received message");
            let _ = shared.inbound_tx.send(frame);
            LoopStep::Progress
          },
          Ok(None) => LoopStep::Progress,
          Err(err) => {
            *slot = None;
            if shared.connected.load(Ordering::SeqCst) {
              warn!(error = %err, "receive loop: transport fault");
              LoopStep::Fault
            } else {
              // The caller closed the connection under us; go back to
              // waiting for a reconnect.
              LoopStep::Progress
            }
          },
        },
        _ => LoopStep::Disconnected,
      }
    };

    match step {
      LoopStep::Progress => {},
      LoopStep::Disconnected => thread::sleep(DISCONNECTED_POLL),
      LoopStep::Fault => {
        editor.warn(feedback::TRANSPORT_WARNING);
        // Stop ourselves and leave reconnection to the next caller-initiated
        // connect or send.
        shared.connected.store(false, Ordering::SeqCst);
        shared.running.store(false, Ordering::SeqCst);
      },
    }
  }
  debug!("receive loop: stopped");
}
