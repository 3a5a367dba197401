//! Transport halves behind small traits so the engine and its tests are
//! independent of the wire. The websocket implementation keeps the socket in
//! one place and bounds every read with a short timeout, which is what makes
//! close-while-blocked-read reliable: shutting the TCP stream down makes the
//! next read fail instead of hanging.

use std::{
  io::ErrorKind,
  net::{
    Shutdown,
    TcpStream,
  },
  sync::Arc,
  time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use tungstenite::{
  Message,
  WebSocket,
  client::IntoClientRequest,
  http::HeaderValue,
};
use url::Url;

/// How long one read may hold the socket before yielding. Also the upper
/// bound on how long a writer can be blocked behind a reader.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Options negotiated during connection establishment; filled in from the
/// protocol variant.
#[derive(Debug, Clone, Default)]
pub struct HandshakeOptions {
  pub subprotocols: Vec<String>,
}

pub trait TransportReader: Send {
  /// Blocking read bounded by a short poll window. `Ok(None)` means the
  /// window elapsed with no frame; callers loop.
  fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

pub trait TransportWriter: Send {
  fn send(&mut self, text: &str) -> Result<(), TransportError>;

  /// Ungraceful close. Must reliably unblock a concurrent pending read with
  /// an error rather than hang.
  fn shutdown(&mut self);
}

/// Produces connected reader/writer halves for a server address.
pub trait Connector: Send {
  fn connect(
    &self,
    address: &str,
    options: &HandshakeOptions,
  ) -> Result<(Box<dyn TransportWriter>, Box<dyn TransportReader>), TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("invalid server address {address}: {reason}")]
  InvalidAddress { address: String, reason: String },
  #[error("transport i/o fault: {0}")]
  Io(#[from] std::io::Error),
  #[error("websocket handshake failed: {0}")]
  Handshake(String),
  #[error("websocket fault: {0}")]
  WebSocket(#[from] tungstenite::Error),
  #[error("connection closed")]
  Closed,
  #[error("transport is not connected")]
  NotConnected,
}

/// Websocket connector over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
  fn connect(
    &self,
    address: &str,
    options: &HandshakeOptions,
  ) -> Result<(Box<dyn TransportWriter>, Box<dyn TransportReader>), TransportError> {
    let url = Url::parse(address).map_err(|err| TransportError::InvalidAddress {
      address: address.to_string(),
      reason: err.to_string(),
    })?;
    let host = url
      .host_str()
      .ok_or_else(|| TransportError::InvalidAddress {
        address: address.to_string(),
        reason: "missing host".to_string(),
      })?
      .to_string();
    let port = url
      .port_or_known_default()
      .ok_or_else(|| TransportError::InvalidAddress {
        address: address.to_string(),
        reason: "missing port".to_string(),
      })?;

    debug!(%address, subprotocols = ?options.subprotocols, "establishing websocket connection");

    let stream = TcpStream::connect((host.as_str(), port))?;
    let mut request = address
      .into_client_request()
      .map_err(|err| TransportError::Handshake(err.to_string()))?;
    if !options.subprotocols.is_empty() {
      let joined = options.subprotocols.join(", ");
      let value =
        HeaderValue::from_str(&joined).map_err(|err| TransportError::Handshake(err.to_string()))?;
      request.headers_mut().insert("Sec-WebSocket-Protocol", value);
    }

    let (socket, _response) =
      tungstenite::client(request, stream).map_err(|err| TransportError::Handshake(err.to_string()))?;

    // Bound reads only after the handshake: the handshake itself must run on
    // a fully blocking stream.
    socket.get_ref().set_read_timeout(Some(READ_POLL_INTERVAL))?;
    let raw = socket.get_ref().try_clone()?;

    let socket = Arc::new(Mutex::new(socket));
    let writer = WsWriter {
      socket: Arc::clone(&socket),
      raw:    raw.try_clone()?,
    };
    let reader = WsReader { socket, raw };
    Ok((Box::new(writer), Box::new(reader)))
  }
}

struct WsWriter {
  socket: Arc<Mutex<WebSocket<TcpStream>>>,
  raw:    TcpStream,
}

impl TransportWriter for WsWriter {
  fn send(&mut self, text: &str) -> Result<(), TransportError> {
    let mut socket = self.socket.lock();
    socket.send(Message::Text(text.to_string()))?;
    Ok(())
  }

  fn shutdown(&mut self) {
    let _ = self.raw.shutdown(Shutdown::Both);
  }
}

struct WsReader {
  socket: Arc<Mutex<WebSocket<TcpStream>>>,
  raw:    TcpStream,
}

impl TransportReader for WsReader {
  fn recv(&mut self) -> Result<Option<String>, TransportError> {
    let mut socket = self.socket.lock();
    match socket.read() {
      Ok(Message::Text(text)) => Ok(Some(text)),
      Ok(Message::Close(_)) => Err(TransportError::Closed),
      // Control and binary frames carry nothing for the drain.
      Ok(_) => Ok(None),
      Err(tungstenite::Error::Io(err))
        if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
      {
        Ok(None)
      },
      Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
        Err(TransportError::Closed)
      },
      Err(err) => Err(TransportError::WebSocket(err)),
    }
  }
}

impl Drop for WsReader {
  fn drop(&mut self) {
    // The reader half is dropped on disconnect and on receive faults; make
    // sure the socket is fully closed in both cases.
    let _ = self.raw.shutdown(Shutdown::Both);
  }
}
