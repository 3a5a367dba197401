mod client;
mod config;
mod correlate;
mod debugger;
mod editor;
pub mod feedback;
mod ops;
pub mod position;
mod refactor;
mod session;
mod transport;
mod typecheck;

pub use client::Client;
pub use config::{
  ConfigError,
  ProjectConfig,
  debug_verbosity,
};
pub use correlate::{
  CallOptions,
  CallRegistry,
};
pub use debugger::DebuggerCoordinator;
pub use editor::{
  Editor,
  OpenTarget,
};
pub use refactor::{
  RefactorState,
  RefactorWorkflow,
};
pub use session::{
  DEFAULT_RETRY_BUDGET,
  ServerHandle,
  Session,
};
pub use transport::{
  Connector,
  HandshakeOptions,
  TransportError,
  TransportReader,
  TransportWriter,
  WsConnector,
};
pub use typecheck::TypecheckCoordinator;
