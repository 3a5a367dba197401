mod envelope;
mod message;
pub mod requests;
mod variant;

pub use envelope::{
  EnvelopeError,
  InboundEnvelope,
  OutboundEnvelope,
};
pub use message::{
  BackgroundMessage,
  CompletionInfo,
  CompletionInfoList,
  ConnectionInfo,
  DebugBacktrace,
  DebugBreak,
  DebugOutput,
  ImplementationInfo,
  ImportSuggestions,
  MessageDecodeError,
  Note,
  NoteSeverity,
  NotesEvent,
  PackageInfo,
  RangePosition,
  RangePositions,
  RefactorDiff,
  RefactorKindTag,
  ServerMessage,
  SourcePosition,
  StringResponse,
  SuggestedImport,
  SymbolInfo,
  SymbolSearchResult,
  SymbolSearchResults,
  TypeInfo,
};
pub use variant::{
  ProtocolVariant,
  VariantV1,
  VariantV2,
};
