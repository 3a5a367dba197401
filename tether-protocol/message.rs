//! The closed set of inbound payload variants, keyed by their `typehint`
//! discriminator. Unrecognized typehints decode to [`ServerMessage::Unknown`]
//! so the drain loop can log and drop them instead of failing.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionInfo {
  #[serde(default)]
  pub implementation: Option<ImplementationInfo>,
  #[serde(default)]
  pub version:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImplementationInfo {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionInfoList {
  pub completions: Vec<CompletionInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionInfo {
  pub name:        String,
  #[serde(default)]
  pub relevance:   Option<i64>,
  #[serde(rename = "isCallable", default)]
  pub is_callable: Option<bool>,
}

/// A position inside a source file, as the server reports declaration sites.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "typehint")]
pub enum SourcePosition {
  #[serde(rename = "LineSourcePosition")]
  Line { file: String, line: u64 },
  #[serde(rename = "OffsetSourcePosition")]
  Offset { file: String, offset: u64 },
}

impl SourcePosition {
  pub fn file(&self) -> &str {
    match self {
      Self::Line { file, .. } => file,
      Self::Offset { file, .. } => file,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolInfo {
  pub name:       String,
  #[serde(rename = "localName", default)]
  pub local_name: Option<String>,
  #[serde(rename = "declPos", default)]
  pub decl_pos:   Option<SourcePosition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeInfo {
  pub name:      String,
  #[serde(rename = "fullName", default)]
  pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StringResponse {
  pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestedImport {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportSuggestions {
  #[serde(rename = "symLists")]
  pub sym_lists: Vec<Vec<SuggestedImport>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PackageInfo {
  #[serde(rename = "fullName")]
  pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolSearchResult {
  pub name: String,
  #[serde(default)]
  pub pos:  Option<SourcePosition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolSearchResults {
  pub syms: Vec<SymbolSearchResult>,
}

/// One usage site reported for a uses-of-symbol query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangePosition {
  pub file:   String,
  pub offset: u64,
  pub start:  u64,
  pub end:    u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangePositions {
  pub positions: Vec<RangePosition>,
}

/// Tag-only object carried inside refactor responses, naming the kind of
/// refactoring the diff implements.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefactorKindTag {
  pub typehint: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefactorDiff {
  #[serde(rename = "procedureId")]
  pub procedure_id:  u64,
  #[serde(rename = "refactorType")]
  pub refactor_type: RefactorKindTag,
  pub diff:          String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "typehint")]
pub enum NoteSeverity {
  NoteError,
  NoteWarn,
  NoteInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Note {
  pub file:     String,
  pub msg:      String,
  pub severity: NoteSeverity,
  pub line:     u64,
  pub col:      u64,
  pub beg:      u64,
  pub end:      u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotesEvent {
  pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackgroundMessage {
  #[serde(default)]
  pub detail: Option<String>,
  #[serde(default)]
  pub code:   Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DebugOutput {
  pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DebugBreak {
  #[serde(rename = "threadId")]
  pub thread_id: String,
  #[serde(default)]
  pub file:      Option<String>,
  #[serde(default)]
  pub line:      Option<u64>,
}

/// Raw backtrace frames; rendered verbatim into a scratch buffer, so the
/// engine keeps them as untyped JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DebugBacktrace {
  pub frames: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
  ConnectionInfo(ConnectionInfo),
  CompletionInfoList(CompletionInfoList),
  SymbolInfo(SymbolInfo),
  TypeInfo(TypeInfo),
  StringResponse(StringResponse),
  ImportSuggestions(ImportSuggestions),
  PackageInfo(PackageInfo),
  SymbolSearchResults(SymbolSearchResults),
  RangePositions(RangePositions),
  RefactorDiff(RefactorDiff),
  NewNotes(NotesEvent),
  ClearAllNotes,
  FullTypecheckComplete,
  IndexerReady,
  AnalyzerReady,
  BackgroundMessage(BackgroundMessage),
  DebugOutput(DebugOutput),
  DebugBreak(DebugBreak),
  DebugBacktrace(DebugBacktrace),
  VoidResponse,
  FalseResponse,
  Unknown { typehint: String },
}

impl ServerMessage {
  /// Decode a payload object by its `typehint` discriminator.
  ///
  /// Payloads with a known tag but a malformed body are decode errors;
  /// payloads with an unknown tag decode to [`ServerMessage::Unknown`].
  pub fn decode(payload: &Value) -> Result<Self, MessageDecodeError> {
    let typehint = payload
      .get("typehint")
      .and_then(Value::as_str)
      .ok_or(MessageDecodeError::MissingTypehint)?;

    let message = match typehint {
      "ConnectionInfo" => Self::ConnectionInfo(from_payload(payload)?),
      "CompletionInfoList" => Self::CompletionInfoList(from_payload(payload)?),
      "SymbolInfo" => Self::SymbolInfo(from_payload(payload)?),
      "BasicTypeInfo" | "ArrowTypeInfo" => Self::TypeInfo(from_payload(payload)?),
      "StringResponse" => Self::StringResponse(from_payload(payload)?),
      "ImportSuggestions" => Self::ImportSuggestions(from_payload(payload)?),
      "PackageInfo" => Self::PackageInfo(from_payload(payload)?),
      "SymbolSearchResults" => Self::SymbolSearchResults(from_payload(payload)?),
      "ERangePositions" => Self::RangePositions(from_payload(payload)?),
      "RefactorDiffEffect" => Self::RefactorDiff(from_payload(payload)?),
      "NewNotesEvent" => Self::NewNotes(from_payload(payload)?),
      "ClearAllNotesEvent" => Self::ClearAllNotes,
      "FullTypecheckCompleteEvent" => Self::FullTypecheckComplete,
      "IndexerReadyEvent" => Self::IndexerReady,
      "AnalyzerReadyEvent" => Self::AnalyzerReady,
      "SendBackgroundMessageEvent" => Self::BackgroundMessage(from_payload(payload)?),
      "DebugOutputEvent" => Self::DebugOutput(from_payload(payload)?),
      "DebugBreakEvent" => Self::DebugBreak(from_payload(payload)?),
      "DebugBacktrace" => Self::DebugBacktrace(from_payload(payload)?),
      "VoidResponse" => Self::VoidResponse,
      "FalseResponse" => Self::FalseResponse,
      other => Self::Unknown {
        typehint: other.to_string(),
      },
    };
    Ok(message)
  }

  pub fn typehint(&self) -> &str {
    match self {
      Self::ConnectionInfo(_) => "ConnectionInfo",
      Self::CompletionInfoList(_) => "CompletionInfoList",
      Self::SymbolInfo(_) => "SymbolInfo",
      Self::TypeInfo(_) => "BasicTypeInfo",
      Self::StringResponse(_) => "StringResponse",
      Self::ImportSuggestions(_) => "ImportSuggestions",
      Self::PackageInfo(_) => "PackageInfo",
      Self::SymbolSearchResults(_) => "SymbolSearchResults",
      Self::RangePositions(_) => "ERangePositions",
      Self::RefactorDiff(_) => "RefactorDiffEffect",
      Self::NewNotes(_) => "NewNotesEvent",
      Self::ClearAllNotes => "ClearAllNotesEvent",
      Self::FullTypecheckComplete => "FullTypecheckCompleteEvent",
      Self::IndexerReady => "IndexerReadyEvent",
      Self::AnalyzerReady => "AnalyzerReadyEvent",
      Self::BackgroundMessage(_) => "SendBackgroundMessageEvent",
      Self::DebugOutput(_) => "DebugOutputEvent",
      Self::DebugBreak(_) => "DebugBreakEvent",
      Self::DebugBacktrace(_) => "DebugBacktrace",
      Self::VoidResponse => "VoidResponse",
      Self::FalseResponse => "FalseResponse",
      Self::Unknown { typehint } => typehint,
    }
  }
}

fn from_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, MessageDecodeError> {
  serde_json::from_value(payload.clone()).map_err(MessageDecodeError::Decode)
}

#[derive(Debug, Error)]
pub enum MessageDecodeError {
  #[error("inbound payload is missing its typehint discriminator")]
  MissingTypehint,
  #[error("failed to decode inbound payload: {0}")]
  Decode(serde_json::Error),
}
