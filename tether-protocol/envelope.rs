use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;
use thiserror::Error;

/// Outbound wire envelope: a request object wrapped with the call id that
/// correlates its eventual response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
  #[serde(rename = "callId")]
  pub call_id: u64,
  pub req:     Value,
}

/// Inbound wire envelope. Server-pushed notifications omit `callId`, and
/// keepalive frames omit `payload`; both fields are optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
  #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
  pub call_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<Value>,
}

impl InboundEnvelope {
  /// A frame the drain can skip outright: no payload to dispatch.
  pub fn is_empty(&self) -> bool {
    match &self.payload {
      None => true,
      Some(Value::Null) => true,
      Some(payload) => payload.as_object().is_some_and(|map| map.is_empty()),
    }
  }
}

/// The server emits a literal `nil` (and the transport may surface empty
/// text) as a keepalive; both are valid frames carrying nothing.
pub(crate) fn is_nil_frame(raw: &str) -> bool {
  let raw = raw.trim();
  raw.is_empty() || raw == "nil"
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
  #[error("failed to serialize outbound envelope: {0}")]
  Serialize(serde_json::Error),
  #[error("failed to parse inbound envelope: {0}")]
  Parse(serde_json::Error),
  #[error("invalid call id in inbound envelope: {0}")]
  InvalidCallId(String),
}

pub(crate) fn encode(call_id: u64, req: &Value) -> Result<String, EnvelopeError> {
  let envelope = OutboundEnvelope {
    call_id,
    req: req.clone(),
  };
  serde_json::to_string(&envelope).map_err(EnvelopeError::Serialize)
}

pub(crate) fn decode(raw: &str) -> Result<Option<InboundEnvelope>, EnvelopeError> {
  if is_nil_frame(raw) {
    return Ok(None);
  }
  let envelope = serde_json::from_str(raw).map_err(EnvelopeError::Parse)?;
  Ok(Some(envelope))
}
