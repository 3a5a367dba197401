//! The two wire protocol variants. They share the JSON envelope but differ
//! in handshake negotiation and in the envelope codec each owns; everything
//! above this seam is variant-agnostic.

use serde_json::Value;

use crate::envelope::{
  self,
  EnvelopeError,
  InboundEnvelope,
};

/// Capability interface the engine selects at construction time. The engine
/// never branches on the concrete variant anywhere else.
pub trait ProtocolVariant: Send + Sync {
  /// Subprotocol identifiers offered during connection establishment.
  fn subprotocols(&self) -> &'static [&'static str];

  fn encode_envelope(&self, call_id: u64, req: &Value) -> Result<String, EnvelopeError>;

  /// Decode one raw frame. `Ok(None)` is a valid empty frame (`nil` or
  /// blank), which callers skip without error.
  fn decode_envelope(&self, raw: &str) -> Result<Option<InboundEnvelope>, EnvelopeError>;
}

/// Variant 1: plain envelope frames, no subprotocol negotiation.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantV1;

impl ProtocolVariant for VariantV1 {
  fn subprotocols(&self) -> &'static [&'static str] {
    &[]
  }

  fn encode_envelope(&self, call_id: u64, req: &Value) -> Result<String, EnvelopeError> {
    envelope::encode(call_id, req)
  }

  fn decode_envelope(&self, raw: &str) -> Result<Option<InboundEnvelope>, EnvelopeError> {
    envelope::decode(raw)
  }
}

/// Variant 2: negotiates the `jerky` subprotocol. Servers speaking it may
/// emit `callId` as a JSON string, so the decoder normalizes that form.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantV2;

impl ProtocolVariant for VariantV2 {
  fn subprotocols(&self) -> &'static [&'static str] {
    &["jerky"]
  }

  fn encode_envelope(&self, call_id: u64, req: &Value) -> Result<String, EnvelopeError> {
    envelope::encode(call_id, req)
  }

  fn decode_envelope(&self, raw: &str) -> Result<Option<InboundEnvelope>, EnvelopeError> {
    match envelope::decode(raw) {
      Ok(decoded) => Ok(decoded),
      Err(EnvelopeError::Parse(_)) => decode_string_call_id(raw),
      Err(err) => Err(err),
    }
  }
}

fn decode_string_call_id(raw: &str) -> Result<Option<InboundEnvelope>, EnvelopeError> {
  let mut value: Value = serde_json::from_str(raw).map_err(EnvelopeError::Parse)?;
  let call_id = match value.get("callId") {
    Some(Value::String(id)) => {
      let parsed = id
        .parse::<u64>()
        .map_err(|_| EnvelopeError::InvalidCallId(id.clone()))?;
      Some(parsed)
    },
    Some(Value::Number(id)) => id.as_u64(),
    _ => None,
  };
  Ok(Some(InboundEnvelope {
    call_id,
    payload: value.get_mut("payload").map(Value::take),
  }))
}
