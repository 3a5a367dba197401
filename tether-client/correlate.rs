//! Call-id allocation and the per-call options store. Ids are strictly
//! increasing from 0 and never reused within a session, so options persist
//! for the session's lifetime unless a workflow overwrites them.

use std::collections::HashMap;

/// Caller-scoped metadata attached to an outstanding call, read back by the
/// handler when the matching response arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
  pub split:             bool,
  pub vert:              bool,
  pub open_definition:   bool,
  pub display:           bool,
  pub browse:            bool,
  pub word_under_cursor: Option<String>,
  pub false_resp_msg:    Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct CallRegistry {
  next_id: u64,
  options: HashMap<u64, CallOptions>,
}

impl CallRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the current counter, then increments. Used exclusively by the
  /// send path.
  pub fn next_call_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  pub fn record_options(&mut self, call_id: u64, options: CallOptions) {
    self.options.insert(call_id, options);
  }

  pub fn options(&self, call_id: u64) -> Option<&CallOptions> {
    self.options.get(&call_id)
  }
}
