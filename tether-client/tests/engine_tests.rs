//! End-to-end engine tests over an in-memory transport: connection
//! lifecycle, correlation, drain semantics, and the refactor workflow.

mod common;

use std::{
  sync::Arc,
  thread,
  time::{
    Duration,
    Instant,
  },
};

use common::{
  FakeServer,
  harness,
  harness_with_variant,
  wait_until,
};
use serde_json::{
  Value,
  json,
};
use tether_client::{
  RefactorState,
  ServerHandle,
  feedback,
};
use tether_protocol::VariantV2;

fn server_handle(server: &Arc<FakeServer>) -> Arc<dyn ServerHandle> {
  Arc::clone(server) as Arc<dyn ServerHandle>
}

fn sent_envelopes(raw: &[String]) -> Vec<Value> {
  raw
    .iter()
    .map(|text| serde_json::from_str(text).expect("sent frames are valid json"))
    .collect()
}

#[test]
fn handshake_is_first_outbound_message_with_call_id_zero() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  assert!(h.client.is_connected());
  assert!(h.client.is_running());

  let sent = sent_envelopes(&h.net.sent_messages());
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0]["callId"], 0);
  assert_eq!(sent[0]["req"]["typehint"], "ConnectionInfoReq");
}

#[test]
fn connect_is_a_no_op_when_already_connected() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));
  h.client.connect(&server_handle(&server));

  assert_eq!(h.net.attempts(), 1);
}

#[test]
fn not_running_server_never_burns_budget() {
  let mut h = harness();
  h.client.set_retry_budget(1);

  let server = FakeServer::new(false);
  h.client.connect(&server_handle(&server));

  assert_eq!(h.net.attempts(), 0);
  assert!(!h.client.is_connected());

  // The single budget unit is still there: flipping the server on connects.
  server.set_running(true);
  h.client.connect(&server_handle(&server));
  assert!(h.client.is_connected());
  assert_eq!(h.net.attempts(), 1);
}

#[test]
fn retry_budget_exhaustion_is_permanent() {
  let mut h = harness();
  h.client.set_retry_budget(2);
  h.net.fail_connects.store(true, std::sync::atomic::Ordering::SeqCst);

  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));
  h.client.connect(&server_handle(&server));
  assert_eq!(h.net.attempts(), 2);
  assert!(!h.client.is_connected());

  // Budget is gone: the transport is not touched again, even once the
  // server would accept us.
  h.net.fail_connects.store(false, std::sync::atomic::Ordering::SeqCst);
  h.client.connect(&server_handle(&server));
  assert_eq!(h.net.attempts(), 2);
  assert!(!h.client.is_connected());
  assert!(!h.editor.warnings().is_empty());
}

#[test]
fn call_ids_are_strictly_increasing_across_the_session() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let first = h.client.send_request(&json!({"typehint": "TypecheckFilesReq", "files": []}));
  let second = h.client.send_request(&json!({"typehint": "TypecheckFilesReq", "files": []}));
  assert_eq!((first, second), (1, 2));

  let sent = sent_envelopes(&h.net.sent_messages());
  let ids: Vec<u64> = sent
    .iter()
    .map(|envelope| envelope["callId"].as_u64().expect("numeric call id"))
    .collect();
  assert_eq!(ids, [0, 1, 2]);
}

#[test]
fn response_is_correlated_by_call_id_and_dispatched_once() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  // usages() records a false-response notice against its call id.
  h.client.usages();
  let frame = json!({
    "callId": 1,
    "payload": { "typehint": "ERangePositions", "positions": [] },
  })
  .to_string();
  h.net.push_frame(&frame);

  h.client.drain(Duration::from_secs(5), true);

  let notices: Vec<String> = h
    .editor
    .messages()
    .into_iter()
    .filter(|message| message == feedback::NOT_A_SYMBOL)
    .collect();
  assert_eq!(notices.len(), 1);
}

#[test]
fn unsolicited_notification_is_routed_by_typehint_alone() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.net
    .push_frame(&json!({ "payload": { "typehint": "AnalyzerReadyEvent" } }).to_string());
  h.client.drain(Duration::from_secs(5), true);

  assert_eq!(h.editor.messages(), [feedback::ANALYZER_READY]);
}

#[test]
fn drain_on_empty_queue_returns_without_delay() {
  let mut h = harness();
  let start = Instant::now();
  h.client.drain(Duration::from_secs(5), false);

  assert!(start.elapsed() < Duration::from_millis(100));
  assert!(h.editor.messages().is_empty());
}

#[test]
fn waiting_drain_returns_shortly_after_the_first_reply() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let net = Arc::clone(&h.net);
  let feeder = thread::spawn(move || {
    thread::sleep(Duration::from_millis(300));
    net.push_frame(&json!({ "payload": { "typehint": "IndexerReadyEvent" } }).to_string());
  });

  let start = Instant::now();
  h.client.drain(Duration::from_secs(5), true);
  let elapsed = start.elapsed();
  feeder.join().expect("feeder");

  assert_eq!(h.editor.messages(), [feedback::INDEXER_READY]);
  assert!(elapsed < Duration::from_secs(2), "returned in {elapsed:?}");
}

#[test]
fn waiting_drain_times_out_quietly_when_the_server_stays_silent() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let start = Instant::now();
  h.client.drain(Duration::from_millis(300), true);
  let elapsed = start.elapsed();

  assert!(elapsed >= Duration::from_millis(300));
  assert!(elapsed < Duration::from_secs(2));
  assert!(h.editor.messages().is_empty());
}

#[test]
fn nil_frames_neither_dispatch_nor_satisfy_the_wait() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let net = Arc::clone(&h.net);
  let feeder = thread::spawn(move || {
    for _ in 0..10 {
      net.push_frame("nil");
      thread::sleep(Duration::from_millis(50));
    }
  });

  let start = Instant::now();
  h.client.drain(Duration::from_millis(400), true);
  let elapsed = start.elapsed();
  feeder.join().expect("feeder");

  // A steady stream of nil keepalives must not reset the silence window.
  assert!(elapsed >= Duration::from_millis(400));
  assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
  assert!(h.editor.messages().is_empty());
}

#[test]
fn receive_fault_stops_the_loop_and_leaves_reconnection_to_the_caller() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));
  assert!(h.client.is_running());

  h.net.drop_connection();

  assert!(wait_until(Duration::from_secs(2), || {
    !h.client.is_running() && !h.client.is_connected()
  }));
  assert!(
    h.editor
      .warnings()
      .iter()
      .any(|warning| warning == feedback::TRANSPORT_WARNING)
  );
  // No automatic reconnect happened.
  assert_eq!(h.net.attempts(), 1);

  // The caller recovers explicitly.
  h.client.connect(&server_handle(&server));
  assert!(h.client.is_connected());
  assert_eq!(h.net.attempts(), 2);
}

#[test]
fn send_fault_triggers_exactly_one_inline_reconnect_and_resend() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.net
    .fail_next_send
    .store(true, std::sync::atomic::Ordering::SeqCst);
  let call_id = h
    .client
    .send_request(&json!({"typehint": "TypecheckFilesReq", "files": []}));

  assert_eq!(h.net.attempts(), 2);
  let sent = sent_envelopes(&h.net.sent_messages());
  // Original handshake, reconnect handshake, then the retried request.
  assert_eq!(sent.len(), 3);
  assert_eq!(sent[2]["callId"], call_id);
  assert_eq!(sent[2]["req"]["typehint"], "TypecheckFilesReq");
}

#[test]
fn disconnect_is_idempotent_and_keeps_the_loop_alive() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.client.disconnect();
  h.client.disconnect();

  assert!(!h.client.is_connected());
  // The loop survives an intentional disconnect and waits for a reconnect.
  thread::sleep(Duration::from_millis(200));
  assert!(h.client.is_running());
  assert!(h.editor.warnings().is_empty());

  h.client.teardown();
  assert!(!h.client.is_running());
}

#[test]
fn refactor_ids_are_their_own_sequence() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  // Burn a couple of call ids first so the sequences visibly diverge.
  h.client.typecheck_file();
  h.client.rename(Some("renamed"));
  h.client.organize_imports();

  let sent = sent_envelopes(&h.net.sent_messages());
  let refactors: Vec<&Value> = sent
    .iter()
    .filter(|envelope| envelope["req"]["typehint"] == "RefactorReq")
    .collect();
  assert_eq!(refactors.len(), 2);
  assert_eq!(refactors[0]["req"]["procId"], 1);
  assert_eq!(refactors[1]["req"]["procId"], 2);
  assert!(refactors[0]["callId"].as_u64().expect("call id") > 1);
}

#[test]
fn failed_refactor_apply_reports_and_still_reloads() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));
  h.client.set_patch_program("false");

  h.client.rename(Some("renamed"));
  let frame = json!({
    "callId": 1,
    "payload": {
      "typehint": "RefactorDiffEffect",
      "procedureId": 1,
      "refactorType": { "typehint": "Rename" },
      "diff": "/tmp/nonexistent.diff",
    },
  })
  .to_string();
  h.net.push_frame(&frame);
  h.client.drain(Duration::from_secs(5), true);

  assert!(
    h.editor
      .messages()
      .iter()
      .any(|message| message == feedback::FAILED_REFACTORING)
  );
  assert_eq!(h.editor.reloads(), 1);
  assert_eq!(h.client.refactor_state(1), Some(RefactorState::Failed));
}

#[test]
fn successful_refactor_apply_reloads_without_complaint() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));
  h.client.set_patch_program("true");

  h.client.rename(Some("renamed"));
  let frame = json!({
    "callId": 1,
    "payload": {
      "typehint": "RefactorDiffEffect",
      "procedureId": 1,
      "refactorType": { "typehint": "Rename" },
      "diff": "/tmp/whatever.diff",
    },
  })
  .to_string();
  h.net.push_frame(&frame);
  h.client.drain(Duration::from_secs(5), true);

  assert!(
    !h.editor
      .messages()
      .iter()
      .any(|message| message == feedback::FAILED_REFACTORING)
  );
  assert_eq!(h.editor.reloads(), 1);
  assert_eq!(h.client.refactor_state(1), Some(RefactorState::Applied));
}

#[test]
fn completion_round_trip_returns_candidates() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let anchor = h.client.start_completion();
  assert!(anchor >= 1);

  let net = Arc::clone(&h.net);
  let feeder = thread::spawn(move || {
    thread::sleep(Duration::from_millis(100));
    let frame = json!({
      "callId": 1,
      "payload": {
        "typehint": "CompletionInfoList",
        "completions": [
          { "name": "demoValue", "relevance": 90, "isCallable": false },
          { "name": "demoFn", "isCallable": true },
        ],
      },
    })
    .to_string();
    net.push_frame(&frame);
  });

  let results = h.client.completion_results();
  feeder.join().expect("feeder");

  let names: Vec<&str> = results.iter().map(|info| info.name.as_str()).collect();
  assert_eq!(names, ["demoValue", "demoFn"]);

  // Without a request in flight there is nothing to wait for.
  assert!(h.client.completion_results().is_empty());
}

#[test]
fn typecheck_notes_are_batched_until_completion() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.client.typecheck_file();

  let note = |msg: &str| {
    json!({
      "file": "/work/demo/src/main.x",
      "msg": msg,
      "severity": { "typehint": "NoteError" },
      "line": 1, "col": 0, "beg": 0, "end": 4,
    })
  };
  h.net.push_frame(
    &json!({ "payload": { "typehint": "NewNotesEvent", "notes": [note("first"), note("second")] } })
      .to_string(),
  );
  h.net.push_frame(
    &json!({ "payload": { "typehint": "NewNotesEvent", "notes": [note("third")] } }).to_string(),
  );
  h.net
    .push_frame(&json!({ "payload": { "typehint": "FullTypecheckCompleteEvent" } }).to_string());

  h.client.drain(Duration::from_secs(5), true);

  let published = h.editor.state.lock().published_notes.clone();
  assert_eq!(published.len(), 1);
  assert_eq!(published[0].len(), 3);
}

#[test]
fn debug_break_remembers_the_paused_thread() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.net.push_frame(
    &json!({
      "payload": {
        "typehint": "DebugBreakEvent",
        "threadId": "7",
        "file": "/work/demo/src/main.x",
        "line": 3,
      },
    })
    .to_string(),
  );
  h.client.drain(Duration::from_secs(5), true);

  h.client.debug_continue();

  let sent = sent_envelopes(&h.net.sent_messages());
  let last = sent.last().expect("at least the continue request");
  assert_eq!(last["req"]["typehint"], "DebugContinueReq");
  assert_eq!(last["req"]["threadId"], "7");
}

#[test]
fn variant_two_negotiates_the_jerky_subprotocol() {
  let mut h = harness_with_variant(Arc::new(VariantV2));
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  let seen = h.net.seen_subprotocols.lock().clone();
  assert_eq!(seen, [vec!["jerky".to_string()]]);
}

#[test]
fn open_declaration_jumps_to_the_reported_position() {
  let mut h = harness();
  let server = FakeServer::new(true);
  h.client.connect(&server_handle(&server));

  h.client.open_declaration();
  h.net.push_frame(
    &json!({
      "callId": 1,
      "payload": {
        "typehint": "SymbolInfo",
        "name": "demo",
        "declPos": {
          "typehint": "LineSourcePosition",
          "file": "/work/demo/src/lib.x",
          "line": 12,
        },
      },
    })
    .to_string(),
  );
  h.client.drain(Duration::from_secs(5), true);

  let state = h.editor.state.lock();
  assert_eq!(state.opened.len(), 1);
  assert_eq!(
    state.opened[0].0,
    std::path::PathBuf::from("/work/demo/src/lib.x")
  );
  assert_eq!(state.set_cursor_calls, [(12, 0)]);
}
