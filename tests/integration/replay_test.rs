//! Replay of recorded traffic logs
//!
//! Tests for stepping a recorded session through the engine and for the
//! traffic log file format.

use crate::assert_ok;
use crate::common::*;
use crate::{assert_contains, assert_ids};
use chatline::client::replay::{EventReplayer, ReplayOutcome, TrafficLog, TrafficLogEntry};
use chatline::client::ReconciliationEngine;
use chatline::shared::{ChatConfig, ChatError, ConnectionState, EngineEvent};
use serde_json::json;
use std::collections::BTreeSet;
use tempfile::TempDir;

#[test]
fn test_step_through_recorded_session() {
    let mut engine = ReconciliationEngine::new();
    let mut replayer = EventReplayer::new(recorded_session());

    let step = replayer.next(&mut engine).unwrap();
    assert_eq!(step.event, "connect");
    assert_eq!(engine.connection_state(), &ConnectionState::Connected);

    replayer.next(&mut engine);
    assert_ids!(engine.snapshot(), ["h1", "h2"]);

    // `emitMessage` is a recorder-only entry and is passed over
    let step = replayer.next(&mut engine).unwrap();
    assert_eq!(step.index, 3);
    assert_ids!(engine.snapshot(), ["h1", "h2", "u3"]);

    replayer.next(&mut engine);
    assert_eq!(engine.current_bot_id(), Some("b4"));
    assert_eq!(engine.snapshot().texts()[3], "Gate 4");

    replayer.next(&mut engine);
    replayer.next(&mut engine);
    assert_eq!(engine.snapshot().texts()[3], "Gate 4 is");

    let mut rx = engine.subscribe();
    replayer.next(&mut engine);
    assert_eq!(engine.snapshot().texts()[3], "Gate 4 is in terminal B.");
    assert_eq!(engine.current_bot_id(), None);
    assert!(drain(&mut rx).contains(&EngineEvent::Flash {
        id: "b4".to_string()
    }));

    replayer.next(&mut engine);
    assert_eq!(
        engine.connection_state(),
        &ConnectionState::Error("socket timeout".to_string())
    );

    assert!(replayer.has_more());
    replayer.next(&mut engine);
    assert!(!replayer.has_more());
    assert!(replayer.next(&mut engine).is_none());
    assert_eq!(engine.snapshot().len(), 4);
}

#[test]
fn test_run_to_end_with_skip_set() {
    let mut engine = ReconciliationEngine::new();
    let skip: BTreeSet<String> = ["update_history_item".to_string(), "on disconnect".to_string()]
        .into_iter()
        .collect();
    let config = assert_ok!(ChatConfig::builder()
        .skip_event("update_history_item")
        .skip_event("on disconnect")
        .build());
    assert_eq!(config.events_to_skip, skip);

    let mut replayer = EventReplayer::from_config(recorded_session(), &config);
    let steps = replayer.run_to_end(&mut engine);

    assert_eq!(steps.len(), 7);
    assert!(steps.iter().all(|step| step.event != "update_history_item"));
    assert_eq!(engine.snapshot().texts()[3], "Gate 4 is");
    assert_eq!(engine.current_bot_id(), Some("b4"));
}

#[test]
fn test_malformed_entries_do_not_stop_replay() {
    let entries = vec![
        stream_entry(json!({"text": "missing id"})),
        TrafficLogEntry::new("on send_history_snapshot", vec![]),
        history_entry(json!("not a batch")),
        stream_entry(json!({"id": "m1", "text": "ok", "is_bot": true})),
    ];
    let mut engine = ReconciliationEngine::new();
    let steps = EventReplayer::new(entries).run_to_end(&mut engine);

    assert_eq!(steps.len(), 4);
    for step in &steps[..3] {
        assert!(matches!(
            step.outcome,
            ReplayOutcome::Malformed(ChatError::MalformedEvent { .. })
        ));
    }
    assert_eq!(steps[3].outcome, ReplayOutcome::Applied(1));
    assert_ids!(engine.snapshot(), ["m1"]);
}

#[test]
fn test_clear_chat_replayed_from_log() {
    let mut engine = ReconciliationEngine::new();
    let mut replayer = EventReplayer::new(vec![
        history_entry(json!([{"id": "a", "text": "hi", "is_finished": true}])),
        history_entry(json!({"messages": []})),
    ]);

    replayer.next(&mut engine);
    engine.request_clear_chat();
    replayer.next(&mut engine);
    assert!(engine.snapshot().is_empty());
}

#[test]
fn test_traffic_log_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("traffic.json");

    let mut log = TrafficLog::default();
    log.log_connect(json!({"token": "abc"}));
    log.log_on_response(
        "stream_message",
        vec![json!({"id": "m1", "text": "Hel", "is_bot": true})],
    );
    log.log_emit_message("send_message", json!({"text": "hi"}));
    log.log_on_response(
        "update_history_item",
        vec![json!({"id": "m1", "text": "Hello", "is_bot": true, "is_finished": true})],
    );
    assert_ok!(log.save(&path));

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_contains!(raw, "on stream_message");

    let entries = assert_ok!(TrafficLog::load(&path));
    assert_eq!(entries, log.entries());

    let mut engine = ReconciliationEngine::new();
    let steps = EventReplayer::new(entries).run_to_end(&mut engine);
    assert_eq!(steps.len(), 3);
    assert_eq!(engine.snapshot().texts(), vec!["Hello"]);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = TrafficLog::load(dir.path().join("absent.json"));
    crate::assert_err!(result, ChatError::Io { .. });
}
