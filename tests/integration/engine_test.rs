//! Reconciliation engine scenarios
//!
//! Tests for feed interleavings the transport produces in practice.

use crate::common::*;
use crate::{assert_ids, assert_unique_ids};
use chatline::client::{MemoryProcessLog, ReconciliationEngine};
use chatline::shared::{
    ConnectionState, EngineEvent, HistoryBatch, Message, MessageKind, ScrollHint, TypingState,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_delta_merge_preserves_position() {
    let mut engine = engine_with_history(vec![user_history("a", 1)]);
    engine.on_streaming_delta(delta("b", "partial", 0).with_index(2));
    engine.on_history(HistoryBatch::new(vec![user_history("c", 3)]));
    assert_ids!(engine.snapshot(), ["a", "b", "c"]);

    engine.on_streaming_delta(delta("b", "partial answer", 1).with_index(2));
    let snapshot = engine.snapshot();
    assert_ids!(snapshot, ["a", "b", "c"]);
    assert_eq!(snapshot[1].text, "partial answer");
}

#[test]
fn test_finished_update_idempotent() {
    let mut engine = ReconciliationEngine::new();
    engine.on_streaming_delta(delta("m1", "Hel", 0));
    let update = Message::bot("m1", "Hello!").with_part(1).finished();

    engine.on_update(update.clone());
    let once = engine.snapshot().to_vec();
    let mut rx = engine.subscribe();
    engine.on_update(update);

    assert_eq!(engine.snapshot().to_vec(), once);
    // Re-delivery may legally flash again
    assert!(drain(&mut rx).contains(&EngineEvent::Flash {
        id: "m1".to_string()
    }));
}

#[test]
fn test_history_after_stream_absorbs_record() {
    let mut engine = ReconciliationEngine::new();
    engine.on_streaming_delta(delta("m1", "Hel", 0));
    engine.on_streaming_delta(delta("m1", "Hello", 1));

    // Reconnect: the server resends the finished message as history
    engine.on_history(HistoryBatch::new(vec![Message::bot("m1", "Hello there")
        .with_part(3)
        .finished()]));

    let snapshot = engine.snapshot();
    assert_unique_ids!(snapshot);
    assert_eq!(snapshot.texts(), vec!["Hello there"]);
    assert_eq!(engine.current_bot_id(), None);
}

#[test]
fn test_late_delta_cannot_regress_finished_message() {
    let mut engine = ReconciliationEngine::new();
    engine.on_streaming_delta(delta("m1", "Hel", 0));
    engine.on_update(Message::bot("m1", "Hello!").with_part(2).finished());
    engine.on_streaming_delta(delta("m1", "Hello", 1));

    assert_eq!(engine.snapshot().texts(), vec!["Hello!"]);
    assert!(engine.snapshot()[0].is_finished);
    assert_eq!(engine.current_bot_id(), None);
}

#[test]
fn test_clear_chat_race_with_stream() {
    let mut engine = engine_with_history(vec![user_history("a", 1), bot_history("b", 2)]);
    let mut rx = engine.subscribe();

    engine.request_clear_chat();
    // A delta arrives between the request and the server acknowledgement
    engine.on_streaming_delta(delta("m9", "late", 0));
    assert_eq!(engine.snapshot().len(), 3);

    engine.on_history(HistoryBatch::new(vec![]));
    assert!(engine.snapshot().is_empty());
    assert_eq!(engine.current_bot_id(), None);
    assert!(drain(&mut rx).contains(&EngineEvent::ChatCleared));

    // A later empty batch is an ordinary no-op
    engine.on_history(HistoryBatch::new(vec![user_history("n1", 10)]));
    engine.on_history(HistoryBatch::new(vec![]));
    assert_ids!(engine.snapshot(), ["n1"]);
}

#[test]
fn test_load_more_inserts_older_history_below_loading_placeholder() {
    let mut engine = engine_with_history(vec![user_history("c", 10), bot_history("d", 11)]);
    let mut rx = engine.subscribe();

    engine.on_connection_state(ConnectionState::LoadingMore);
    engine.on_history(HistoryBatch::new(vec![user_history("b", 5), user_history("a", 4)]));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot[0].kind, MessageKind::PlaceholderLoading);
    assert_eq!(&snapshot.ids()[1..], &["a", "b", "c", "d"]);

    engine.on_connection_state(ConnectionState::LoadedMore);
    assert_ids!(engine.snapshot(), ["a", "b", "c", "d"]);

    let scrolls: Vec<ScrollHint> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Refresh { scroll, .. } => Some(scroll),
            _ => None,
        })
        .collect();
    assert_eq!(scrolls, vec![ScrollHint::Keep, ScrollHint::Top, ScrollHint::Keep]);
}

#[test]
fn test_explicit_older_flag_wins() {
    let mut engine = engine_with_history(vec![user_history("a", 1)]);
    engine.on_history(HistoryBatch::older(vec![user_history("z", 50)]));
    assert_ids!(engine.snapshot(), ["z", "a"]);
}

#[test]
fn test_authoritative_history_prunes_deleted_messages() {
    let mut engine = engine_with_history(vec![
        user_history("a", 1),
        bot_history("b", 2),
        user_history("c", 3),
    ]);
    engine.on_history(
        HistoryBatch::new(vec![user_history("a", 1), user_history("c", 3)]).authoritative(),
    );
    assert_ids!(engine.snapshot(), ["a", "c"]);
}

#[test]
fn test_send_flow_until_answer() {
    let mut engine = engine_with_history(vec![user_history("a", 1)]);
    let mut rx = engine.subscribe();

    assert!(engine.send_user_message("Where is gate 4?"));
    assert!(engine.snapshot().has_user_or_bot_placeholders());
    assert!(!engine.send_user_message("again"));

    // Server echoes the user's message as history
    engine.on_history(HistoryBatch::new(vec![
        Message::user("u2", "Where is gate 4?").with_index(2)
    ]));
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[1].id, "u2");
    assert_eq!(snapshot[2].kind, MessageKind::PlaceholderForBot);

    engine.on_streaming_delta(delta("b3", "Gate 4", 0).with_index(3));
    assert_ids!(engine.snapshot(), ["a", "u2", "b3"]);
    assert!(!engine.snapshot().has_user_or_bot_placeholders());

    let typing: Vec<TypingState> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Typing(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        typing,
        vec![
            TypingState::PlaceholderStarted,
            TypingState::PlaceholderStopped,
            TypingState::Started
        ]
    );

    assert!(engine.send_user_message("Thanks"));
}

#[test]
fn test_remove_bot_placeholder_on_failed_send() {
    let mut engine = ReconciliationEngine::new();
    let mut rx = engine.subscribe();
    engine.send_user_message("hello?");

    assert!(engine.remove_placeholder(MessageKind::PlaceholderForBot));
    assert!(engine.remove_placeholder(MessageKind::PlaceholderForUser));
    assert!(!engine.remove_placeholder(MessageKind::Normal));
    assert!(engine.snapshot().is_empty());
    assert!(drain(&mut rx).contains(&EngineEvent::Typing(TypingState::PlaceholderStopped)));
}

#[test]
fn test_malformed_delta_keeps_store_intact() {
    let mut engine = engine_with_history(vec![user_history("a", 1)]);
    engine.on_streaming_delta(Message::bot("", "orphan text"));
    assert_ids!(engine.snapshot(), ["a"]);
}

#[test]
fn test_process_log_records_history_steps() {
    let log = Arc::new(MemoryProcessLog::new());
    let mut engine = ReconciliationEngine::with_log(log.clone());
    engine.on_history(HistoryBatch::new(vec![user_history("a", 1)]));
    engine.request_clear_chat();
    engine.on_history(HistoryBatch::new(vec![]));

    assert_eq!(
        log.sub_actions(),
        vec!["received", "mergedNewer", "received", "clearMessages"]
    );
    let records = log.records();
    assert_eq!(records[1].messages.as_ref().map(Vec::len), Some(1));
}
