//! Message and traffic log fixtures

use chatline::client::replay::TrafficLogEntry;
use chatline::client::ReconciliationEngine;
use chatline::shared::{EngineEvent, Message};
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// Finished history record authored by the user
pub fn user_history(id: &str, index: i64) -> Message {
    Message::user(id, format!("user {}", id)).with_index(index)
}

/// Finished history record authored by the bot
pub fn bot_history(id: &str, index: i64) -> Message {
    Message::bot(id, format!("bot {}", id))
        .with_index(index)
        .finished()
}

/// Unfinished bot fragment
pub fn delta(id: &str, text: &str, part: u32) -> Message {
    Message::bot(id, text).with_part(part)
}

/// Collect every notification currently queued
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn stream_entry(payload: Value) -> TrafficLogEntry {
    TrafficLogEntry::new("on stream_message", vec![payload])
}

pub fn update_entry(payload: Value) -> TrafficLogEntry {
    TrafficLogEntry::new("on update_history_item", vec![payload])
}

pub fn history_entry(payload: Value) -> TrafficLogEntry {
    TrafficLogEntry::new("on send_history_snapshot", vec![payload])
}

/// A recorded session: history, a user question, a streamed answer that is
/// corrected afterwards, and a transport hiccup
pub fn recorded_session() -> Vec<TrafficLogEntry> {
    vec![
        TrafficLogEntry::new("connect", vec![]),
        history_entry(json!([
            {"id": "h1", "text": "Hello", "index": 1, "is_finished": true},
            {"id": "h2", "text": "Hi, how can I help?", "index": 2, "is_bot": true, "is_finished": true},
        ])),
        TrafficLogEntry::new("emitMessage", vec![]),
        history_entry(json!([
            {"id": "u3", "text": "Where is gate 4?", "index": 3, "is_finished": true},
        ])),
        stream_entry(json!({"id": "b4", "text": "Gate 4", "is_bot": true, "index": 4})),
        stream_entry(json!({"id": "b4", "text": "Gate 4 is", "is_bot": true, "index": 4, "part_number": 1})),
        stream_entry(json!({"id": "b4", "text": "Gate", "is_bot": true, "index": 4, "part_number": 0})),
        update_entry(json!({"id": "b4", "text": "Gate 4 is in terminal B.", "is_bot": true, "index": 4, "part_number": 2, "is_finished": true})),
        TrafficLogEntry::new("on error", vec![json!("socket timeout")]),
        TrafficLogEntry::new("on disconnect", vec![]),
    ]
}

/// Engine that has already received `messages` as its initial history
pub fn engine_with_history(messages: Vec<Message>) -> ReconciliationEngine {
    let mut engine = ReconciliationEngine::new();
    engine.on_history(chatline::shared::HistoryBatch::new(messages));
    engine
}
