//! # Event Replay Log
//!
//! Feeds a recorded traffic log through a [`ReconciliationEngine`] one event
//! at a time, so tests can assert store state between steps without a
//! network.
//!
//! Entries are `{event, data}` records. Server responses are recorded as
//! `on <event>`; the prefix is stripped before dispatch. Entries named in
//! the skip set are passed over, as are event kinds the replayer does not
//! recognize (recorder-only entries such as `emitMessage`).
//!
//! ```rust
//! use chatline::client::replay::{EventReplayer, TrafficLogEntry};
//! use chatline::client::ReconciliationEngine;
//! use serde_json::json;
//!
//! let entries = vec![
//!     TrafficLogEntry::new("on stream_message", vec![json!({"id": "m1", "text": "Hel", "is_bot": true})]),
//!     TrafficLogEntry::new("on stream_message", vec![json!({"id": "m1", "text": "Hello", "is_bot": true, "part_number": 1})]),
//! ];
//! let mut engine = ReconciliationEngine::new();
//! let mut replayer = EventReplayer::new(entries);
//!
//! replayer.next(&mut engine);
//! assert_eq!(engine.snapshot().texts(), vec!["Hel"]);
//! replayer.next(&mut engine);
//! assert_eq!(engine.snapshot().texts(), vec!["Hello"]);
//! assert!(!replayer.has_more());
//! ```

pub mod traffic_log;

pub use traffic_log::{TrafficLog, TrafficLogEntry};

use crate::client::reconciliation::ReconciliationEngine;
use crate::shared::config::{ChatConfig, EventKeys};
use crate::shared::error::ChatError;
use crate::shared::event::{ConnectionState, HistoryBatch, TransportEvent};
use crate::shared::message::Message;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};

/// Result of one `next()` call
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    /// Position of the entry in the original log
    pub index: usize,
    /// Event name with any `on ` prefix removed
    pub event: String,
    pub outcome: ReplayOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// Number of transport events dispatched to the engine
    Applied(usize),
    /// Payload could not be decoded; the entry is consumed
    Malformed(ChatError),
}

/// Step-by-step replayer over recorded traffic
#[derive(Debug)]
pub struct EventReplayer {
    entries: VecDeque<TrafficLogEntry>,
    next_index: usize,
    events_to_skip: BTreeSet<String>,
    keys: EventKeys,
}

impl EventReplayer {
    pub fn new(entries: Vec<TrafficLogEntry>) -> Self {
        Self::with_options(entries, BTreeSet::new(), EventKeys::default())
    }

    pub fn with_options(
        entries: Vec<TrafficLogEntry>,
        events_to_skip: BTreeSet<String>,
        keys: EventKeys,
    ) -> Self {
        tracing::info!("[REPLAY] Traffic log entries: {}", entries.len());
        Self {
            entries: entries.into(),
            next_index: 0,
            events_to_skip,
            keys,
        }
    }

    /// Use the configured event names and default skip set
    pub fn from_config(entries: Vec<TrafficLogEntry>, config: &ChatConfig) -> Self {
        Self::with_options(
            entries,
            config.events_to_skip.clone(),
            config.event_keys.clone(),
        )
    }

    /// Whether another `next()` call would dispatch an entry.
    ///
    /// Skipped and unknown entries do not count; see [`remaining`](Self::remaining)
    /// for the raw entry count.
    pub fn has_more(&self) -> bool {
        self.entries.iter().any(|entry| self.is_replayable(entry))
    }

    /// Index the next consumed entry will have
    pub fn current_index(&self) -> usize {
        self.next_index
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Dispatch the next replayable entry.
    ///
    /// Skipped and unknown entries are consumed silently until one entry is
    /// dispatched or the log runs out. Returns `None` once nothing was
    /// dispatched.
    pub fn next(&mut self, engine: &mut ReconciliationEngine) -> Option<ReplayStep> {
        while let Some(entry) = self.entries.pop_front() {
            let index = self.next_index;
            self.next_index += 1;

            let event = entry.clean_event_name().to_string();
            if self.is_skipped(&entry) {
                tracing::debug!("[REPLAY] Skipping event: {}", entry.event);
                continue;
            }

            let outcome = match decode_entry(&entry, &self.keys) {
                Ok(events) => {
                    tracing::info!("[REPLAY] Replaying [{}]: {}", index, event);
                    let count = events.len();
                    for transport_event in events {
                        engine.handle(transport_event);
                    }
                    ReplayOutcome::Applied(count)
                }
                Err(err @ ChatError::UnknownReplayEvent { .. }) => {
                    tracing::warn!("[REPLAY] {}", err);
                    continue;
                }
                Err(err) => {
                    tracing::warn!("[REPLAY] [{}] {}", index, err);
                    ReplayOutcome::Malformed(err)
                }
            };

            return Some(ReplayStep {
                index,
                event,
                outcome,
            });
        }
        None
    }

    fn is_skipped(&self, entry: &TrafficLogEntry) -> bool {
        self.events_to_skip.contains(&entry.event)
            || self.events_to_skip.contains(entry.clean_event_name())
    }

    fn is_replayable(&self, entry: &TrafficLogEntry) -> bool {
        !self.is_skipped(entry) && self.keys.contains(entry.clean_event_name())
    }

    /// Replay everything that is left; returns the dispatched steps
    pub fn run_to_end(&mut self, engine: &mut ReconciliationEngine) -> Vec<ReplayStep> {
        let mut steps = Vec::new();
        while let Some(step) = self.next(engine) {
            steps.push(step);
        }
        steps
    }
}

/// Turn one log entry into the transport events it represents
pub fn decode_entry(
    entry: &TrafficLogEntry,
    keys: &EventKeys,
) -> Result<Vec<TransportEvent>, ChatError> {
    let event = entry.clean_event_name();

    if event == keys.connect {
        Ok(vec![TransportEvent::Connection(ConnectionState::Connected)])
    } else if event == keys.disconnect {
        Ok(vec![TransportEvent::Connection(ConnectionState::Disconnected)])
    } else if event == keys.error {
        let reason = match first_payload(entry, event)? {
            Value::String(reason) => reason.clone(),
            other => other.to_string(),
        };
        Ok(vec![TransportEvent::Connection(ConnectionState::Error(reason))])
    } else if event == keys.connection_state {
        let name = first_payload(entry, event)?
            .as_str()
            .ok_or_else(|| ChatError::malformed(event, "state name must be a string"))?;
        let state = ConnectionState::from_name(name)
            .ok_or_else(|| ChatError::malformed(event, format!("unknown state '{}'", name)))?;
        Ok(vec![TransportEvent::Connection(state)])
    } else if event == keys.send_history_snapshot {
        Ok(vec![TransportEvent::History(decode_history(
            first_payload(entry, event)?,
            event,
        )?)])
    } else if event == keys.stream_message {
        let messages = decode_messages(first_payload(entry, event)?, event)?;
        Ok(messages.into_iter().map(TransportEvent::StreamingDelta).collect())
    } else if event == keys.update_history_item {
        let messages = decode_messages(first_payload(entry, event)?, event)?;
        Ok(messages.into_iter().map(TransportEvent::UpdateItem).collect())
    } else {
        Err(ChatError::unknown_event(event))
    }
}

fn first_payload<'a>(entry: &'a TrafficLogEntry, event: &str) -> Result<&'a Value, ChatError> {
    entry
        .data
        .first()
        .ok_or_else(|| ChatError::malformed(event, "missing data payload"))
}

fn decode_history(payload: &Value, event: &str) -> Result<HistoryBatch, ChatError> {
    match payload {
        Value::Array(_) => {
            let messages: Vec<Message> = serde_json::from_value(payload.clone())
                .map_err(|e| ChatError::malformed(event, e.to_string()))?;
            Ok(HistoryBatch::new(messages))
        }
        Value::Object(_) => serde_json::from_value(payload.clone())
            .map_err(|e| ChatError::malformed(event, e.to_string())),
        _ => Err(ChatError::malformed(
            event,
            "history payload must be an array or object",
        )),
    }
}

fn decode_messages(payload: &Value, event: &str) -> Result<Vec<Message>, ChatError> {
    let decode = |value: &Value| {
        serde_json::from_value::<Message>(value.clone())
            .map_err(|e| ChatError::malformed(event, e.to_string()))
    };
    match payload {
        Value::Array(items) => items.iter().map(decode).collect(),
        Value::Object(_) => Ok(vec![decode(payload)?]),
        _ => Err(ChatError::malformed(
            event,
            "message payload must be an object or array",
        )),
    }
}
