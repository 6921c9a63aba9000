//! Traffic log recorder
//!
//! Append-only record of what the transport saw: connects, disconnects,
//! server responses (`on <event>`), emitted messages and their callbacks.
//! The JSON form is what [`EventReplayer`](super::EventReplayer) consumes.

use crate::shared::config::EventKeys;
use crate::shared::error::ChatError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Prefix the recorder puts in front of server response events
pub const RESPONSE_PREFIX: &str = "on ";

const EMIT_MESSAGE_EVENT: &str = "emitMessage";
const CALLBACK_EVENT: &str = "callback";

/// One recorded transport event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficLogEntry {
    pub event: String,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<Value>>,
}

impl TrafficLogEntry {
    /// Entry carrying only an event name and its data array
    pub fn new(event: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            data,
            params: None,
            key: None,
            payload: None,
            response: None,
        }
    }

    /// Event name without the `on ` response prefix
    pub fn clean_event_name(&self) -> &str {
        self.event
            .strip_prefix(RESPONSE_PREFIX)
            .unwrap_or(&self.event)
    }
}

/// Recorder for transport traffic
#[derive(Debug, Clone, Default)]
pub struct TrafficLog {
    keys: EventKeys,
    entries: Vec<TrafficLogEntry>,
}

impl TrafficLog {
    pub fn new(keys: EventKeys) -> Self {
        Self {
            keys,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[TrafficLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TrafficLogEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn log_connect(&mut self, params: Value) {
        tracing::trace!("[REPLAY] Traffic: {}, params: {}", self.keys.connect, params);
        let mut entry = TrafficLogEntry::new(self.keys.connect.clone(), Vec::new());
        entry.params = Some(params);
        self.entries.push(entry);
    }

    pub fn log_disconnect(&mut self) {
        tracing::trace!("[REPLAY] Traffic: {}", self.keys.disconnect);
        self.entries
            .push(TrafficLogEntry::new(self.keys.disconnect.clone(), Vec::new()));
    }

    /// Record a server response; stored as `on <named>`
    pub fn log_on_response(&mut self, named: &str, data: Vec<Value>) {
        tracing::trace!("[REPLAY] Traffic: on response `{}`", named);
        self.entries.push(TrafficLogEntry::new(
            format!("{}{}", RESPONSE_PREFIX, named),
            data,
        ));
    }

    pub fn log_emit_message(&mut self, key: &str, payload: Value) {
        tracing::trace!("[REPLAY] Traffic: emitMessage `{}`", key);
        let mut entry = TrafficLogEntry::new(EMIT_MESSAGE_EVENT, Vec::new());
        entry.key = Some(key.to_string());
        entry.payload = Some(payload);
        self.entries.push(entry);
    }

    pub fn log_callback(&mut self, key: &str, payload: Value, response: Vec<Value>) {
        tracing::trace!("[REPLAY] Traffic: callback `{}`", key);
        let mut entry = TrafficLogEntry::new(CALLBACK_EVENT, Vec::new());
        entry.key = Some(key.to_string());
        entry.payload = Some(payload);
        entry.response = Some(response);
        self.entries.push(entry);
    }

    pub fn to_json(&self) -> Result<String, ChatError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ChatError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(
            "[REPLAY] Saved {} traffic entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Parse a JSON array of entries
    pub fn parse(source: &str) -> Result<Vec<TrafficLogEntry>, ChatError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Vec<TrafficLogEntry>, ChatError> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }
}
