/**
 * Message Record
 *
 * This module defines the canonical value type for a single chat message
 * together with the identity and ordering metadata the reconciliation core
 * needs: the transport-assigned id, the streaming part number, the batch
 * index and the receipt timestamp.
 *
 * Records are created either locally (placeholders) or from transport
 * events, and are mutated in place as further deltas for the same id arrive.
 */
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Transport-assigned message identity
pub type MessageId = String;

/// Provenance of the most recent mutation of a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Delivered inside a history snapshot
    #[default]
    History,
    /// Incremental fragment of an in-progress response
    StreamingDelta,
    /// Correction of a previously delivered message
    UpdateItem,
}

impl MessageOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOrigin::History => "history",
            MessageOrigin::StreamingDelta => "streaming_delta",
            MessageOrigin::UpdateItem => "update_item",
        }
    }
}

/// Transient UI state marker
///
/// Everything except `Normal` is synthesized locally and never comes from
/// the transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Normal,
    /// Locally typed user text awaiting the transport echo
    PlaceholderForUser,
    /// "Bot is typing" indicator
    PlaceholderForBot,
    /// "Loading more" indicator shown at the top of the list
    PlaceholderLoading,
}

impl MessageKind {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, MessageKind::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Normal => "normal",
            MessageKind::PlaceholderForUser => "placeholder_for_user",
            MessageKind::PlaceholderForBot => "placeholder_for_bot",
            MessageKind::PlaceholderLoading => "placeholder_loading",
        }
    }
}

/// A single chat message
///
/// Only `id` is required when decoding from a transport payload; every other
/// field falls back to its default so partially filled payloads (typical for
/// the first streaming fragment) still decode.
///
/// # Example
/// ```rust
/// use chatline::shared::Message;
///
/// let message = Message::bot("m1", "Hel").with_part(1);
/// assert_eq!(message.id, "m1");
/// assert!(message.is_bot);
/// assert!(!message.is_finished);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Stable identity, unique per logical message
    pub id: MessageId,
    /// Current display text (empty while a stream has produced nothing yet)
    #[serde(default)]
    pub text: String,
    /// Provenance of the most recent mutation
    #[serde(default)]
    pub origin: MessageOrigin,
    /// Ordinal of this fragment within the message's streaming sequence
    #[serde(default)]
    pub part_number: u32,
    /// Ordering key among sibling messages of one batch
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub is_bot: bool,
    /// No further deltas are expected
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub kind: MessageKind,
    /// RFC3339 receipt time; tie-breaker after `index`
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    /// Create a finished, user-authored message
    pub fn user(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            origin: MessageOrigin::History,
            part_number: 0,
            index: 0,
            is_bot: false,
            is_finished: true,
            kind: MessageKind::Normal,
            timestamp: now_timestamp(),
        }
    }

    /// Create an unfinished bot message, as carried by a first streaming delta
    pub fn bot(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            origin: MessageOrigin::StreamingDelta,
            part_number: 0,
            index: 0,
            is_bot: true,
            is_finished: false,
            kind: MessageKind::Normal,
            timestamp: now_timestamp(),
        }
    }

    /// The empty sentinel the transport emits as a heartbeat
    pub fn none() -> Self {
        Self {
            id: MessageId::new(),
            text: String::new(),
            origin: MessageOrigin::StreamingDelta,
            part_number: 0,
            index: 0,
            is_bot: false,
            is_finished: false,
            kind: MessageKind::Normal,
            timestamp: String::new(),
        }
    }

    /// Synthesize a local-only placeholder with a fresh id
    pub fn placeholder(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id: format!("local-{}", uuid::Uuid::new_v4()),
            text: text.into(),
            origin: MessageOrigin::History,
            part_number: 0,
            index: 0,
            is_bot: matches!(kind, MessageKind::PlaceholderForBot),
            is_finished: false,
            kind,
            timestamp: now_timestamp(),
        }
    }

    pub fn with_part(mut self, part_number: u32) -> Self {
        self.part_number = part_number;
        self
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_origin(mut self, origin: MessageOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn finished(mut self) -> Self {
        self.is_finished = true;
        self
    }

    /// True for the empty heartbeat sentinel (see [`Message::none`])
    pub fn is_default_empty(&self) -> bool {
        self.id.is_empty() && self.text.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind.is_placeholder()
    }

    pub fn is_user_or_bot_placeholder(&self) -> bool {
        matches!(
            self.kind,
            MessageKind::PlaceholderForUser | MessageKind::PlaceholderForBot
        )
    }

    /// Whether the UI should pulse this record to signal an after-the-fact change
    pub fn wants_flash(&self) -> bool {
        self.is_finished && self.origin == MessageOrigin::UpdateItem
    }

    /// Copy the transport-owned mutable state of `other` into this record.
    ///
    /// Identity, position, index and kind stay untouched.
    pub fn absorb(&mut self, other: &Message) -> bool {
        let changed = self.text != other.text
            || self.part_number != other.part_number
            || self.is_finished != other.is_finished
            || self.origin != other.origin;
        self.text.clone_from(&other.text);
        self.part_number = other.part_number;
        self.is_finished = other.is_finished;
        self.origin = other.origin;
        if !other.timestamp.is_empty() && self.timestamp.is_empty() {
            self.timestamp.clone_from(&other.timestamp);
        }
        changed
    }

    /// Compare two records by `(index, timestamp)`
    pub fn ordering_cmp(&self, other: &Message) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| compare_timestamps(&self.timestamp, &other.timestamp))
    }

    /// Flat dictionary view used by the process and traffic logs
    pub fn to_log_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "text": self.text,
            "type": self.kind.as_str(),
            "origin": self.origin.as_str(),
            "messagePart": self.part_number.to_string(),
            "messageIndex": self.index.to_string(),
            "isBot": self.is_bot.to_string(),
            "isPlaceholder": self.is_placeholder().to_string(),
            "isFinished": self.is_finished.to_string(),
            "timestamp": self.timestamp,
        })
    }
}

/// Compare RFC3339 timestamps chronologically.
///
/// Unparseable values sort before parseable ones and fall back to a plain
/// string comparison among themselves.
pub fn compare_timestamps(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| chrono::DateTime::parse_from_rfc3339(value).ok();
    match (parse(left), parse(right)) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => left.cmp(right),
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
