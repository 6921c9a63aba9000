/**
 * Transport and Engine Events
 *
 * This module defines the typed events flowing into and out of the
 * reconciliation core:
 *
 * - Inbound events produced by the transport collaborator (already decoded
 *   from the socket protocol): history batches, streaming deltas, update
 *   items and connection state changes.
 * - Outbound notifications the engine broadcasts to renderers: refresh with
 *   a snapshot, flash hints, typing state and connection changes.
 */
use crate::shared::message::{Message, MessageId};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Full or partial snapshot of past messages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryBatch {
    pub messages: Vec<Message>,
    /// Transport says this batch extends the top of the list ("load more")
    #[serde(default)]
    pub is_older: bool,
    /// The batch is definitive for the index range it covers; stored records
    /// in that range that the batch does not mention are pruned
    #[serde(default)]
    pub authoritative: bool,
}

impl HistoryBatch {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            is_older: false,
            authoritative: false,
        }
    }

    pub fn older(messages: Vec<Message>) -> Self {
        Self {
            messages,
            is_older: true,
            authoritative: false,
        }
    }

    pub fn authoritative(mut self) -> Self {
        self.authoritative = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Transport connection state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
    Loading,
    Loaded,
    LoadingMore,
    LoadedMore,
    Error(String),
}

impl ConnectionState {
    /// Parse the bare state names used in traffic logs
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "loading" => Some(Self::Loading),
            "loaded" => Some(Self::Loaded),
            "loading_more" | "loadingMore" => Some(Self::LoadingMore),
            "loaded_more" | "loadedMore" => Some(Self::LoadedMore),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Event delivered by the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    History(HistoryBatch),
    StreamingDelta(Message),
    UpdateItem(Message),
    Connection(ConnectionState),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::History(_) => "history",
            TransportEvent::StreamingDelta(_) => "streaming_delta",
            TransportEvent::UpdateItem(_) => "update_item",
            TransportEvent::Connection(_) => "connection",
        }
    }
}

/// Immutable ordered view of the message store
///
/// Cheap to clone; the renderer diffs consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSnapshot(Arc<[Message]>);

impl MessageSnapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        Self(messages.into())
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.0.iter().find(|message| message.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|message| message.id == id)
    }

    pub fn has_user_or_bot_placeholders(&self) -> bool {
        self.0.iter().any(Message::is_user_or_bot_placeholder)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|message| message.id.as_str()).collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.0.iter().map(|message| message.text.as_str()).collect()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.0.to_vec()
    }
}

impl Deref for MessageSnapshot {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Where the renderer should scroll after applying a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollHint {
    Top,
    Bottom,
    Keep,
}

/// Bot typing indicator transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    /// Bot placeholder inserted after a user send
    PlaceholderStarted,
    /// Bot placeholder superseded or removed
    PlaceholderStopped,
    /// First delta of a bot stream arrived
    Started,
    /// Active bot stream finished
    Finished,
}

/// Notification broadcast by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Refresh {
        snapshot: MessageSnapshot,
        scroll: ScrollHint,
    },
    /// The message changed after the fact; the UI should draw attention to it
    Flash { id: MessageId },
    Typing(TypingState),
    Connection(ConnectionState),
    /// A pending clear-chat request was confirmed by an empty history batch
    ChatCleared,
}
