//! # Reconciliation Engine
//!
//! Single entry point for everything the transport delivers. Forwards the
//! three message feeds to the [`MessageStore`], tracks which bot message (if
//! any) is currently being composed, finalizes clear-chat requests and
//! broadcasts [`EngineEvent`]s to renderers.
//!
//! ## Composing state
//!
//! ```text
//! idle --(first unfinished bot delta for id X)--> composing(X)
//! composing(X) --(finished delta/update/history record for X)--> idle
//! ```
//!
//! A delta for a second bot id while composing is accepted into the store
//! but does not change the composing id.
//!
//! ## Clear chat
//!
//! `request_clear_chat` only raises a flag. The store is emptied when the
//! next history batch arrives empty, confirming the server side cleared too.
//!
//! ## Usage
//!
//! ```rust
//! use chatline::client::ReconciliationEngine;
//! use chatline::shared::Message;
//!
//! let mut engine = ReconciliationEngine::new();
//! engine.on_streaming_delta(Message::bot("m1", "Hel"));
//! assert_eq!(engine.current_bot_id(), Some("m1"));
//!
//! engine.on_update(Message::bot("m1", "Hello!").with_part(1).finished());
//! assert_eq!(engine.current_bot_id(), None);
//! ```

use crate::client::process_log::{ProcessAction, ProcessLog, TracingProcessLog};
use crate::client::store::{HistoryDirection, MergeEffect, MergeOutcome, MessageStore};
use crate::shared::config::ChatConfig;
use crate::shared::error::ChatError;
use crate::shared::event::{
    ConnectionState, EngineEvent, HistoryBatch, MessageSnapshot, ScrollHint, TransportEvent,
    TypingState,
};
use crate::shared::message::{Message, MessageId, MessageKind};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel carrying engine notifications
pub type EngineEventBroadcast = broadcast::Sender<EngineEvent>;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Reconciles transport feeds into the message store
pub struct ReconciliationEngine {
    store: MessageStore,
    current_bot_id: Option<MessageId>,
    pending_clear: bool,
    connection: ConnectionState,
    events: EngineEventBroadcast,
    log: Arc<dyn ProcessLog>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("messages", &self.store.len())
            .field("current_bot_id", &self.current_bot_id)
            .field("pending_clear", &self.pending_clear)
            .field("connection", &self.connection)
            .finish()
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    /// Engine with a tracing-backed process log
    pub fn new() -> Self {
        Self::with_log(Arc::new(TracingProcessLog))
    }

    pub fn with_log(log: Arc<dyn ProcessLog>) -> Self {
        Self::build(log, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn from_config(config: &ChatConfig, log: Arc<dyn ProcessLog>) -> Self {
        Self::build(log, config.event_channel_capacity)
    }

    fn build(log: Arc<dyn ProcessLog>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            store: MessageStore::new(),
            current_bot_id: None,
            pending_clear: false,
            connection: ConnectionState::default(),
            events,
            log,
        }
    }

    /// Register a renderer for engine notifications
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> MessageSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Id of the bot message currently being streamed
    pub fn current_bot_id(&self) -> Option<&str> {
        self.current_bot_id.as_deref()
    }

    pub fn is_bot_composing(&self) -> bool {
        self.current_bot_id.is_some()
    }

    pub fn is_clear_pending(&self) -> bool {
        self.pending_clear
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    /// Dispatch any transport event to its handler
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::History(batch) => self.on_history(batch),
            TransportEvent::StreamingDelta(message) => self.on_streaming_delta(message),
            TransportEvent::UpdateItem(message) => self.on_update(message),
            TransportEvent::Connection(state) => self.on_connection_state(state),
        }
    }

    /// Apply a history batch.
    ///
    /// An empty batch while a clear-chat request is pending empties the
    /// store and resets the composing state.
    pub fn on_history(&mut self, batch: HistoryBatch) {
        self.log.log(
            ProcessAction::ProcessHistoryMessages,
            "received",
            None,
            Some(&batch.messages),
        );

        if batch.is_empty() && self.pending_clear {
            tracing::info!("[ENGINE] Empty history confirms clear chat");
            self.pending_clear = false;
            self.store.clear();
            self.current_bot_id = None;
            self.log
                .log(ProcessAction::ProcessHistoryMessages, "clearMessages", None, None);
            self.emit(EngineEvent::ChatCleared);
            self.emit_refresh(ScrollHint::Keep);
            return;
        }

        let scroll = match self.store.upsert_from_history(&batch) {
            Some(outcome) => {
                self.log.log(
                    ProcessAction::ProcessHistoryMessages,
                    match outcome.direction {
                        HistoryDirection::Older => "mergedOlder",
                        HistoryDirection::Newer => "mergedNewer",
                    },
                    None,
                    Some(self.store.messages()),
                );
                if outcome.rejected > 0 {
                    tracing::warn!(
                        "[ENGINE] {}",
                        ChatError::malformed(
                            "history",
                            format!("{} entries without id", outcome.rejected)
                        )
                    );
                }
                match outcome.direction {
                    HistoryDirection::Older => ScrollHint::Top,
                    HistoryDirection::Newer => ScrollHint::Bottom,
                }
            }
            None => {
                tracing::debug!("[ENGINE] Empty history batch without pending clear");
                ScrollHint::Keep
            }
        };

        let finished_active = self
            .current_bot_id
            .as_deref()
            .and_then(|id| self.store.get(id))
            .is_some_and(|message| message.is_finished);
        if finished_active {
            self.finish_composing();
        }

        self.emit_refresh(scroll);
    }

    /// Apply an incremental fragment of a streaming message
    pub fn on_streaming_delta(&mut self, message: Message) {
        if message.is_default_empty() {
            tracing::debug!("[ENGINE] Skipping empty subscription message");
            self.emit_refresh(ScrollHint::Keep);
            return;
        }
        self.log.log(
            ProcessAction::ProcessStreamingMessage,
            "received",
            Some(&message),
            None,
        );

        let outcome = match self.store.apply_streaming_delta(message.clone()) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("[ENGINE] {}", err);
                self.emit_refresh(ScrollHint::Keep);
                return;
            }
        };
        self.log_merge(ProcessAction::ProcessStreamingMessage, &outcome, &message);
        self.emit_superseded(&outcome);

        if outcome.effect != MergeEffect::Ignored {
            self.track_composing(&message);
        }
        self.emit_refresh(ScrollHint::Bottom);
    }

    /// Apply a correction to a previously delivered message
    pub fn on_update(&mut self, message: Message) {
        if message.is_default_empty() {
            tracing::debug!("[ENGINE] Skipping empty update message");
            self.emit_refresh(ScrollHint::Keep);
            return;
        }
        self.log.log(
            ProcessAction::ProcessUpdatedMessage,
            "received",
            Some(&message),
            None,
        );

        let outcome = match self.store.apply_update(message.clone()) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("[ENGINE] {}", err);
                self.emit_refresh(ScrollHint::Keep);
                return;
            }
        };
        self.log_merge(ProcessAction::ProcessUpdatedMessage, &outcome, &message);
        self.emit_superseded(&outcome);

        if outcome.effect != MergeEffect::Ignored {
            self.track_composing(&message);
        }
        self.emit_refresh(ScrollHint::Keep);
        if outcome.flash {
            self.emit(EngineEvent::Flash {
                id: message.id.clone(),
            });
        }
    }

    /// Remember that the user asked to clear the chat.
    ///
    /// The store is not touched until an empty history batch confirms it.
    pub fn request_clear_chat(&mut self) {
        tracing::info!("[ENGINE] Clear chat requested");
        self.pending_clear = true;
        self.emit_refresh(ScrollHint::Keep);
    }

    /// Record a transport connection change
    pub fn on_connection_state(&mut self, state: ConnectionState) {
        tracing::debug!("[ENGINE] Connection state: {:?}", state);
        self.connection = state.clone();

        let changed = match &state {
            ConnectionState::LoadingMore => {
                let result = self.store.insert_loading_placeholder().map(|_| ());
                self.swallow(result)
            }
            ConnectionState::LoadedMore => self.store.remove_placeholder(MessageKind::PlaceholderLoading),
            ConnectionState::Error(reason) => {
                tracing::warn!("[ENGINE] Transport error: {}", reason);
                false
            }
            _ => false,
        };

        self.emit(EngineEvent::Connection(state));
        if changed {
            self.emit_refresh(ScrollHint::Keep);
        }
    }

    /// Show the user's text immediately, followed by a typing indicator.
    ///
    /// Returns `false` without touching the store when the text is blank or
    /// a previous send is still waiting for the transport.
    pub fn send_user_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if self.store.has_user_or_bot_placeholders() {
            tracing::debug!("[ENGINE] Placeholders already present, ignoring send");
            return false;
        }
        let inserted = self.insert_user_placeholder(text);
        if inserted {
            self.insert_bot_placeholder();
        }
        inserted
    }

    /// Insert the local user placeholder; duplicates are ignored
    pub fn insert_user_placeholder(&mut self, text: &str) -> bool {
        let result = self.store.insert_user_placeholder(text).map(|_| ());
        let inserted = self.swallow(result);
        if inserted {
            self.emit_refresh(ScrollHint::Bottom);
        }
        inserted
    }

    /// Insert the "bot is typing" placeholder; duplicates are ignored
    pub fn insert_bot_placeholder(&mut self) -> bool {
        if self.current_bot_id.is_some() {
            tracing::debug!("[ENGINE] Bot already composing, no placeholder needed");
            return false;
        }
        let result = self.store.insert_bot_placeholder().map(|_| ());
        let inserted = self.swallow(result);
        if inserted {
            self.emit(EngineEvent::Typing(TypingState::PlaceholderStarted));
            self.emit_refresh(ScrollHint::Bottom);
        }
        inserted
    }

    pub fn remove_placeholder(&mut self, kind: MessageKind) -> bool {
        let removed = self.store.remove_placeholder(kind);
        if removed {
            if kind == MessageKind::PlaceholderForBot {
                self.emit(EngineEvent::Typing(TypingState::PlaceholderStopped));
            }
            self.emit_refresh(ScrollHint::Keep);
        }
        removed
    }

    /// Duplicate placeholders are expected under double submission
    fn swallow(&self, result: Result<(), ChatError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("[ENGINE] {}", err);
                false
            }
        }
    }

    fn track_composing(&mut self, message: &Message) {
        match self.current_bot_id.as_deref() {
            None => {
                if message.is_bot && !message.is_finished {
                    tracing::debug!("[ENGINE] Bot started composing {}", message.id);
                    self.current_bot_id = Some(message.id.clone());
                    self.emit(EngineEvent::Typing(TypingState::Started));
                }
            }
            Some(active) if active == message.id => {
                if message.is_finished {
                    self.finish_composing();
                }
            }
            Some(active) => {
                if message.is_bot && !message.is_finished {
                    tracing::debug!(
                        "[ENGINE] Ignoring second bot stream {} while {} is composing",
                        message.id,
                        active
                    );
                }
            }
        }
    }

    fn finish_composing(&mut self) {
        if let Some(id) = self.current_bot_id.take() {
            tracing::debug!("[ENGINE] Bot finished composing {}", id);
            self.emit(EngineEvent::Typing(TypingState::Finished));
        }
    }

    fn log_merge(&self, action: ProcessAction, outcome: &MergeOutcome, message: &Message) {
        let sub_action = match outcome.effect {
            MergeEffect::Ignored => "ignoredStale",
            MergeEffect::Inserted => "inserted",
            MergeEffect::Updated => "updatedInPlace",
            MergeEffect::Unchanged => "unchanged",
        };
        self.log.log(action, sub_action, Some(message), None);
    }

    fn emit_superseded(&self, outcome: &MergeOutcome) {
        if outcome.superseded.contains(&MessageKind::PlaceholderForBot) {
            self.emit(EngineEvent::Typing(TypingState::PlaceholderStopped));
        }
    }

    fn emit_refresh(&self, scroll: ScrollHint) {
        self.emit(EngineEvent::Refresh {
            snapshot: self.store.snapshot(),
            scroll,
        });
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.events.send(event) {
            tracing::trace!("[ENGINE] No subscribers to receive event: {:?}", e.0);
        }
    }
}
