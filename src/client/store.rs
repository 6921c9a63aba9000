//! # Message Store
//!
//! Single source of truth for the ordered, deduplicated list of chat
//! messages. Owns the merge rules for the three transport feeds and the
//! local placeholder records.
//!
//! ## Ordering
//!
//! - History batches are applied in `(index, timestamp)` order.
//! - A record keeps the position it was first inserted at; later deltas
//!   and updates for the same id rewrite it in place.
//! - Older history goes to the top (below a "loading more" placeholder),
//!   newer history to the bottom (above trailing user/bot placeholders).
//!
//! ## Usage
//!
//! ```rust
//! use chatline::client::store::MessageStore;
//! use chatline::shared::Message;
//!
//! let mut store = MessageStore::new();
//! store.apply_streaming_delta(Message::bot("m1", "Hel")).unwrap();
//! store.apply_streaming_delta(Message::bot("m1", "Hello").with_part(1)).unwrap();
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.texts(), vec!["Hello"]);
//! ```

use crate::debug;
use crate::shared::error::ChatError;
use crate::shared::event::{HistoryBatch, MessageSnapshot};
use crate::shared::message::{Message, MessageKind, MessageOrigin};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Which end of the list a history batch extends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    /// Extends the top ("load more")
    Older,
    /// Extends or refreshes the bottom (initial sync, resync)
    Newer,
}

/// Result of merging a history batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOutcome {
    pub direction: HistoryDirection,
    pub inserted: usize,
    pub updated: usize,
    pub pruned: usize,
    /// Entries dropped because they carried no id
    pub rejected: usize,
}

/// What a single-message merge did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeEffect {
    /// Sentinel or stale payload; store untouched
    Ignored,
    Inserted,
    Updated,
    /// Matched an existing record whose content was already identical
    Unchanged,
}

/// Result of applying a streaming delta or update item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub effect: MergeEffect,
    /// Placeholder kinds removed because the transport record replaced them
    pub superseded: Vec<MessageKind>,
    /// The UI should pulse the record
    pub flash: bool,
}

impl MergeOutcome {
    fn ignored() -> Self {
        Self {
            effect: MergeEffect::Ignored,
            superseded: Vec::new(),
            flash: false,
        }
    }

    pub fn changed_store(&self) -> bool {
        matches!(self.effect, MergeEffect::Inserted | MergeEffect::Updated)
            || !self.superseded.is_empty()
    }
}

/// Ordered, deduplicated message collection
///
/// Not synchronized: all mutations must happen on one sequential context.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    pub fn has_placeholder(&self, kind: MessageKind) -> bool {
        self.messages.iter().any(|message| message.kind == kind)
    }

    pub fn has_user_or_bot_placeholders(&self) -> bool {
        self.messages.iter().any(Message::is_user_or_bot_placeholder)
    }

    /// Read-only ordered view for the renderer
    pub fn snapshot(&self) -> MessageSnapshot {
        MessageSnapshot::new(self.messages.clone())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Decide whether `batch` extends the top or the bottom of the list.
    ///
    /// A transport `is_older` flag wins. Otherwise the batch is older when
    /// its smallest `(index, timestamp)` key sorts strictly before the
    /// smallest key among the stored transport records.
    pub fn classify_history(&self, batch: &HistoryBatch) -> HistoryDirection {
        if batch.is_older {
            return HistoryDirection::Older;
        }
        let store_min = self
            .messages
            .iter()
            .filter(|message| !message.is_placeholder())
            .min_by(|a, b| a.ordering_cmp(b));
        let batch_min = batch.messages.iter().min_by(|a, b| a.ordering_cmp(b));

        match (batch_min, store_min) {
            (Some(batch_min), Some(store_min))
                if batch_min.ordering_cmp(store_min) == Ordering::Less =>
            {
                HistoryDirection::Older
            }
            _ => HistoryDirection::Newer,
        }
    }

    /// Merge a history batch.
    ///
    /// Returns `None` for an empty batch, which leaves the store untouched.
    pub fn upsert_from_history(&mut self, batch: &HistoryBatch) -> Option<HistoryOutcome> {
        if batch.is_empty() {
            return None;
        }

        let direction = self.classify_history(batch);
        let mut outcome = HistoryOutcome {
            direction,
            inserted: 0,
            updated: 0,
            pruned: 0,
            rejected: 0,
        };

        let mut ordered: Vec<&Message> = batch.messages.iter().collect();
        ordered.sort_by(|a, b| a.ordering_cmp(b));

        let mut top_cursor = self.top_insert_position();
        for incoming in ordered {
            if incoming.id.is_empty() {
                tracing::warn!("[STORE] Dropping history entry without id");
                outcome.rejected += 1;
                continue;
            }
            let incoming = normalized(incoming, MessageOrigin::History);

            if let Some(position) = self.position(&incoming.id) {
                let existing = &mut self.messages[position];
                if supersedes(existing, &incoming) && existing.absorb(&incoming) {
                    outcome.updated += 1;
                }
                continue;
            }

            match direction {
                HistoryDirection::Older => {
                    self.messages.insert(top_cursor, incoming);
                    top_cursor += 1;
                }
                HistoryDirection::Newer => {
                    if !incoming.is_bot {
                        self.remove_placeholder(MessageKind::PlaceholderForUser);
                    }
                    let position = self.ordered_insert_position(&incoming);
                    self.messages.insert(position, incoming);
                }
            }
            outcome.inserted += 1;
        }

        if batch.authoritative {
            outcome.pruned = self.prune_missing(batch);
        }

        debug::validate_store(&self.messages);
        tracing::debug!(
            "[STORE] History merged: direction={:?}, inserted={}, updated={}, pruned={}",
            outcome.direction,
            outcome.inserted,
            outcome.updated,
            outcome.pruned
        );
        Some(outcome)
    }

    /// Merge an incremental fragment of an in-progress message.
    ///
    /// Sentinel heartbeats and stale fragments (lower part number, or an
    /// unfinished fragment for a finished record) are ignored.
    pub fn apply_streaming_delta(&mut self, incoming: Message) -> Result<MergeOutcome, ChatError> {
        if incoming.is_default_empty() {
            return Ok(MergeOutcome::ignored());
        }
        if incoming.id.is_empty() {
            return Err(ChatError::malformed(
                "stream_message",
                "delta carries text but no id",
            ));
        }
        let incoming = normalized(&incoming, MessageOrigin::StreamingDelta);
        Ok(self.merge(incoming))
    }

    /// Merge a correction to an already delivered message.
    ///
    /// Finished updates always overwrite the stored content. The outcome
    /// requests a flash when the merged record is finished and originates
    /// from an update item, including when re-applying an identical update.
    pub fn apply_update(&mut self, incoming: Message) -> Result<MergeOutcome, ChatError> {
        if incoming.is_default_empty() {
            return Ok(MergeOutcome::ignored());
        }
        if incoming.id.is_empty() {
            return Err(ChatError::malformed(
                "update_history_item",
                "update carries text but no id",
            ));
        }
        let incoming = normalized(&incoming, MessageOrigin::UpdateItem);
        Ok(self.merge(incoming))
    }

    /// Insert the locally typed user text, above a trailing bot placeholder
    pub fn insert_user_placeholder(&mut self, text: impl Into<String>) -> Result<&Message, ChatError> {
        self.ensure_no_placeholder(MessageKind::PlaceholderForUser)?;
        let position = self.bottom_insert_position();
        let placeholder = Message::placeholder(MessageKind::PlaceholderForUser, text);
        self.messages.insert(position, placeholder);
        debug::validate_store(&self.messages);
        Ok(&self.messages[position])
    }

    /// Append the "bot is typing" record
    pub fn insert_bot_placeholder(&mut self) -> Result<&Message, ChatError> {
        self.ensure_no_placeholder(MessageKind::PlaceholderForBot)?;
        self.messages
            .push(Message::placeholder(MessageKind::PlaceholderForBot, ""));
        debug::validate_store(&self.messages);
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Prepend the "loading more" record
    pub fn insert_loading_placeholder(&mut self) -> Result<&Message, ChatError> {
        self.ensure_no_placeholder(MessageKind::PlaceholderLoading)?;
        self.messages
            .insert(0, Message::placeholder(MessageKind::PlaceholderLoading, ""));
        debug::validate_store(&self.messages);
        Ok(&self.messages[0])
    }

    /// Remove every placeholder of `kind`; returns whether one was present.
    ///
    /// `MessageKind::Normal` never matches: transport records are not
    /// removable through this path.
    pub fn remove_placeholder(&mut self, kind: MessageKind) -> bool {
        if !kind.is_placeholder() {
            return false;
        }
        let before = self.messages.len();
        self.messages.retain(|message| message.kind != kind);
        before != self.messages.len()
    }

    fn ensure_no_placeholder(&self, kind: MessageKind) -> Result<(), ChatError> {
        if self.has_placeholder(kind) {
            return Err(ChatError::duplicate_placeholder(kind));
        }
        Ok(())
    }

    fn merge(&mut self, incoming: Message) -> MergeOutcome {
        let mut outcome = MergeOutcome::ignored();

        let position = match self.position(&incoming.id) {
            Some(position) => {
                let existing = &mut self.messages[position];
                if !supersedes(existing, &incoming) {
                    crate::debug_log!(
                        "[STORE] Ignoring stale {} for {} (part {} vs stored {})",
                        incoming.origin.as_str(),
                        incoming.id,
                        incoming.part_number,
                        existing.part_number
                    );
                    return outcome;
                }
                outcome.effect = if existing.absorb(&incoming) {
                    MergeEffect::Updated
                } else {
                    MergeEffect::Unchanged
                };
                position
            }
            None => {
                let superseded = if incoming.is_bot {
                    MessageKind::PlaceholderForBot
                } else {
                    MessageKind::PlaceholderForUser
                };
                if self.remove_placeholder(superseded) {
                    outcome.superseded.push(superseded);
                }
                let position = if incoming.is_bot {
                    self.messages.len()
                } else {
                    self.bottom_insert_position()
                };
                self.messages.insert(position, incoming);
                outcome.effect = MergeEffect::Inserted;
                position
            }
        };

        outcome.flash = self.messages[position].wants_flash();
        debug::validate_store(&self.messages);
        outcome
    }

    /// Drop finished transport records inside the batch's index range that
    /// the batch does not mention
    fn prune_missing(&mut self, batch: &HistoryBatch) -> usize {
        let Some(low) = batch.messages.iter().map(|m| m.index).min() else {
            return 0;
        };
        let high = batch.messages.iter().map(|m| m.index).max().unwrap_or(low);
        let reported: HashSet<&str> = batch.messages.iter().map(|m| m.id.as_str()).collect();

        let before = self.messages.len();
        self.messages.retain(|message| {
            message.is_placeholder()
                || !message.is_finished
                || message.index < low
                || message.index > high
                || reported.contains(message.id.as_str())
        });
        before - self.messages.len()
    }

    /// First slot below a leading "loading more" placeholder
    fn top_insert_position(&self) -> usize {
        self.messages
            .iter()
            .take_while(|message| message.kind == MessageKind::PlaceholderLoading)
            .count()
    }

    /// Slot for a newer history record: right after the last stored record
    /// sorting at or before it, and above trailing user/bot placeholders
    fn ordered_insert_position(&self, incoming: &Message) -> usize {
        let bottom = self.bottom_insert_position();
        let after = self.messages[..bottom]
            .iter()
            .rposition(|message| {
                !message.is_placeholder() && message.ordering_cmp(incoming) != Ordering::Greater
            })
            .map(|position| position + 1)
            .unwrap_or_else(|| self.top_insert_position());
        after.min(bottom)
    }

    /// First slot of the trailing run of user/bot placeholders
    fn bottom_insert_position(&self) -> usize {
        let trailing = self
            .messages
            .iter()
            .rev()
            .take_while(|message| message.is_user_or_bot_placeholder())
            .count();
        self.messages.len() - trailing
    }
}

/// Whether `incoming` carries newer state than `existing`.
///
/// Part numbers never go backwards on a finished record, except for history
/// snapshots, which are the server's word. Otherwise a finished payload wins,
/// and an unfinished one never overwrites a finished record nor a later part
/// of the same stream.
fn supersedes(existing: &Message, incoming: &Message) -> bool {
    if existing.is_finished
        && incoming.part_number < existing.part_number
        && incoming.origin != MessageOrigin::History
    {
        return false;
    }
    if incoming.is_finished {
        return true;
    }
    !existing.is_finished && incoming.part_number >= existing.part_number
}

/// Stamp the feed origin and strip any placeholder marker the transport
/// should never have sent
fn normalized(message: &Message, origin: MessageOrigin) -> Message {
    let mut message = message.clone();
    message.origin = origin;
    message.kind = MessageKind::Normal;
    message
}
