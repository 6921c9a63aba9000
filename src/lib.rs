//! Chatline - Chat Reconciliation Core
//!
//! Chatline merges the three message feeds a chat transport delivers (history
//! snapshots, streaming deltas and after-the-fact updates) into one ordered,
//! deduplicated list that a renderer can draw directly.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Message record, transport events, engine notifications
//!   - Error types and configuration
//!
//! - **`client`** - The reconciliation core
//!   - `MessageStore` with the merge rules
//!   - `ReconciliationEngine` with the composing state machine and
//!     clear-chat handling
//!   - Traffic log recording and step-by-step replay
//!
//! - **`debug`** - Store invariant checks for debug builds
//!
//! # Usage
//!
//! ```rust
//! use chatline::client::ReconciliationEngine;
//! use chatline::shared::{EngineEvent, HistoryBatch, Message};
//!
//! let mut engine = ReconciliationEngine::new();
//! let mut events = engine.subscribe();
//!
//! engine.on_history(HistoryBatch::new(vec![Message::user("u1", "hi")]));
//! engine.on_streaming_delta(Message::bot("m1", "Hel"));
//! engine.on_streaming_delta(Message::bot("m1", "Hello").with_part(1));
//!
//! assert_eq!(engine.snapshot().texts(), vec!["hi", "Hello"]);
//! assert!(matches!(events.try_recv(), Ok(EngineEvent::Refresh { .. })));
//! ```
//!
//! # Thread Safety
//!
//! The engine is a single-writer object: the transport marshals its callbacks
//! onto one execution context before calling in. Renderers receive immutable
//! `MessageSnapshot`s over a `tokio::sync::broadcast` channel and may live on
//! any thread.
//!
//! # Error Handling
//!
//! Nothing in the core is fatal. Malformed payloads are logged and dropped,
//! duplicate placeholders are ignored, and transport errors are surfaced as
//! `ConnectionState::Error` for the UI to show.

/// Shared types and data structures
pub mod shared;

/// Message store, reconciliation engine and replay tooling
pub mod client;

/// Debug utilities
pub mod debug;
