//! Shared Module
//!
//! This module contains the platform-agnostic types of the chat core: the
//! message record, the typed transport and engine events, the error
//! taxonomy and configuration. Renderers on every platform consume these
//! types; none of them depend on a UI toolkit.

/// Message record
pub mod message;

/// Transport events and engine notifications
pub mod event;

/// Shared error types
pub mod error;

/// Configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use message::{Message, MessageId, MessageKind, MessageOrigin};
pub use event::{
    ConnectionState, EngineEvent, HistoryBatch, MessageSnapshot, ScrollHint, TransportEvent,
    TypingState,
};
pub use error::ChatError;
pub use config::{ChatConfig, ChatConfigBuilder, ConfigError, EventKeys};
