//! Chat Error Types
//!
//! This module defines the error taxonomy of the reconciliation core.
//! None of these errors is fatal: the engine logs them and keeps the
//! message store intact.
//!
//! # Error Categories
//!
//! - `MalformedEvent` - transport payload missing expected fields
//! - `DuplicatePlaceholder` - placeholder insert when one already exists
//! - `UnknownReplayEvent` - replay entry names an unrecognized event kind
//! - `Serialization` / `Io` - traffic log encoding and file access
//!
//! # Usage
//!
//! ```rust
//! use chatline::shared::error::ChatError;
//!
//! let error = ChatError::malformed("stream_message", "missing field `id`");
//! assert!(error.to_string().contains("stream_message"));
//! ```
use crate::shared::message::MessageKind;
use thiserror::Error;

/// Errors raised by the reconciliation core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Transport payload could not be turned into a typed event
    #[error("Malformed event '{event}': {reason}")]
    MalformedEvent {
        /// Event name as delivered by the transport
        event: String,
        /// What was missing or invalid
        reason: String,
    },

    /// A placeholder of this kind is already present
    #[error("Duplicate placeholder: {kind:?}")]
    DuplicatePlaceholder {
        kind: MessageKind,
    },

    /// Replay entry names an event the engine does not recognize
    #[error("Unknown replay event: {event}")]
    UnknownReplayEvent {
        event: String,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
    },
}

impl ChatError {
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate_placeholder(kind: MessageKind) -> Self {
        Self::DuplicatePlaceholder { kind }
    }

    pub fn unknown_event(event: impl Into<String>) -> Self {
        Self::UnknownReplayEvent {
            event: event.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
