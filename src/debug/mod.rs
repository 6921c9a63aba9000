//! Debug utilities and helpers
//!
//! Invariant checks for the message store. They run after every mutation in
//! debug builds and report violations through `tracing::error!`; release
//! builds skip them entirely.

use crate::shared::message::{Message, MessageKind};
use std::collections::HashSet;

/// Debug mode feature flag
pub const DEBUG_MODE: bool = cfg!(debug_assertions);

/// Debug log macro
///
/// Only logs in debug builds.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            tracing::debug!($($arg)*);
        }
    };
}

/// Collect every store invariant the given sequence violates
pub fn store_violations(messages: &[Message]) -> Vec<String> {
    let mut violations = Vec::new();

    let mut ids = HashSet::new();
    for message in messages {
        if !ids.insert(message.id.as_str()) {
            violations.push(format!("duplicate id '{}'", message.id));
        }
    }

    for kind in [
        MessageKind::PlaceholderForUser,
        MessageKind::PlaceholderForBot,
        MessageKind::PlaceholderLoading,
    ] {
        let count = messages.iter().filter(|m| m.kind == kind).count();
        if count > 1 {
            violations.push(format!("{} placeholders of kind {:?}", count, kind));
        }
    }

    violations
}

/// Validate the store invariants, logging each violation
///
/// Returns `true` when the sequence is consistent.
pub fn validate_store(messages: &[Message]) -> bool {
    if !DEBUG_MODE {
        return true;
    }
    let violations = store_violations(messages);
    for violation in &violations {
        tracing::error!("[STORE] Invariant violation: {}", violation);
    }
    violations.is_empty()
}
