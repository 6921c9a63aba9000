//! Client Module
//!
//! The client-side chat core: the message store, the reconciliation engine
//! that drives it from transport events, the injected process logger and the
//! traffic replay tooling.

/// Ordered, deduplicated message list
pub mod store;

/// Transport event reconciliation and composing state
pub mod reconciliation;

/// Injected processing-step logger
pub mod process_log;

/// Traffic log recording and replay
pub mod replay;

pub use process_log::{MemoryProcessLog, NoopProcessLog, ProcessAction, ProcessLog, TracingProcessLog};
pub use reconciliation::{EngineEventBroadcast, ReconciliationEngine};
pub use replay::{EventReplayer, ReplayOutcome, ReplayStep, TrafficLog, TrafficLogEntry};
pub use store::{HistoryDirection, HistoryOutcome, MergeEffect, MergeOutcome, MessageStore};
