//! # Process Log
//!
//! Logger collaborator injected into the reconciliation engine. The engine
//! reports each processing step (which feed, which sub-step, the message or
//! messages involved) through this trait instead of a process-wide logger;
//! the host application decides where the records go.

use crate::shared::message::Message;
use serde::Serialize;
use std::sync::Mutex;

/// Feed being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessAction {
    ProcessHistoryMessages,
    ProcessStreamingMessage,
    ProcessUpdatedMessage,
}

impl ProcessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessAction::ProcessHistoryMessages => "processHistoryMessages",
            ProcessAction::ProcessStreamingMessage => "processStreamingMessage",
            ProcessAction::ProcessUpdatedMessage => "processUpdatedMessage",
        }
    }
}

/// One recorded processing step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub action: ProcessAction,
    pub sub_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<serde_json::Value>>,
}

/// Sink for engine processing steps
pub trait ProcessLog: Send + Sync {
    fn log(
        &self,
        action: ProcessAction,
        sub_action: &str,
        message: Option<&Message>,
        messages: Option<&[Message]>,
    );
}

/// Forwards every step to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProcessLog;

impl ProcessLog for TracingProcessLog {
    fn log(
        &self,
        action: ProcessAction,
        sub_action: &str,
        message: Option<&Message>,
        messages: Option<&[Message]>,
    ) {
        tracing::debug!(
            action = action.as_str(),
            sub_action,
            message_id = message.map(|m| m.id.as_str()),
            message_count = messages.map(|m| m.len()),
            "[ENGINE] process step"
        );
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessLog;

impl ProcessLog for NoopProcessLog {
    fn log(&self, _: ProcessAction, _: &str, _: Option<&Message>, _: Option<&[Message]>) {}
}

/// Keeps records in memory for inspection
#[derive(Debug, Default)]
pub struct MemoryProcessLog {
    records: Mutex<Vec<ProcessRecord>>,
}

impl MemoryProcessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ProcessRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Sub-actions in the order they were logged
    pub fn sub_actions(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.sub_action)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records())
    }
}

impl ProcessLog for MemoryProcessLog {
    fn log(
        &self,
        action: ProcessAction,
        sub_action: &str,
        message: Option<&Message>,
        messages: Option<&[Message]>,
    ) {
        let record = ProcessRecord {
            action,
            sub_action: sub_action.to_string(),
            message: message.map(Message::to_log_value),
            messages: messages.map(|all| all.iter().map(Message::to_log_value).collect()),
        };
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
