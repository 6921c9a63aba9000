//! Configuration module
//!
//! Provides the configuration consumed by the replay tooling and the
//! reconciliation engine: transport event names, the default replay skip
//! set, the notification channel size and the default log filter.

use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Transport event names as they appear in traffic logs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventKeys {
    pub connect: String,
    pub disconnect: String,
    pub error: String,
    pub stream_message: String,
    pub update_history_item: String,
    pub send_history_snapshot: String,
    pub connection_state: String,
}

impl Default for EventKeys {
    fn default() -> Self {
        Self {
            connect: "connect".to_string(),
            disconnect: "disconnect".to_string(),
            error: "error".to_string(),
            stream_message: "stream_message".to_string(),
            update_history_item: "update_history_item".to_string(),
            send_history_snapshot: "send_history_snapshot".to_string(),
            connection_state: "connection_state".to_string(),
        }
    }
}

impl EventKeys {
    /// Whether `name` is one of the configured event names
    pub fn contains(&self, name: &str) -> bool {
        self.all().iter().any(|(_, value)| *value == name)
    }

    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("connect", &self.connect),
            ("disconnect", &self.disconnect),
            ("error", &self.error),
            ("stream_message", &self.stream_message),
            ("update_history_item", &self.update_history_item),
            ("send_history_snapshot", &self.send_history_snapshot),
            ("connection_state", &self.connection_state),
        ]
    }
}

/// Chat core configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub event_keys: EventKeys,
    /// Event names the replayer skips unless told otherwise
    pub events_to_skip: BTreeSet<String>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Capacity of the engine notification channel
    pub event_channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            event_keys: EventKeys::default(),
            events_to_skip: BTreeSet::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    event_keys: Option<EventKeys>,
    events_to_skip: Vec<String>,
    log_filter: Option<String>,
    event_channel_capacity: Option<usize>,
}

impl ChatConfig {
    /// Create a new ChatConfigBuilder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Parse a TOML document; every key is optional
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(source)?;
        let mut builder = Self::builder();
        if let Some(keys) = raw.event_keys {
            builder = builder.event_keys(keys);
        }
        for event in raw.events_to_skip {
            builder = builder.skip_event(event);
        }
        if let Some(filter) = raw.log_filter {
            builder = builder.log_filter(filter);
        }
        if let Some(capacity) = raw.event_channel_capacity {
            builder = builder.event_channel_capacity(capacity);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for (field, value) in self.event_keys.all() {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue(field));
            }
            if !seen.insert(value) {
                return Err(ConfigError::DuplicateEventKey(value.to_string()));
            }
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }
}

/// Builder for ChatConfig
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    event_keys: Option<EventKeys>,
    events_to_skip: BTreeSet<String>,
    log_filter: Option<String>,
    event_channel_capacity: Option<usize>,
}

impl ChatConfigBuilder {
    pub fn event_keys(mut self, keys: EventKeys) -> Self {
        self.event_keys = Some(keys);
        self
    }

    /// Add an event name to the default replay skip set
    pub fn skip_event(mut self, event: impl Into<String>) -> Self {
        self.events_to_skip.insert(event.into());
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ChatConfig, ConfigError> {
        let config = ChatConfig {
            event_keys: self.event_keys.unwrap_or_default(),
            events_to_skip: self.events_to_skip,
            log_filter: self
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(DEFAULT_EVENT_CHANNEL_CAPACITY),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("event key '{0}' is used for more than one event")]
    DuplicateEventKey(String),
    #[error("event channel capacity must be greater than zero")]
    InvalidCapacity,
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}
