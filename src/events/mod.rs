// src/events/mod.rs

//! Events flowing through the dispatcher and the chain-result protocol.
//!
//! Every event derived from one triggering occurrence shares the same `id`.
//! A chain ends when a `taskChainFinished` event carrying that id is
//! published, with a [`TaskChainResult`] under the `"result"` key.

pub mod bus;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::support::new_id;
use crate::types::Timestamp;

pub use bus::{EventBus, EventWaiter, ListenerId};

/// Payload attached to an event.
pub type EventData = serde_json::Map<String, Value>;

/// Event names reserved by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherEvent {
    TaskExecutionStarted,
    TaskExecutionTimedOut,
    TaskChainFinished,
    DefaultCancelEvent,
}

impl DispatcherEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatcherEvent::TaskExecutionStarted => "taskExecutionStarted",
            DispatcherEvent::TaskExecutionTimedOut => "taskExecutionTimedOut",
            DispatcherEvent::TaskChainFinished => "taskChainFinished",
            DispatcherEvent::DefaultCancelEvent => "defaultCancelEvent",
        }
    }
}

impl fmt::Display for DispatcherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DispatcherEvent> for String {
    fn from(value: DispatcherEvent) -> Self {
        value.as_str().to_string()
    }
}

/// An immutable, named occurrence correlated to a chain by its `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    name: String,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration_timestamp: Option<Timestamp>,
    #[serde(default)]
    data: EventData,
}

impl Event {
    /// A fresh event starting a new chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(name, new_id())
    }

    /// An event belonging to an existing chain.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            expiration_timestamp: None,
            data: EventData::new(),
        }
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn expiring_at(mut self, expiration: Option<Timestamp>) -> Self {
        self.expiration_timestamp = expiration;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expiration_timestamp(&self) -> Option<Timestamp> {
        self.expiration_timestamp
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn is(&self, name: DispatcherEvent) -> bool {
        self.name == name.as_str()
    }

    /// Chain result carried by a `taskChainFinished` event, if any.
    pub fn chain_result(&self) -> Option<TaskChainResult> {
        let value = self.data.get("result")?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Terminal status of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskResultStatus {
    Ok,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChainResult {
    pub status: TaskResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TaskChainResult {
    pub fn ok() -> Self {
        Self {
            status: TaskResultStatus::Ok,
            reason: None,
        }
    }

    pub fn error(reason: impl fmt::Display) -> Self {
        Self {
            status: TaskResultStatus::Error,
            reason: Some(reason.to_string()),
        }
    }

    pub fn cancelled(reason: Option<String>) -> Self {
        Self {
            status: TaskResultStatus::Cancelled,
            reason,
        }
    }

    pub fn status(status: TaskResultStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    fn into_event_data(self) -> EventData {
        let mut data = EventData::new();
        let result = serde_json::to_value(self).unwrap_or(Value::Null);
        data.insert("result".to_string(), result);
        data
    }
}

/// Publish the terminal `taskChainFinished` signal for chain `id`.
pub fn finalize_chain(bus: &EventBus, id: &str, result: TaskChainResult) {
    debug!(chain = %id, status = ?result.status, "finalizing task chain");
    let event = Event::with_id(DispatcherEvent::TaskChainFinished, id)
        .with_data(result.into_event_data());
    bus.publish(&event);
}

/// Publish a `taskExecutionTimedOut` signal scoped to chain `id`.
pub fn emit_timeout(bus: &EventBus, id: &str) {
    bus.publish(&Event::with_id(DispatcherEvent::TaskExecutionTimedOut, id));
}
