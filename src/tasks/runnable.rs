// src/tasks/runnable.rs

//! Declarative descriptions of *how* to run a task.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::events::DispatcherEvent;
use crate::support::{Clock, SystemClock};
use crate::types::{TaskParams, TimeUnit, Timestamp};

/// What to run and when. Has no identity beyond its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnableTask {
    pub name: String,
    /// Absolute start time. `None` means "as soon as the interval allows".
    #[serde(default)]
    pub start_at: Option<Timestamp>,
    /// Seconds between runs (recurrent) or until the run (one-shot).
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub recurrent: bool,
    #[serde(default)]
    pub params: TaskParams,
    pub cancel_event: String,
}

impl RunnableTask {
    /// Deduplication key: every field except the cancel event.
    pub fn is_equivalent(&self, other: &RunnableTask) -> bool {
        self.name == other.name
            && self.start_at == other.start_at
            && self.interval == other.interval
            && self.recurrent == other.recurrent
            && self.params == other.params
    }

    pub fn interval_millis(&self) -> i64 {
        (self.interval as i64).saturating_mul(1000)
    }

    /// Whether the task goes through the time-based scheduler.
    pub fn is_scheduled(&self) -> bool {
        self.interval > 0 || self.start_at.is_some()
    }

    /// Delayed but not repeating.
    pub fn is_one_shot(&self) -> bool {
        !self.recurrent && self.interval > 0
    }
}

/// Fluent builder used while describing a task graph.
#[derive(Clone)]
pub struct RunnableTaskBuilder {
    name: String,
    params: TaskParams,
    start_at: Option<Timestamp>,
    interval: u64,
    recurrent: bool,
    cancel_event: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RunnableTaskBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnableTaskBuilder")
            .field("name", &self.name)
            .field("start_at", &self.start_at)
            .field("interval", &self.interval)
            .field("recurrent", &self.recurrent)
            .field("cancel_event", &self.cancel_event)
            .finish_non_exhaustive()
    }
}

impl RunnableTaskBuilder {
    pub fn new(name: impl Into<String>, params: TaskParams) -> Self {
        Self {
            name: name.into(),
            params,
            start_at: None,
            interval: 0,
            recurrent: false,
            cancel_event: DispatcherEvent::DefaultCancelEvent.as_str().to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used to decide whether `at` lies in the future.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(mut self) -> Self {
        self.interval = 0;
        self.recurrent = false;
        self
    }

    pub fn every(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.interval = unit.to_seconds(amount);
        self.recurrent = true;
        self
    }

    /// Run once, `amount` units after planning.
    pub fn after(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.interval = unit.to_seconds(amount);
        self.recurrent = false;
        self
    }

    /// Ignored unless `timestamp` lies in the future.
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        if timestamp > self.clock.now_millis() {
            self.start_at = Some(timestamp);
        }
        self
    }

    pub fn cancel_on(mut self, event_name: impl Into<String>) -> Self {
        self.cancel_event = event_name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> RunnableTask {
        RunnableTask {
            name: self.name.clone(),
            start_at: self.start_at,
            interval: self.interval,
            recurrent: self.recurrent,
            params: self.params.clone(),
            cancel_event: self.cancel_event.clone(),
        }
    }
}
