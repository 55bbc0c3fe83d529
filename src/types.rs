// src/types.rs

//! Small shared types used across the scheduling core.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Free-form parameters handed to a task body.
pub type TaskParams = serde_json::Map<String, serde_json::Value>;

/// Boxed future used at the async seams (store, scheduler, task bodies).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a planned task reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanningType {
    /// Ran right away because of an event.
    Immediate,
    /// Handed to the time-based scheduler.
    Scheduled,
}

/// Which wake-up primitive backs a planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerType {
    None,
    TimerBacked,
}

/// Units accepted by the runnable task builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn to_seconds(self, amount: u64) -> u64 {
        match self {
            TimeUnit::Seconds => amount,
            TimeUnit::Minutes => amount * 60,
            TimeUnit::Hours => amount * 60 * 60,
            TimeUnit::Days => amount * 24 * 60 * 60,
        }
    }
}
