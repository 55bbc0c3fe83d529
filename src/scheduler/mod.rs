// src/scheduler/mod.rs

//! Time-based scheduling collaborators.
//!
//! The planner hands delayed and recurrent work to a [`TimeBasedScheduler`].
//! Implementations own the wake-up primitive (a [`WakeAlarm`]) and must treat
//! the arbiter's next interval as a minimum delay, never an exact one.

pub mod alarm;

use std::fmt;

use crate::errors::Result;
use crate::tasks::{PlannedTask, RunnableTask};
use crate::types::BoxFuture;

pub use alarm::AlarmScheduler;

pub trait TimeBasedScheduler: Send + Sync + fmt::Debug {
    /// Persist `task` as a scheduled planned task and arm a wake-up for it.
    fn schedule(&self, task: RunnableTask) -> BoxFuture<'_, Result<PlannedTask>>;

    /// Remove a scheduled planned task, re-arming or disarming as needed.
    fn cancel(&self, planned_task_id: &str) -> BoxFuture<'_, Result<()>>;
}

/// One-shot wake-up primitive of the host.
pub trait WakeAlarm: Send + Sync + fmt::Debug {
    /// (Re)arm to fire in `interval_ms`, replacing any pending alarm.
    fn set(&self, interval_ms: i64);

    fn cancel(&self);

    fn is_up(&self) -> bool;
}
