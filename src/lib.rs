// src/lib.rs

//! Event-driven task dispatch for hosts that are woken up intermittently.
//!
//! Declarative bindings ("when event X happens, run task Y on schedule Z,
//! cancel on event W") are turned into a live task graph. Each trigger is
//! either run right away or handed to a time-based scheduler, fanned out to
//! sibling tasks when needed, and joined back into one chain result.
//! Scheduled work is executed by a [`engine::WakeRuntime`] whenever the
//! host's alarm fires.

pub mod config;
pub mod dag;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod events;
pub mod logging;
pub mod planner;
pub mod runners;
pub mod scheduler;
pub mod store;
pub mod support;
pub mod tasks;
pub mod types;

pub use config::DispatcherConfig;
pub use dispatcher::{Collaborators, TaskDispatcher};
pub use errors::{DispatchError, Result};
pub use events::{DispatcherEvent, Event, EventBus, EventData, TaskChainResult, TaskResultStatus};
pub use tasks::{
    PlannedTask, RunnableTask, RunnableTaskBuilder, SimpleTask, TaskContext, TaskDefinition,
    TaskOutcome,
};
pub use types::{PlanningType, SchedulerType, TimeUnit, Timestamp};
