// src/tasks/mod.rs

//! Units of work and the descriptions of how to run them.
//!
//! - [`task`]: the run/cancel state machine shared by every task instance.
//! - [`context`]: what a task body sees while running.
//! - [`simple`]: closure-backed task bodies.
//! - [`registry`]: name to instance lookup, populated once at startup.
//! - [`runnable`] / [`planned`]: declarative run descriptions and their
//!   persisted counterparts.

pub mod context;
pub mod planned;
pub mod registry;
pub mod runnable;
pub mod simple;
pub mod task;

pub use context::TaskContext;
pub use planned::PlannedTask;
pub use registry::TaskRegistry;
pub use runnable::{RunnableTask, RunnableTaskBuilder};
pub use simple::SimpleTask;
pub use task::{Task, TaskBody, TaskConfig, TaskDefinition, TaskDeferrer, TaskOutcome};
