// src/dag/mod.rs

//! The event to task graph.
//!
//! - [`loader`] runs the one-time graph description and wires every binding
//!   to the event bus.
//! - [`browser`] answers read-only membership and traversal queries.
//! - [`validate`] rejects graphs whose trigger/output relation has a cycle.
//! - [`foreground`] tells whether a task, or anything it chains into, needs
//!   foreground execution.

pub mod browser;
pub mod foreground;
pub mod loader;
pub mod validate;

pub use browser::{GraphEntry, GraphTask, TaskGraphBrowser};
pub use foreground::ForegroundChecker;
pub use loader::{GraphBinder, TaskGraph, TaskGraphLoader};
