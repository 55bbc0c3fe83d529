// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Configuration and programmer errors (unknown task in a graph binding,
//! loading a second graph, cycles, ambiguous multi-output completion) are
//! surfaced immediately. Operational failures (a task body failing, a
//! timeout, a store record that vanished) are counted and turned into a
//! terminal chain signal by the runners, so they rarely escape as `Err`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Planned task not found: {0}")]
    PlannedTaskNotFound(String),

    /// Insert would break the one-record-per-equivalent-task invariant.
    /// Callers treat this as "already scheduled".
    #[error("Already stored: {0}")]
    DuplicatePlannedTask(String),

    #[error("Loading more than one task graph is not permitted")]
    GraphLoadedTwice,

    #[error("Load a task graph first")]
    GraphNotLoaded,

    #[error("Task graphs with cycles are not supported: {0}")]
    CycleDetected(String),

    #[error("Task '{task}' cannot run yet: {reason}")]
    PreconditionFailed { task: String, reason: String },

    #[error("Task '{task}' failed: {reason}")]
    TaskExecution { task: String, reason: String },

    #[error("Task '{0}' declares more than one output event but its outcome did not name one")]
    AmbiguousOutput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DispatchError {
    /// Whether retrying later may succeed without any code change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::PreconditionFailed { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DispatchError>;
