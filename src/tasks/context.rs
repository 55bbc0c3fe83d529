// src/tasks/context.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::Result;
use crate::events::Event;
use crate::types::TaskParams;

use super::task::{Task, TaskOutcome};

/// Keeps the invocation's completion record alive while any clone of its
/// context exists.
struct ContextLease {
    task: Arc<Task>,
    id: String,
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.task.detach_context(&self.id);
    }
}

/// Handle given to a task body for one invocation.
#[derive(Clone)]
pub struct TaskContext {
    task: Arc<Task>,
    params: TaskParams,
    event: Event,
    _lease: Arc<ContextLease>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task.name())
            .field("params", &self.params)
            .field("event", &self.event)
            .finish()
    }
}

impl TaskContext {
    pub(crate) fn new(task: Arc<Task>, params: TaskParams, event: Event) -> Self {
        task.attach_context(event.id());
        let lease = Arc::new(ContextLease {
            task: Arc::clone(&task),
            id: event.id().to_string(),
        });
        Self {
            task,
            params,
            event,
            _lease: lease,
        }
    }

    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn invocation_id(&self) -> &str {
        self.event.id()
    }

    /// Register cleanup to run if this invocation gets cancelled.
    ///
    /// Runs immediately when the invocation has already ended.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.task
            .register_cancel_callback(self.invocation_id(), Box::new(callback));
    }

    /// Token cancelled when this invocation is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.task.cancellation_token(self.invocation_id())
    }

    /// Time left before the execution window closes, if there is one.
    ///
    /// Shortened by 10% when something already listens to this task's
    /// outputs, leaving the downstream chain room to finish.
    pub fn remaining_time(&self) -> Option<Duration> {
        let expiration = self.event.expiration_timestamp()?;
        let left = (expiration - self.task.now()).max(0);
        let chained = self
            .task
            .output_event_names()
            .iter()
            .any(|name| self.task.bus().has_subscribers(name));
        let left = if chained { left - left / 10 } else { left };
        Some(Duration::from_millis(left as u64))
    }

    /// Plan this task again as a one-shot run `seconds` from now.
    ///
    /// Reuses the current parameters unless new ones are given.
    pub fn run_again_in(&self, seconds: u64, params: Option<TaskParams>) {
        let params = params.unwrap_or_else(|| self.params.clone());
        match self.task.deferrer() {
            Some(deferrer) => {
                deferrer.defer(self.task.name(), seconds, params);
                self.log(format!("Will run again in {seconds} s"));
            }
            None => warn!(
                task = %self.task.name(),
                invocation = %self.invocation_id(),
                "no deferrer installed; cannot run again"
            ),
        }
    }

    /// Signal completion before `on_run` returns.
    ///
    /// The value later returned by `on_run` is then ignored.
    pub fn complete(&self, outcome: TaskOutcome) -> Result<()> {
        self.task.process_outcome(
            self.invocation_id(),
            self.event.expiration_timestamp(),
            outcome,
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token().is_cancelled()
    }

    pub fn log(&self, message: impl fmt::Display) {
        info!(
            task = %self.task.name(),
            invocation = %self.invocation_id(),
            "{message}"
        );
    }
}
