// src/tasks/task.rs

//! Per-invocation run/cancel state machine.
//!
//! A [`Task`] is a process-wide singleton. Every invocation is keyed by the
//! id of the event that triggered it and moves through
//! `Idle -> Running -> {Completed, Failed, Cancelled}` independently of the
//! others. Execution is serialized by an async lock: a second invocation
//! waits for the first instead of interleaving with it, but it is recorded
//! as pending right away so that `cancel()` reaches it too.
//!
//! Each invocation ends with exactly one terminal signal: either the chosen
//! output event or a `taskChainFinished` event. Completion is recorded per
//! invocation id and never fires twice.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{DispatchError, Result};
use crate::events::{Event, EventBus, TaskChainResult, finalize_chain};
use crate::support::{Clock, flatten, into_event_data};
use crate::types::{BoxFuture, TaskParams, Timestamp};

use super::context::TaskContext;

/// Static configuration of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskConfig {
    pub foreground: bool,
    /// Never empty once the task is built.
    pub output_event_names: Vec<String>,
}

impl TaskConfig {
    fn normalized(self, name: &str) -> Self {
        let output_event_names = if self.output_event_names.is_empty() {
            vec![format!("{name}Finished")]
        } else {
            self.output_event_names
        };
        Self {
            foreground: self.foreground,
            output_event_names,
        }
    }
}

/// What a task body produced.
///
/// `result` has already been flattened into plain JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutcome {
    pub event_name: Option<String>,
    pub result: Value,
}

impl TaskOutcome {
    /// Completion on the task's sole output event, without a result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Completion on a specific output event.
    pub fn emitting(event_name: impl Into<String>) -> Self {
        Self {
            event_name: Some(event_name.into()),
            result: Value::Null,
        }
    }

    pub fn with_result<T: Serialize + ?Sized>(mut self, result: &T) -> Result<Self> {
        self.result = flatten(result)?;
        Ok(self)
    }
}

/// The user-supplied part of a task.
pub trait TaskBody: Send + Sync {
    /// Pre-run guard. An error means "not ready yet", not "failed".
    fn check_if_can_run(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Bring the task into a runnable state (permissions, warm-up, ...).
    fn prepare(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn on_run(&self, ctx: TaskContext) -> BoxFuture<'_, anyhow::Result<TaskOutcome>>;
}

/// Re-plans a task as a one-shot delayed run.
pub trait TaskDeferrer: Send + Sync {
    fn defer(&self, task_name: &str, seconds: u64, params: TaskParams);
}

/// Name, configuration and body of a task, before it is bound to a bus.
#[derive(Clone)]
pub struct TaskDefinition {
    pub name: String,
    pub config: TaskConfig,
    pub body: Arc<dyn TaskBody>,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, body: impl TaskBody + 'static) -> Self {
        Self {
            name: name.into(),
            config: TaskConfig::default(),
            body: Arc::new(body),
        }
    }

    pub fn in_foreground(mut self) -> Self {
        self.config.foreground = true;
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.output_event_names = outputs.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

type CancelCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct InvocationState {
    /// Recorded on arrival, before the execution lock is taken. An id queued
    /// twice appears twice.
    pending: Vec<String>,
    /// Ended invocations still queued or still reachable from a context.
    completed: HashSet<String>,
    live_contexts: HashMap<String, usize>,
    current: Option<String>,
    cancel_callbacks: HashMap<String, Vec<CancelCallback>>,
    tokens: HashMap<String, CancellationToken>,
}

pub struct Task {
    name: String,
    config: TaskConfig,
    body: Arc<dyn TaskBody>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    state: Mutex<InvocationState>,
    exec_lock: tokio::sync::Mutex<()>,
    deferrer: OnceLock<Arc<dyn TaskDeferrer>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(definition: TaskDefinition, bus: EventBus, clock: Arc<dyn Clock>) -> Arc<Self> {
        let config = definition.config.normalized(&definition.name);
        Arc::new(Self {
            name: definition.name,
            config,
            body: definition.body,
            bus,
            clock,
            state: Mutex::new(InvocationState::default()),
            exec_lock: tokio::sync::Mutex::new(()),
            deferrer: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_event_names(&self) -> &[String] {
        &self.config.output_event_names
    }

    pub fn runs_in_background(&self) -> bool {
        !self.config.foreground
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    pub(crate) fn set_deferrer(&self, deferrer: Arc<dyn TaskDeferrer>) {
        if self.deferrer.set(deferrer).is_err() {
            debug!(task = %self.name, "deferrer already installed");
        }
    }

    pub(crate) fn deferrer(&self) -> Option<&Arc<dyn TaskDeferrer>> {
        self.deferrer.get()
    }

    pub async fn check_if_can_run(&self) -> Result<()> {
        self.body
            .check_if_can_run()
            .await
            .map_err(|err| DispatchError::PreconditionFailed {
                task: self.name.clone(),
                reason: format!("{err:#}"),
            })
    }

    pub async fn prepare(&self) -> Result<()> {
        info!(task = %self.name, "preparing task");
        self.body.prepare().await.map_err(|err| DispatchError::TaskExecution {
            task: self.name.clone(),
            reason: format!("{err:#}"),
        })
    }

    /// Run one invocation keyed by `event.id()`.
    ///
    /// Errors from the guard or the body are logged, turned into an `Error`
    /// chain result and returned to the caller.
    pub async fn run(self: &Arc<Self>, params: TaskParams, event: Event) -> Result<()> {
        let id = event.id().to_string();
        self.register_pending(&id);

        let _guard = self.exec_lock.lock().await;

        if self.is_done(&id) {
            debug!(
                task = %self.name,
                invocation = %id,
                "invocation ended while queued; skipping"
            );
            self.release(&id);
            return Ok(());
        }

        self.state().current = Some(id.clone());
        info!(
            task = %self.name,
            invocation = %id,
            trigger = %event.name(),
            "run triggered"
        );

        let outcome = self.execute(params.clone(), event).await;
        if let Err(err) = &outcome {
            error!(
                task = %self.name,
                invocation = %id,
                params = %serde_json::Value::Object(params),
                error = %err,
                "execution failed"
            );
            self.end(&id, TaskChainResult::error(err));
        }

        self.release(&id);
        outcome
    }

    async fn execute(self: &Arc<Self>, params: TaskParams, event: Event) -> Result<()> {
        let id = event.id().to_string();
        let expiration = event.expiration_timestamp();

        self.check_if_can_run().await?;

        let ctx = TaskContext::new(Arc::clone(self), params, event);
        let outcome = self
            .body
            .on_run(ctx)
            .await
            .map_err(|err| DispatchError::TaskExecution {
                task: self.name.clone(),
                reason: format!("{err:#}"),
            })?;

        if !self.is_done(&id) {
            self.process_outcome(&id, expiration, outcome)?;
        }
        Ok(())
    }

    /// Cancel every in-flight invocation.
    ///
    /// Emits a `Cancelled` chain result per pending id and runs the cleanup
    /// callbacks registered by the current one. Never interrupts the body.
    pub fn cancel(&self) {
        let (ids, callbacks) = {
            let mut state = self.state();
            let mut ids: Vec<String> = Vec::new();
            for id in state.pending.clone() {
                if state.completed.insert(id.clone()) {
                    if let Some(token) = state.tokens.get(&id) {
                        token.cancel();
                    }
                    ids.push(id);
                }
            }
            let callbacks = match state.current.clone() {
                Some(current) => state.cancel_callbacks.remove(&current).unwrap_or_default(),
                None => Vec::new(),
            };
            (ids, callbacks)
        };

        for id in &ids {
            finalize_chain(&self.bus, id, TaskChainResult::cancelled(None));
        }
        for callback in callbacks {
            callback();
        }

        info!(task = %self.name, invocations = ids.len(), "cancelled");
    }

    /// Emit the outcome of invocation `id` on the right output event.
    pub(crate) fn process_outcome(
        &self,
        id: &str,
        expiration: Option<Timestamp>,
        outcome: TaskOutcome,
    ) -> Result<()> {
        let outputs = &self.config.output_event_names;
        let event_name = match outcome.event_name {
            Some(name) => name,
            None if outputs.len() > 1 => {
                error!(
                    task = %self.name,
                    invocation = %id,
                    outputs = ?outputs,
                    "outcome did not name one of several output events"
                );
                return Err(DispatchError::AmbiguousOutput(self.name.clone()));
            }
            None => outputs
                .first()
                .cloned()
                .unwrap_or_else(|| format!("{}Finished", self.name)),
        };

        self.done(id, expiration, &event_name, outcome.result);
        Ok(())
    }

    fn done(&self, id: &str, expiration: Option<Timestamp>, event_name: &str, result: Value) {
        if !self.mark_done(id) {
            return;
        }

        if !self.config.output_event_names.iter().any(|n| n == event_name) {
            warn!(
                task = %self.name,
                event = %event_name,
                "emitting an event not declared among the task outputs"
            );
        }

        if !self.bus.has_subscribers(event_name) {
            finalize_chain(&self.bus, id, TaskChainResult::ok());
            return;
        }

        let event = Event::with_id(event_name, id)
            .with_data(into_event_data(result))
            .expiring_at(expiration);
        self.bus.publish(&event);

        info!(
            task = %self.name,
            invocation = %id,
            event = %event_name,
            "finished running"
        );
    }

    /// Terminal chain signal for `id`, emitted at most once.
    fn end(&self, id: &str, result: TaskChainResult) {
        if self.mark_done(id) {
            finalize_chain(&self.bus, id, result);
        }
    }

    fn mark_done(&self, id: &str) -> bool {
        self.state().completed.insert(id.to_string())
    }

    pub(crate) fn is_done(&self, id: &str) -> bool {
        self.state().completed.contains(id)
    }

    fn register_pending(&self, id: &str) {
        let mut state = self.state();
        state.pending.push(id.to_string());
        state
            .tokens
            .entry(id.to_string())
            .or_insert_with(CancellationToken::new);
    }

    fn release(&self, id: &str) {
        let mut state = self.state();
        if let Some(pos) = state.pending.iter().position(|p| p == id) {
            state.pending.remove(pos);
        }
        if state.current.as_deref() == Some(id) {
            state.current = None;
        }
        if state.pending.iter().any(|p| p == id) {
            return;
        }
        state.cancel_callbacks.remove(id);
        state.tokens.remove(id);
        if !state.live_contexts.contains_key(id) {
            state.completed.remove(id);
        }
    }

    pub(crate) fn attach_context(&self, id: &str) {
        *self.state().live_contexts.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Drops the completion record of `id` once nothing can still refer to it.
    pub(crate) fn detach_context(&self, id: &str) {
        let mut state = self.state();
        let Some(count) = state.live_contexts.get_mut(id) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        state.live_contexts.remove(id);
        if !state.pending.iter().any(|p| p == id) {
            state.completed.remove(id);
        }
    }

    /// Invocations whose completion is still being tracked.
    pub fn tracked_invocations(&self) -> usize {
        self.state().completed.len()
    }

    /// Register a cleanup callback for invocation `id`.
    ///
    /// Runs right away if the invocation already ended.
    pub(crate) fn register_cancel_callback(&self, id: &str, callback: CancelCallback) {
        {
            let mut state = self.state();
            if !state.completed.contains(id) {
                state
                    .cancel_callbacks
                    .entry(id.to_string())
                    .or_default()
                    .push(callback);
                return;
            }
        }
        callback();
    }

    pub(crate) fn cancellation_token(&self, id: &str) -> CancellationToken {
        let mut state = self.state();
        if let Some(token) = state.tokens.get(id) {
            return token.clone();
        }
        let token = CancellationToken::new();
        if state.completed.contains(id) {
            token.cancel();
        } else {
            state.tokens.insert(id.to_string(), token.clone());
        }
        token
    }

    fn state(&self) -> MutexGuard<'_, InvocationState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
