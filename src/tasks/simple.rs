// src/tasks/simple.rs

use std::future::Future;
use std::sync::Arc;

use crate::types::BoxFuture;

use super::context::TaskContext;
use super::task::{TaskBody, TaskDefinition, TaskOutcome};

type RunFn = Arc<dyn Fn(TaskContext) -> BoxFuture<'static, anyhow::Result<TaskOutcome>> + Send + Sync>;

/// Task body backed by an async closure.
#[derive(Clone)]
pub struct SimpleTask {
    run: RunFn,
}

impl SimpleTask {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<TaskOutcome>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |ctx| -> BoxFuture<'static, anyhow::Result<TaskOutcome>> {
                Box::pin(f(ctx))
            }),
        }
    }

    /// Shorthand for a [`TaskDefinition`] with a closure body.
    pub fn define<F, Fut>(name: impl Into<String>, f: F) -> TaskDefinition
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<TaskOutcome>> + Send + 'static,
    {
        TaskDefinition::new(name, Self::new(f))
    }
}

impl TaskBody for SimpleTask {
    fn on_run(&self, ctx: TaskContext) -> BoxFuture<'_, anyhow::Result<TaskOutcome>> {
        (self.run)(ctx)
    }
}
