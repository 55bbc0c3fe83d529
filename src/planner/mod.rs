// src/planner/mod.rs

//! Routing of runnable tasks to immediate execution or to the time-based
//! scheduler.
//!
//! - [`TaskPlanner`] decides the path and deduplicates against the store.
//! - [`parallelizer`] fans one event out to sibling tasks and joins them.
//! - [`cancel_manager`] removes planned work when its cancel event fires.

pub mod cancel_manager;
pub mod parallelizer;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{DispatchError, Result};
use crate::events::{DispatcherEvent, Event, EventBus, TaskChainResult, finalize_chain};
use crate::runners::InstantTaskRunner;
use crate::scheduler::TimeBasedScheduler;
use crate::store::PlannedTaskStore;
use crate::tasks::{PlannedTask, RunnableTask, TaskRegistry};

pub use cancel_manager::TaskCancelManager;
pub use parallelizer::TaskPlannerParallelizer;

struct PlannerInner {
    registry: TaskRegistry,
    store: Arc<dyn PlannedTaskStore>,
    scheduler: Arc<dyn TimeBasedScheduler>,
    runner: InstantTaskRunner,
    cancel_manager: TaskCancelManager,
    bus: EventBus,
}

/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct TaskPlanner {
    inner: Arc<PlannerInner>,
}

impl fmt::Debug for TaskPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPlanner")
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

impl TaskPlanner {
    pub fn new(
        registry: TaskRegistry,
        store: Arc<dyn PlannedTaskStore>,
        scheduler: Arc<dyn TimeBasedScheduler>,
        runner: InstantTaskRunner,
        cancel_manager: TaskCancelManager,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(PlannerInner {
                registry,
                store,
                scheduler,
                runner,
                cancel_manager,
                bus,
            }),
        }
    }

    pub fn cancel_manager(&self) -> &TaskCancelManager {
        &self.inner.cancel_manager
    }

    /// Plan `task`, optionally as part of the chain `event` belongs to.
    ///
    /// Tasks with an interval or a start time go to the scheduler; the rest
    /// run now. On failure the chain of `event` is finalized with `Error`
    /// before the error is returned.
    pub async fn plan(&self, task: RunnableTask, event: Option<Event>) -> Result<PlannedTask> {
        let chain = event.as_ref().map(|e| e.id().to_string());

        let planned = match self.inner.registry.ensure_exists(&task.name) {
            Ok(()) if task.is_scheduled() => self.plan_scheduled(task, chain.as_deref()).await,
            Ok(()) => self.plan_immediate(task, event).await,
            Err(err) => Err(err),
        };

        if let (Err(err), Some(id)) = (&planned, chain.as_deref()) {
            finalize_chain(&self.inner.bus, id, TaskChainResult::error(err));
        }
        planned
    }

    async fn plan_immediate(&self, task: RunnableTask, event: Option<Event>) -> Result<PlannedTask> {
        let existed_before = self.inner.store.get_equivalent(&task).await?.is_some();
        let event = event.unwrap_or_else(|| Event::new(DispatcherEvent::TaskExecutionStarted));

        debug!(task = %task.name, chain = %event.id(), "running task immediately");
        let planned = self.inner.runner.run(task, event).await?;

        if !existed_before {
            self.inner.cancel_manager.add(&planned);
        }
        Ok(planned)
    }

    async fn plan_scheduled(&self, task: RunnableTask, chain: Option<&str>) -> Result<PlannedTask> {
        if let Some(existing) = self.inner.store.get_equivalent(&task).await? {
            debug!(planned_task = %existing.id, task = %existing.name(), "already scheduled");
            self.finish(chain);
            return Ok(existing);
        }

        let lookup = task.clone();
        match self.inner.scheduler.schedule(task).await {
            Ok(planned) => {
                info!(planned_task = %planned.id, task = %planned.name(), "task planned");
                self.finish(chain);
                self.inner.cancel_manager.add(&planned);
                Ok(planned)
            }
            Err(DispatchError::DuplicatePlannedTask(_)) => {
                let existing = self
                    .inner
                    .store
                    .get_equivalent(&lookup)
                    .await?
                    .ok_or_else(|| DispatchError::PlannedTaskNotFound(lookup.name.clone()))?;
                self.finish(chain);
                Ok(existing)
            }
            Err(err) => Err(err),
        }
    }

    fn finish(&self, chain: Option<&str>) {
        if let Some(id) = chain {
            finalize_chain(&self.inner.bus, id, TaskChainResult::ok());
        }
    }
}
