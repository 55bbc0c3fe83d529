// src/runners/instant.rs

use std::sync::Arc;

use crate::errors::{DispatchError, Result};
use crate::events::Event;
use crate::store::PlannedTaskStore;
use crate::support::Clock;
use crate::tasks::{PlannedTask, RunnableTask};
use crate::types::{PlanningType, SchedulerType};

use super::single::SingleTaskRunner;

/// Runs a runnable task right away, creating its immediate record on first
/// use.
#[derive(Debug, Clone)]
pub struct InstantTaskRunner {
    runner: SingleTaskRunner,
    store: Arc<dyn PlannedTaskStore>,
    clock: Arc<dyn Clock>,
}

impl InstantTaskRunner {
    pub fn new(runner: SingleTaskRunner, store: Arc<dyn PlannedTaskStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            runner,
            store,
            clock,
        }
    }

    pub async fn run(&self, task: RunnableTask, event: Event) -> Result<PlannedTask> {
        let planned = self.find_or_insert(task).await?;
        self.runner.run(&planned, event).await?;
        Ok(self.store.get(&planned.id).await?.unwrap_or(planned))
    }

    async fn find_or_insert(&self, task: RunnableTask) -> Result<PlannedTask> {
        if let Some(existing) = self.store.get_equivalent(&task).await? {
            return Ok(existing);
        }

        let planned = PlannedTask::new(
            PlanningType::Immediate,
            SchedulerType::None,
            task,
            self.clock.now_millis(),
        );
        match self.store.insert(planned.clone()).await {
            Ok(()) => Ok(planned),
            Err(DispatchError::DuplicatePlannedTask(_)) => self
                .store
                .get_equivalent(&planned.task)
                .await?
                .ok_or_else(|| DispatchError::PlannedTaskNotFound(planned.id.clone())),
            Err(err) => Err(err),
        }
    }
}
