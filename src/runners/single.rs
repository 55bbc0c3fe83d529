// src/runners/single.rs

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::events::{DispatcherEvent, Event, EventBus};
use crate::store::PlannedTaskStore;
use crate::support::Clock;
use crate::tasks::{PlannedTask, Task, TaskRegistry};

/// How one execution attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task finished and its downstream chain signalled completion.
    Completed,
    /// The execution window's timeout fired first.
    TimedOut,
    /// The task body (or its pre-run guard) failed.
    Failed(String),
}

/// Runs one planned task and records the attempt in the store.
#[derive(Clone)]
pub struct SingleTaskRunner {
    registry: TaskRegistry,
    store: Arc<dyn PlannedTaskStore>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    failure_threshold: u32,
}

impl std::fmt::Debug for SingleTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleTaskRunner")
            .field("failure_threshold", &self.failure_threshold)
            .finish_non_exhaustive()
    }
}

impl SingleTaskRunner {
    pub fn new(
        registry: TaskRegistry,
        store: Arc<dyn PlannedTaskStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        failure_threshold: u32,
    ) -> Self {
        Self {
            registry,
            store,
            bus,
            clock,
            failure_threshold,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Execute `planned` for the chain started by `start_event`.
    ///
    /// The attempt is persisted before the task runs. Failures and timeouts
    /// are counted on the record, not returned; only store errors and
    /// unknown task names escape.
    pub async fn run(&self, planned: &PlannedTask, start_event: Event) -> Result<RunOutcome> {
        let task = self.registry.get(planned.name())?;

        self.store
            .update_last_run(&planned.id, self.clock.now_millis())
            .await?;

        let outcome = self.run_with_timeout(&task, planned, start_event).await;
        match &outcome {
            RunOutcome::Completed => {
                debug!(planned_task = %planned.id, task = %planned.name(), "run completed");
            }
            RunOutcome::TimedOut => {
                warn!(planned_task = %planned.id, task = %planned.name(), "run timed out");
                task.cancel();
                self.store.increase_timeout_count(&planned.id).await?;
            }
            RunOutcome::Failed(reason) => {
                warn!(
                    planned_task = %planned.id,
                    task = %planned.name(),
                    reason = %reason,
                    "run failed"
                );
                self.store.increase_error_count(&planned.id).await?;
            }
        }

        if planned.task.is_one_shot() {
            self.handle_one_shot(&planned.id).await?;
        }

        Ok(outcome)
    }

    /// Resolves when the task and its downstream chain have both finished,
    /// or when a timeout scoped to the start event fires, whichever is first.
    async fn run_with_timeout(
        &self,
        task: &Arc<Task>,
        planned: &PlannedTask,
        start_event: Event,
    ) -> RunOutcome {
        let chain_id = start_event.id().to_string();
        let timeout = self
            .bus
            .wait_for(DispatcherEvent::TaskExecutionTimedOut.as_str(), chain_id.as_str());
        let chain_finished = self.bus.wait_for_chain(chain_id.as_str());

        let run = {
            let task = Arc::clone(task);
            let params = planned.task.params.clone();
            tokio::spawn(async move { task.run(params, start_event).await })
        };

        let completion = async move {
            match run.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return RunOutcome::Failed(err.to_string()),
                Err(join_err) => return RunOutcome::Failed(join_err.to_string()),
            }
            let _ = chain_finished.await;
            RunOutcome::Completed
        };

        tokio::select! {
            outcome = completion => outcome,
            _ = timeout => RunOutcome::TimedOut,
        }
    }

    async fn handle_one_shot(&self, id: &str) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };

        if record.error_count == 0 && record.timeout_count == 0 {
            self.store.delete(id).await?;
            debug!(planned_task = %id, "one-shot task done; record removed");
        } else if record.error_count > self.failure_threshold
            || record.timeout_count > self.failure_threshold
        {
            info!(
                planned_task = %id,
                error_count = record.error_count,
                timeout_count = record.timeout_count,
                "one-shot planned task discarded"
            );
            self.store.delete(id).await?;
        }
        Ok(())
    }
}
