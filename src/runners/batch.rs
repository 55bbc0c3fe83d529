// src/runners/batch.rs

use futures_util::future::join_all;
use tracing::{error, info};

use crate::events::{DispatcherEvent, Event, emit_timeout};
use crate::tasks::PlannedTask;

use super::single::{RunOutcome, SingleTaskRunner};

/// Runs many planned tasks concurrently inside one execution window.
///
/// Each task gets a private start event with the batch's expiration and a
/// shim forwarding the batch timeout to it.
#[derive(Debug, Clone)]
pub struct BatchTaskRunner {
    runner: SingleTaskRunner,
}

impl BatchTaskRunner {
    pub fn new(runner: SingleTaskRunner) -> Self {
        Self { runner }
    }

    /// Outcome per task, in input order. `None` when the run could not
    /// even be attempted (unknown task, store failure).
    pub async fn run(&self, tasks: &[PlannedTask], start_event: &Event) -> Vec<Option<RunOutcome>> {
        info!(
            execution = %start_event.id(),
            tasks = tasks.len(),
            "running task batch"
        );
        let runs = tasks
            .iter()
            .map(|planned| self.run_with_own_start_event(planned, start_event));
        join_all(runs).await
    }

    async fn run_with_own_start_event(
        &self,
        planned: &PlannedTask,
        batch_start: &Event,
    ) -> Option<RunOutcome> {
        let bus = self.runner.bus().clone();
        let start = Event::new(DispatcherEvent::TaskExecutionStarted)
            .expiring_at(batch_start.expiration_timestamp());

        let batch_id = batch_start.id().to_string();
        let own_id = start.id().to_string();
        let shim_bus = bus.clone();
        let shim = bus.subscribe_once(
            DispatcherEvent::TaskExecutionTimedOut.as_str(),
            move |evt| evt.id() == batch_id,
            move |_| emit_timeout(&shim_bus, &own_id),
        );

        let outcome = self.runner.run(planned, start).await;
        bus.unsubscribe(DispatcherEvent::TaskExecutionTimedOut.as_str(), Some(shim));

        match outcome {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!(
                    planned_task = %planned.id,
                    task = %planned.name(),
                    error = %err,
                    "could not run planned task"
                );
                None
            }
        }
    }
}
