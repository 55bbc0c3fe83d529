// src/planner/cancel_manager.rs

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info};

use crate::errors::Result;
use crate::events::{EventBus, TaskChainResult, finalize_chain};
use crate::scheduler::TimeBasedScheduler;
use crate::store::PlannedTaskStore;
use crate::support::spawn_detached;
use crate::tasks::PlannedTask;
use crate::types::PlanningType;

struct CancelInner {
    store: Arc<dyn PlannedTaskStore>,
    scheduler: Arc<dyn TimeBasedScheduler>,
    bus: EventBus,
    /// Cancel events with a live one-shot subscription.
    watched: Mutex<HashSet<String>>,
}

/// Watches every cancel event referenced by planned work and removes that
/// work when the event fires.
#[derive(Clone)]
pub struct TaskCancelManager {
    inner: Arc<CancelInner>,
}

impl fmt::Debug for TaskCancelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCancelManager")
            .field("watched", &*self.watched())
            .finish_non_exhaustive()
    }
}

impl TaskCancelManager {
    pub fn new(
        store: Arc<dyn PlannedTaskStore>,
        scheduler: Arc<dyn TimeBasedScheduler>,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                store,
                scheduler,
                bus,
                watched: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Subscribe to every cancel event currently referenced in the store.
    pub async fn init(&self) -> Result<()> {
        let events = self.inner.store.get_all_cancel_events().await?;
        for event in events {
            self.listen_to(&event);
        }
        Ok(())
    }

    pub fn add(&self, planned: &PlannedTask) {
        self.listen_to(planned.cancel_event());
    }

    pub fn is_watching(&self, cancel_event: &str) -> bool {
        self.watched().contains(cancel_event)
    }

    fn listen_to(&self, cancel_event: &str) {
        if !self.watched().insert(cancel_event.to_string()) {
            return;
        }

        let this = self.clone();
        self.inner.bus.subscribe_once(
            cancel_event,
            |_| true,
            move |event| {
                let event = event.clone();
                this.watched().remove(event.name());
                spawn_detached("cancel planned tasks", async move {
                    let result = match this.cancel_by_event_name(event.name()).await {
                        Ok(()) => TaskChainResult::ok(),
                        Err(err) => TaskChainResult::error(err),
                    };
                    finalize_chain(&this.inner.bus, event.id(), result);
                });
            },
        );
    }

    /// Cancel every planned task bound to `cancel_event`.
    ///
    /// Per-task failures are logged and do not stop the rest.
    pub async fn cancel_by_event_name(&self, cancel_event: &str) -> Result<()> {
        let tasks = self
            .inner
            .store
            .get_all_filtered_by_cancel_event(cancel_event)
            .await?;
        info!(event = %cancel_event, tasks = tasks.len(), "cancelling planned tasks");

        for task in &tasks {
            self.cancel_task(task).await;
        }
        Ok(())
    }

    async fn cancel_task(&self, task: &PlannedTask) {
        let res = match task.planning_type {
            PlanningType::Scheduled => self.inner.scheduler.cancel(&task.id).await,
            PlanningType::Immediate => self.inner.store.delete(&task.id).await,
        };
        if let Err(err) = res {
            error!(
                planned_task = %task.id,
                task = %task.name(),
                start_at = ?task.task.start_at,
                interval_s = task.task.interval,
                recurrent = task.task.recurrent,
                error = %err,
                "error cancelling task"
            );
        }
    }

    fn watched(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner
            .watched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
