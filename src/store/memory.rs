// src/store/memory.rs

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::errors::{DispatchError, Result};
use crate::support::{Clock, SystemClock};
use crate::tasks::{PlannedTask, RunnableTask};
use crate::types::{BoxFuture, PlanningType, Timestamp};

use super::PlannedTaskStore;

/// Mutex-guarded vector of planned tasks. Clones share the same records.
#[derive(Debug, Clone)]
pub struct InMemoryPlannedTaskStore {
    tasks: Arc<Mutex<Vec<PlannedTask>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryPlannedTaskStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryPlannedTaskStore {
    /// `clock` drives the `next_run` ordering.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            clock,
        }
    }

    /// Snapshot of every record in insertion order.
    pub fn all(&self) -> Vec<PlannedTask> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PlannedTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut PlannedTask),
    {
        let mut tasks = self.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DispatchError::PlannedTaskNotFound(id.to_string()))?;
        f(task);
        Ok(())
    }
}

impl PlannedTaskStore for InMemoryPlannedTaskStore {
    fn insert(&self, task: PlannedTask) -> BoxFuture<'_, Result<()>> {
        let res = {
            let mut tasks = self.lock();
            if tasks.iter().any(|t| t.task.is_equivalent(&task.task)) {
                Err(DispatchError::DuplicatePlannedTask(format!(
                    "{{name={}, startAt={:?}, interval={}, recurrent={}}}",
                    task.task.name, task.task.start_at, task.task.interval, task.task.recurrent
                )))
            } else {
                debug!(planned_task = %task.id, task = %task.task.name, "stored planned task");
                tasks.push(task);
                Ok(())
            }
        };
        Box::pin(async move { res })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        self.lock().retain(|t| t.id != id);
        Box::pin(async { Ok(()) })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<PlannedTask>>> {
        let found = self.lock().iter().find(|t| t.id == id).cloned();
        Box::pin(async move { Ok(found) })
    }

    fn get_equivalent(&self, task: &RunnableTask) -> BoxFuture<'_, Result<Option<PlannedTask>>> {
        let found = self
            .lock()
            .iter()
            .find(|t| t.task.is_equivalent(task))
            .cloned();
        Box::pin(async move { Ok(found) })
    }

    fn get_all_sorted_by_next_run(
        &self,
        planning_type: Option<PlanningType>,
    ) -> BoxFuture<'_, Result<Vec<PlannedTask>>> {
        let now = self.clock.now_millis();
        let mut tasks: Vec<PlannedTask> = self
            .lock()
            .iter()
            .filter(|t| planning_type.is_none_or(|pt| t.planning_type == pt))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.next_run(now));
        Box::pin(async move { Ok(tasks) })
    }

    fn get_all_cancel_events(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        let mut events: Vec<String> = Vec::new();
        for task in self.lock().iter() {
            if !events.iter().any(|e| e == &task.task.cancel_event) {
                events.push(task.task.cancel_event.clone());
            }
        }
        Box::pin(async move { Ok(events) })
    }

    fn get_all_filtered_by_cancel_event(
        &self,
        cancel_event: &str,
    ) -> BoxFuture<'_, Result<Vec<PlannedTask>>> {
        let tasks: Vec<PlannedTask> = self
            .lock()
            .iter()
            .filter(|t| t.task.cancel_event == cancel_event)
            .cloned()
            .collect();
        Box::pin(async move { Ok(tasks) })
    }

    fn increase_error_count(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let res = self.update(id, |t| t.error_count += 1);
        Box::pin(async move { res })
    }

    fn increase_timeout_count(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let res = self.update(id, |t| t.timeout_count += 1);
        Box::pin(async move { res })
    }

    fn update_last_run(&self, id: &str, timestamp: Timestamp) -> BoxFuture<'_, Result<()>> {
        let res = self.update(id, |t| t.last_run = Some(timestamp));
        Box::pin(async move { res })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<()>> {
        self.lock().clear();
        Box::pin(async { Ok(()) })
    }
}
