// src/engine/due.rs

//! Due-task manager and interval arbiter.
//!
//! Works on a snapshot of the store taken at a fixed `current_time`. The
//! `interval_offset` tolerates early wake-ups: a task whose due time is less
//! than the offset away counts as due now.

use crate::dag::ForegroundChecker;
use crate::errors::Result;
use crate::store::PlannedTaskStore;
use crate::tasks::PlannedTask;
use crate::types::{PlanningType, Timestamp};

#[derive(Debug, Clone)]
pub struct DueTaskManager {
    /// Ascending by `next_run(current_time)`.
    tasks: Vec<PlannedTask>,
    interval_offset: i64,
    current_time: Timestamp,
}

impl DueTaskManager {
    pub fn new(tasks: Vec<PlannedTask>, interval_offset: i64, current_time: Timestamp) -> Self {
        Self {
            tasks,
            interval_offset,
            current_time,
        }
    }

    /// Snapshot the store's tasks of `planning_type`.
    pub async fn load(
        planning_type: PlanningType,
        store: &dyn PlannedTaskStore,
        interval_offset: i64,
        current_time: Timestamp,
    ) -> Result<Self> {
        let tasks = store.get_all_sorted_by_next_run(Some(planning_type)).await?;
        Ok(Self::new(tasks, interval_offset, current_time))
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn should_run(&self, task: &PlannedTask) -> bool {
        let last_update = task.last_update();
        if let Some(start_at) = task.task.start_at {
            if self.current_time < start_at - self.interval_offset {
                return false;
            }
            if last_update < start_at {
                return true;
            }
        }
        self.current_time >= last_update + task.task.interval_millis() - self.interval_offset
    }

    pub fn tasks_to_run(&self) -> Vec<PlannedTask> {
        self.tasks
            .iter()
            .filter(|task| self.should_run(task))
            .cloned()
            .collect()
    }

    /// True iff any due task, or anything it chains into, needs foreground.
    pub fn requires_foreground(&self, checker: &ForegroundChecker) -> Result<bool> {
        for task in self.tasks.iter().filter(|task| self.should_run(task)) {
            if checker.requires_foreground_through_chain(task.name())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Milliseconds until the earliest future run, or `None` when nothing
    /// will ever run again.
    ///
    /// A task due right now counts from its following cycle, so the wake
    /// window it is about to run in is not re-armed.
    pub fn next_interval(&self) -> Option<i64> {
        self.tasks
            .iter()
            .filter(|task| task.task.recurrent || !self.should_run(task))
            .map(|task| {
                let next = task.next_run(self.current_time);
                if next < self.interval_offset {
                    next + task.task.interval_millis()
                } else {
                    next
                }
            })
            .min()
    }

    pub fn will_continue(&self) -> bool {
        self.next_interval().is_some()
    }
}
