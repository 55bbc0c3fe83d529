// src/tasks/planned.rs

use serde::{Deserialize, Serialize};

use crate::support::new_id;
use crate::types::{PlanningType, SchedulerType, Timestamp};

use super::runnable::RunnableTask;

/// A runnable task with durable identity and execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub id: String,
    pub planning_type: PlanningType,
    pub scheduler_type: SchedulerType,
    #[serde(flatten)]
    pub task: RunnableTask,
    pub created_at: Timestamp,
    #[serde(default)]
    pub last_run: Option<Timestamp>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub timeout_count: u32,
}

impl PlannedTask {
    pub fn new(
        planning_type: PlanningType,
        scheduler_type: SchedulerType,
        task: RunnableTask,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: new_id(),
            planning_type,
            scheduler_type,
            task,
            created_at,
            last_run: None,
            error_count: 0,
            timeout_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }

    pub fn cancel_event(&self) -> &str {
        &self.task.cancel_event
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_run.unwrap_or(self.created_at)
    }

    /// Milliseconds until the next run. Negative when overdue.
    pub fn next_run(&self, now: Timestamp) -> i64 {
        match self.task.start_at {
            Some(start_at) if now < start_at => start_at - now,
            _ => self.task.interval_millis() - (now - self.last_update()),
        }
    }
}
