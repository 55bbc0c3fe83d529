#![allow(dead_code)]

use taskdag::config::{DispatcherConfig, SchedulingConfig};
use taskdag::tasks::{PlannedTask, RunnableTask};
use taskdag::types::{PlanningType, SchedulerType, TaskParams, Timestamp};

pub const MINUTE_MS: i64 = 60_000;

/// Builder for `PlannedTask` fixtures. Times are given in minutes from t=0.
pub struct PlannedTaskBuilder {
    task: RunnableTask,
    planning_type: PlanningType,
    created_at: Timestamp,
    last_run: Option<Timestamp>,
    error_count: u32,
    timeout_count: u32,
}

impl PlannedTaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: RunnableTask {
                name: name.to_string(),
                start_at: None,
                interval: 0,
                recurrent: false,
                params: TaskParams::new(),
                cancel_event: "defaultCancelEvent".to_string(),
            },
            planning_type: PlanningType::Scheduled,
            created_at: 0,
            last_run: None,
            error_count: 0,
            timeout_count: 0,
        }
    }

    pub fn every_minutes(mut self, minutes: u64) -> Self {
        self.task.interval = minutes * 60;
        self.task.recurrent = true;
        self
    }

    pub fn after_minutes(mut self, minutes: u64) -> Self {
        self.task.interval = minutes * 60;
        self.task.recurrent = false;
        self
    }

    pub fn starting_at_minute(mut self, minute: i64) -> Self {
        self.task.start_at = Some(minute * MINUTE_MS);
        self
    }

    /// `None` means "never ran".
    pub fn last_run_minute(mut self, minute: Option<i64>) -> Self {
        self.last_run = minute.map(|m| m * MINUTE_MS);
        self
    }

    pub fn created_at_minute(mut self, minute: i64) -> Self {
        self.created_at = minute * MINUTE_MS;
        self
    }

    pub fn cancel_on(mut self, event: &str) -> Self {
        self.task.cancel_event = event.to_string();
        self
    }

    pub fn immediate(mut self) -> Self {
        self.planning_type = PlanningType::Immediate;
        self
    }

    pub fn with_errors(mut self, count: u32) -> Self {
        self.error_count = count;
        self
    }

    pub fn build(self) -> PlannedTask {
        let scheduler_type = match self.planning_type {
            PlanningType::Scheduled => SchedulerType::TimerBacked,
            PlanningType::Immediate => SchedulerType::None,
        };
        let mut planned =
            PlannedTask::new(self.planning_type, scheduler_type, self.task, self.created_at);
        planned.last_run = self.last_run;
        planned.error_count = self.error_count;
        planned.timeout_count = self.timeout_count;
        planned
    }
}

/// Builder for `DispatcherConfig`, validated on `build()`.
pub struct ConfigBuilder {
    toml: String,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            toml: "[scheduling]\n".to_string(),
        }
    }

    pub fn with(mut self, key: &str, value: i64) -> Self {
        self.toml.push_str(&format!("{key} = {value}\n"));
        self
    }

    pub fn build(self) -> DispatcherConfig {
        DispatcherConfig::from_toml_str(&self.toml)
            .expect("Failed to build valid config from builder")
    }

    pub fn scheduling(self) -> SchedulingConfig {
        self.build().scheduling
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
