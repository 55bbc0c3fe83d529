// src/dag/foreground.rs

use std::sync::Arc;

use crate::dag::browser::TaskGraphBrowser;
use crate::errors::Result;
use crate::tasks::TaskRegistry;

/// Answers whether running a task needs the foreground execution host.
#[derive(Debug, Clone)]
pub struct ForegroundChecker {
    registry: TaskRegistry,
    browser: Arc<TaskGraphBrowser>,
}

impl ForegroundChecker {
    pub fn new(registry: TaskRegistry, browser: Arc<TaskGraphBrowser>) -> Self {
        Self { registry, browser }
    }

    /// True if the task itself runs in foreground or anything reachable
    /// through its output events does.
    pub fn requires_foreground_through_chain(&self, task_name: &str) -> Result<bool> {
        let task = self.registry.get(task_name)?;
        if !task.runs_in_background() {
            return Ok(true);
        }
        for output in task.output_event_names() {
            let found = self
                .browser
                .any_from(output, |_, child| !child.runs_in_background())?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
