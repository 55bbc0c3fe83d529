// src/tasks/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{DispatchError, Result};
use crate::events::EventBus;
use crate::support::Clock;

use super::task::{Task, TaskDefinition, TaskDeferrer};

/// Name to task lookup, populated once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<Task>>,
    order: Vec<String>,
}

impl TaskRegistry {
    pub fn new(
        definitions: Vec<TaskDefinition>,
        bus: &EventBus,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut tasks = HashMap::new();
        let mut order = Vec::new();

        for definition in definitions {
            if tasks.contains_key(&definition.name) {
                return Err(DispatchError::ConfigError(format!(
                    "task '{}' is registered more than once",
                    definition.name
                )));
            }
            let name = definition.name.clone();
            let task = Task::new(definition, bus.clone(), Arc::clone(&clock));
            debug!(task = %name, "registered task");
            tasks.insert(name.clone(), task);
            order.push(name);
        }

        Ok(Self { tasks, order })
    }

    pub fn get(&self, name: &str) -> Result<Arc<Task>> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Fails with `TaskNotFound` for unknown names.
    pub fn ensure_exists(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(DispatchError::TaskNotFound(name.to_string()))
        }
    }

    /// Tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn install_deferrer(&self, deferrer: Arc<dyn TaskDeferrer>) {
        for task in self.tasks.values() {
            task.set_deferrer(Arc::clone(&deferrer));
        }
    }
}
