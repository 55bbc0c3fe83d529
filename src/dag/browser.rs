// src/dag/browser.rs

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::errors::{DispatchError, Result};
use crate::tasks::{RunnableTask, Task, TaskRegistry};

/// A trigger event and the tasks it starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEntry {
    pub trigger: String,
    pub tasks: Vec<GraphTask>,
}

/// A bound task plus everything its output events trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphTask {
    #[serde(flatten)]
    pub task: RunnableTask,
    pub outputs: Vec<GraphEntry>,
}

/// Read-only view over `event name -> [RunnableTask]`.
///
/// Built once by the loader. Traversals resolve each task's output events
/// through the registry.
#[derive(Debug, Clone, Default)]
pub struct TaskGraphBrowser {
    /// Trigger names in first-bound order.
    order: Vec<String>,
    entries: HashMap<String, Vec<RunnableTask>>,
    registry: TaskRegistry,
}

impl TaskGraphBrowser {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
            registry,
        }
    }

    pub fn add_entry(&mut self, event_name: impl Into<String>, task: RunnableTask) {
        let event_name = event_name.into();
        if !self.entries.contains_key(&event_name) {
            self.order.push(event_name.clone());
        }
        self.entries.entry(event_name).or_default().push(task);
    }

    /// Known trigger names in first-bound order.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn triggered_by(&self, event_name: &str) -> &[RunnableTask] {
        self.entries
            .get(event_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every bound task once, in first-seen order.
    pub fn uniques(&self) -> Vec<&RunnableTask> {
        let mut uniques: Vec<&RunnableTask> = Vec::new();
        for event in &self.order {
            for task in self.triggered_by(event) {
                if !uniques.iter().any(|seen| *seen == task) {
                    uniques.push(task);
                }
            }
        }
        uniques
    }

    pub(crate) fn output_events_of(&self, task: &RunnableTask) -> Result<Vec<String>> {
        Ok(self.registry.get(&task.name)?.output_event_names().to_vec())
    }

    /// Whether any bound task matches.
    pub fn any<P>(&self, predicate: P) -> Result<bool>
    where
        P: Fn(&RunnableTask, &Task) -> bool,
    {
        for runnable in self.uniques() {
            let task = self.registry.get(&runnable.name)?;
            if predicate(runnable, task.as_ref()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any task reachable from `event_name` matches.
    pub fn any_from<P>(&self, event_name: &str, predicate: P) -> Result<bool>
    where
        P: Fn(&RunnableTask, &Task) -> bool,
    {
        let mut memo: HashMap<String, bool> = HashMap::new();
        let mut path: HashSet<String> = HashSet::new();
        self.any_from_memoized(event_name, &predicate, &mut memo, &mut path)
    }

    fn any_from_memoized<P>(
        &self,
        event_name: &str,
        predicate: &P,
        memo: &mut HashMap<String, bool>,
        path: &mut HashSet<String>,
    ) -> Result<bool>
    where
        P: Fn(&RunnableTask, &Task) -> bool,
    {
        if let Some(found) = memo.get(event_name) {
            return Ok(*found);
        }
        if !path.insert(event_name.to_string()) {
            return Err(cycle_at(event_name));
        }

        let mut found = false;
        for runnable in self.triggered_by(event_name) {
            let task = self.registry.get(&runnable.name)?;
            if predicate(runnable, task.as_ref()) {
                found = true;
                break;
            }
            for output in task.output_event_names() {
                if self.any_from_memoized(output, predicate, memo, path)? {
                    found = true;
                    break;
                }
            }
            if found {
                break;
            }
        }

        path.remove(event_name);
        memo.insert(event_name.to_string(), found);
        Ok(found)
    }

    /// The whole forest, rooted at triggers no task emits.
    pub fn depict(&self) -> Result<Vec<GraphEntry>> {
        self.root_events()?
            .into_iter()
            .map(|trigger| {
                let tasks = self.walk_from(&trigger)?;
                Ok(GraphEntry { trigger, tasks })
            })
            .collect()
    }

    pub fn walk_from(&self, event_name: &str) -> Result<Vec<GraphTask>> {
        let mut memo: HashMap<String, Vec<GraphTask>> = HashMap::new();
        let mut path: HashSet<String> = HashSet::new();
        self.walk_memoized(event_name, &mut memo, &mut path)
    }

    fn root_events(&self) -> Result<Vec<String>> {
        let mut emitted: HashSet<String> = HashSet::new();
        for runnable in self.uniques() {
            emitted.extend(self.output_events_of(runnable)?);
        }
        Ok(self
            .order
            .iter()
            .filter(|event| !emitted.contains(*event))
            .cloned()
            .collect())
    }

    fn walk_memoized(
        &self,
        event_name: &str,
        memo: &mut HashMap<String, Vec<GraphTask>>,
        path: &mut HashSet<String>,
    ) -> Result<Vec<GraphTask>> {
        if !self.entries.contains_key(event_name) {
            return Ok(Vec::new());
        }
        if let Some(tasks) = memo.get(event_name) {
            return Ok(tasks.clone());
        }
        if !path.insert(event_name.to_string()) {
            return Err(cycle_at(event_name));
        }

        let mut tasks = Vec::new();
        for runnable in self.triggered_by(event_name) {
            let mut outputs = Vec::new();
            for output in self.output_events_of(runnable)? {
                let children = self.walk_memoized(&output, memo, path)?;
                outputs.push(GraphEntry {
                    trigger: output,
                    tasks: children,
                });
            }
            tasks.push(GraphTask {
                task: runnable.clone(),
                outputs,
            });
        }

        path.remove(event_name);
        memo.insert(event_name.to_string(), tasks.clone());
        Ok(tasks)
    }
}

fn cycle_at(event_name: &str) -> DispatchError {
    DispatchError::CycleDetected(format!(
        "event '{event_name}' is reachable from its own outputs"
    ))
}
