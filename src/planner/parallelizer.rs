// src/planner/parallelizer.rs

//! Fan-out of one event to sibling tasks and join of their chains.
//!
//! Timeouts propagate top-down (parent timeout to every active child) and
//! completions bottom-up (the parent chain finishes once every child has).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::dag::TaskGraphBrowser;
use crate::events::{
    DispatcherEvent, Event, EventBus, ListenerId, TaskChainResult, emit_timeout, finalize_chain,
};

#[derive(Debug)]
struct JoinRecord {
    parent_id: String,
    expected: usize,
    active: HashSet<String>,
    timed_out: bool,
    timeout_listener: ListenerId,
}

#[derive(Debug, Clone)]
pub struct TaskPlannerParallelizer {
    browser: Arc<TaskGraphBrowser>,
    bus: EventBus,
    joins: Arc<Mutex<HashMap<String, JoinRecord>>>,
    /// Bindings per trigger event whose listener was torn down.
    retired: Arc<Mutex<HashMap<String, usize>>>,
}

impl TaskPlannerParallelizer {
    pub fn new(browser: Arc<TaskGraphBrowser>, bus: EventBus) -> Self {
        Self {
            browser,
            bus,
            joins: Arc::new(Mutex::new(HashMap::new())),
            retired: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stop counting one binding of `event_name` as a sibling.
    pub fn retire_binding(&self, event_name: &str) {
        let mut retired = self
            .retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *retired.entry(event_name.to_string()).or_insert(0) += 1;
        debug!(event = %event_name, "binding retired from fan-out");
    }

    /// Bindings of `event_name` that still listen on the bus.
    pub fn live_siblings(&self, event_name: &str) -> usize {
        let retired = self
            .retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event_name)
            .copied()
            .unwrap_or(0);
        self.browser
            .triggered_by(event_name)
            .len()
            .saturating_sub(retired)
    }

    /// Child event for one of the siblings triggered by `parent`.
    ///
    /// Returns `parent` itself when fewer than two live bindings share its
    /// trigger.
    /// The child is registered in the join record before it is returned.
    pub fn spawn_child_event(&self, parent: &Event) -> Event {
        let siblings = self.live_siblings(parent.name());
        if siblings < 2 {
            return parent.clone();
        }

        let trigger_id = format!("{}#{}", parent.name(), parent.id());
        let child = Event::new(parent.name())
            .with_data(parent.data().clone())
            .expiring_at(parent.expiration_timestamp());

        {
            let mut joins = self.lock();
            if !joins.contains_key(&trigger_id) {
                let timeout_listener = self.setup_timeout_propagation(&trigger_id, parent.id());
                joins.insert(
                    trigger_id.clone(),
                    JoinRecord {
                        parent_id: parent.id().to_string(),
                        expected: siblings,
                        active: HashSet::new(),
                        timed_out: false,
                        timeout_listener,
                    },
                );
            }
            if let Some(record) = joins.get_mut(&trigger_id) {
                record.active.insert(child.id().to_string());
            }
        }

        self.setup_finalization_sink(child.id(), &trigger_id);
        debug!(trigger = %trigger_id, child = %child.id(), "spawned child event");
        child
    }

    /// Number of fan-outs still waiting on children.
    pub fn pending_joins(&self) -> usize {
        self.lock().len()
    }

    fn setup_timeout_propagation(&self, trigger_id: &str, parent_id: &str) -> ListenerId {
        let parent_id = parent_id.to_string();
        let trigger_id = trigger_id.to_string();
        let joins = Arc::clone(&self.joins);
        let bus = self.bus.clone();

        self.bus.subscribe_once(
            DispatcherEvent::TaskExecutionTimedOut.as_str(),
            move |evt| evt.id() == parent_id,
            move |_| {
                let children: Vec<String> = {
                    let mut joins = lock(&joins);
                    let Some(record) = joins.get_mut(&trigger_id) else {
                        return;
                    };
                    record.timed_out = true;
                    record.active.iter().cloned().collect()
                };
                debug!(trigger = %trigger_id, children = children.len(), "propagating timeout");
                for child in children {
                    emit_timeout(&bus, &child);
                }
            },
        )
    }

    fn setup_finalization_sink(&self, child_id: &str, trigger_id: &str) {
        let own_id = child_id.to_string();
        let trigger_id = trigger_id.to_string();
        let joins = Arc::clone(&self.joins);
        let bus = self.bus.clone();

        self.bus.subscribe_once(
            DispatcherEvent::TaskChainFinished.as_str(),
            move |evt| evt.id() == own_id,
            move |evt| {
                let finished = {
                    let mut joins = lock(&joins);
                    let Some(record) = joins.get_mut(&trigger_id) else {
                        return;
                    };
                    record.active.remove(evt.id());
                    record.expected = record.expected.saturating_sub(1);
                    if record.expected > 0 {
                        return;
                    }
                    joins.remove(&trigger_id)
                };

                if let Some(record) = finished {
                    if !record.timed_out {
                        bus.unsubscribe(
                            DispatcherEvent::TaskExecutionTimedOut.as_str(),
                            Some(record.timeout_listener),
                        );
                    }
                    let result = if record.timed_out {
                        TaskChainResult::cancelled(Some("execution timed out".to_string()))
                    } else {
                        TaskChainResult::ok()
                    };
                    finalize_chain(&bus, &record.parent_id, result);
                }
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JoinRecord>> {
        lock(&self.joins)
    }
}

fn lock(joins: &Mutex<HashMap<String, JoinRecord>>) -> MutexGuard<'_, HashMap<String, JoinRecord>> {
    joins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
