// src/dag/loader.rs

//! One-time loading of the task graph.
//!
//! A [`TaskGraph`] describes its bindings through a [`GraphBinder`]. Loading
//! validates them, builds the [`TaskGraphBrowser`], subscribes every binding
//! to the bus and initialises the cancel manager from the store.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::errors::{DispatchError, Result};
use crate::events::{Event, EventBus};
use crate::planner::{TaskPlanner, TaskPlannerParallelizer};
use crate::support::{Clock, spawn_detached};
use crate::tasks::{RunnableTask, RunnableTaskBuilder, Task, TaskRegistry};
use crate::types::TaskParams;

use super::browser::TaskGraphBrowser;

/// A declarative description of which events start which tasks.
pub trait TaskGraph: Send + Sync {
    fn describe(&self, binder: &mut GraphBinder) -> Result<()>;
}

impl<F> TaskGraph for F
where
    F: Fn(&mut GraphBinder) -> Result<()> + Send + Sync,
{
    fn describe(&self, binder: &mut GraphBinder) -> Result<()> {
        self(binder)
    }
}

/// Collects `(event, runnable task)` bindings while a graph is described.
#[derive(Debug)]
pub struct GraphBinder {
    registry: TaskRegistry,
    clock: Arc<dyn Clock>,
    bindings: Vec<(String, RunnableTask)>,
}

impl GraphBinder {
    fn new(registry: TaskRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            clock,
            bindings: Vec::new(),
        }
    }

    /// Start describing how to run `task_name`. Fails fast on unknown names.
    pub fn run(&self, task_name: &str) -> Result<RunnableTaskBuilder> {
        self.run_with(task_name, TaskParams::new())
    }

    pub fn run_with(&self, task_name: &str, params: TaskParams) -> Result<RunnableTaskBuilder> {
        self.registry.ensure_exists(task_name)?;
        Ok(RunnableTaskBuilder::new(task_name, params).with_clock(Arc::clone(&self.clock)))
    }

    /// Run whatever `builder` describes each time `event_name` is published.
    pub fn on(&mut self, event_name: impl Into<String>, builder: RunnableTaskBuilder) {
        self.bindings.push((event_name.into(), builder.build()));
    }
}

/// Everything that exists only once a graph has been loaded.
#[derive(Debug)]
struct LoadedGraph {
    browser: Arc<TaskGraphBrowser>,
    parallelizer: TaskPlannerParallelizer,
    tasks: Vec<Arc<Task>>,
}

#[derive(Debug)]
pub struct TaskGraphLoader {
    registry: TaskRegistry,
    bus: EventBus,
    planner: TaskPlanner,
    clock: Arc<dyn Clock>,
    loaded: Mutex<Option<Arc<LoadedGraph>>>,
}

impl TaskGraphLoader {
    pub fn new(
        registry: TaskRegistry,
        bus: EventBus,
        planner: TaskPlanner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            bus,
            planner,
            clock,
            loaded: Mutex::new(None),
        }
    }

    /// Describe, validate and wire `graph`. Only one graph may ever be loaded.
    pub async fn load(&self, graph: &dyn TaskGraph) -> Result<Arc<TaskGraphBrowser>> {
        if self.slot().is_some() {
            return Err(DispatchError::GraphLoadedTwice);
        }

        info!("loading task graph");
        let mut binder = GraphBinder::new(self.registry.clone(), Arc::clone(&self.clock));
        graph.describe(&mut binder)?;

        let mut browser = TaskGraphBrowser::new(self.registry.clone());
        let mut tasks: Vec<Arc<Task>> = Vec::new();
        for (event_name, runnable) in &binder.bindings {
            let task = self.registry.get(&runnable.name)?;
            if !tasks.iter().any(|t| Arc::ptr_eq(t, &task)) {
                tasks.push(task);
            }
            browser.add_entry(event_name.clone(), runnable.clone());
        }
        browser.ensure_acyclic()?;

        let browser = Arc::new(browser);
        let loaded = Arc::new(LoadedGraph {
            browser: Arc::clone(&browser),
            parallelizer: TaskPlannerParallelizer::new(Arc::clone(&browser), self.bus.clone()),
            tasks,
        });

        {
            let mut slot = self.slot();
            if slot.is_some() {
                return Err(DispatchError::GraphLoadedTwice);
            }
            *slot = Some(Arc::clone(&loaded));
        }

        for (event_name, runnable) in binder.bindings {
            self.bind(&loaded, event_name, runnable);
        }

        self.planner.cancel_manager().init().await?;
        info!(bindings = browser.uniques().len(), "task graph loaded");
        Ok(browser)
    }

    pub fn browser(&self) -> Result<Arc<TaskGraphBrowser>> {
        Ok(Arc::clone(&self.loaded()?.browser))
    }

    pub fn parallelizer(&self) -> Result<TaskPlannerParallelizer> {
        Ok(self.loaded()?.parallelizer.clone())
    }

    /// True iff every task the graph references passes its pre-run guard.
    pub async fn is_ready(&self) -> Result<bool> {
        Ok(self.tasks_not_ready().await?.is_empty())
    }

    /// Call `prepare()` on every task that is not ready yet.
    pub async fn prepare(&self) -> Result<()> {
        let pending = self.tasks_not_ready().await?;
        info!(tasks = pending.len(), "preparing tasks");
        for task in pending {
            task.prepare().await?;
        }
        Ok(())
    }

    pub async fn tasks_not_ready(&self) -> Result<Vec<Arc<Task>>> {
        let loaded = self.loaded()?;
        let mut not_ready = Vec::new();
        for task in &loaded.tasks {
            if let Err(err) = task.check_if_can_run().await {
                debug!(task = %task.name(), error = %err, "task not ready");
                not_ready.push(Arc::clone(task));
            }
        }
        Ok(not_ready)
    }

    /// Subscribe `runnable` to `event_name` and tear the binding down when
    /// its cancel event fires.
    fn bind(&self, loaded: &Arc<LoadedGraph>, event_name: String, runnable: RunnableTask) {
        let planner = self.planner.clone();
        let parallelizer = loaded.parallelizer.clone();
        let cancel_event = runnable.cancel_event.clone();

        let listener = self.bus.subscribe(&event_name, move |event: &Event| {
            let child = parallelizer.spawn_child_event(event);
            let planner = planner.clone();
            let runnable = runnable.clone();
            spawn_detached("plan bound task", async move {
                let name = runnable.name.clone();
                match planner.plan(runnable, Some(child)).await {
                    Ok(planned) => debug!(
                        planned_task = %planned.id,
                        task = %planned.name(),
                        "task planned"
                    ),
                    Err(err) => error!(task = %name, error = %err, "error while planning"),
                }
            });
        });

        let bus = self.bus.clone();
        let bound_event = event_name.clone();
        let parallelizer = loaded.parallelizer.clone();
        self.bus.subscribe_once(
            &cancel_event,
            |_| true,
            move |_| {
                debug!(event = %bound_event, "binding torn down by cancel event");
                bus.unsubscribe(&bound_event, Some(listener));
                parallelizer.retire_binding(&bound_event);
            },
        );
        debug!(event = %event_name, cancel_event = %cancel_event, "binding subscribed");
    }

    fn loaded(&self) -> Result<Arc<LoadedGraph>> {
        self.slot().clone().ok_or(DispatchError::GraphNotLoaded)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<LoadedGraph>>> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
