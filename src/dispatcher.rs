// src/dispatcher.rs

//! Public entry point wiring the scheduling core together.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::DispatcherConfig;
use crate::dag::{ForegroundChecker, TaskGraph, TaskGraphBrowser, TaskGraphLoader};
use crate::engine::{RuntimeEvent, WakeRuntime};
use crate::errors::Result;
use crate::events::{Event, EventBus, EventData};
use crate::planner::{TaskCancelManager, TaskPlanner};
use crate::runners::{BatchTaskRunner, InstantTaskRunner, SingleTaskRunner};
use crate::scheduler::{TimeBasedScheduler, WakeAlarm};
use crate::store::PlannedTaskStore;
use crate::support::{Clock, spawn_detached};
use crate::tasks::{RunnableTaskBuilder, TaskDefinition, TaskDeferrer, TaskRegistry};
use crate::types::{TaskParams, TimeUnit};

/// External collaborators the core consumes.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub store: Arc<dyn PlannedTaskStore>,
    pub scheduler: Arc<dyn TimeBasedScheduler>,
    pub clock: Arc<dyn Clock>,
}

pub struct TaskDispatcher {
    bus: EventBus,
    registry: TaskRegistry,
    planner: TaskPlanner,
    loader: TaskGraphLoader,
    runner: SingleTaskRunner,
    store: Arc<dyn PlannedTaskStore>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
}

impl fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("tasks", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TaskDispatcher {
    /// Register `tasks`, load `graph` and subscribe its bindings.
    pub async fn init(
        tasks: Vec<TaskDefinition>,
        graph: &dyn TaskGraph,
        collaborators: Collaborators,
        config: DispatcherConfig,
    ) -> Result<Self> {
        let Collaborators {
            store,
            scheduler,
            clock,
        } = collaborators;

        let bus = EventBus::new();
        let registry = TaskRegistry::new(tasks, &bus, Arc::clone(&clock))?;

        let runner = SingleTaskRunner::new(
            registry.clone(),
            Arc::clone(&store),
            bus.clone(),
            Arc::clone(&clock),
            config.scheduling.failure_threshold,
        );
        let cancel_manager =
            TaskCancelManager::new(Arc::clone(&store), Arc::clone(&scheduler), bus.clone());
        let planner = TaskPlanner::new(
            registry.clone(),
            Arc::clone(&store),
            scheduler,
            InstantTaskRunner::new(runner.clone(), Arc::clone(&store), Arc::clone(&clock)),
            cancel_manager,
            bus.clone(),
        );
        registry.install_deferrer(Arc::new(PlannerDeferrer {
            planner: planner.clone(),
            clock: Arc::clone(&clock),
        }));

        let loader = TaskGraphLoader::new(
            registry.clone(),
            bus.clone(),
            planner.clone(),
            Arc::clone(&clock),
        );
        loader.load(graph).await?;
        info!(tasks = registry.len(), "task dispatcher initialised");

        Ok(Self {
            bus,
            registry,
            planner,
            loader,
            runner,
            store,
            clock,
            config,
        })
    }

    /// True iff every task in the graph passes its pre-run guard.
    pub async fn is_ready(&self) -> Result<bool> {
        self.loader.is_ready().await
    }

    /// Prepare every task that is not ready yet.
    pub async fn prepare(&self) -> Result<()> {
        self.loader.prepare().await
    }

    /// Publish an application event, starting a new chain.
    pub fn emit_event(&self, name: impl Into<String>, data: Option<EventData>) -> Event {
        let event = Event::new(name).with_data(data.unwrap_or_default());
        info!(event = %event.name(), chain = %event.id(), "emitting event");
        self.bus.publish(&event);
        event
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn planner(&self) -> &TaskPlanner {
        &self.planner
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn browser(&self) -> Result<Arc<TaskGraphBrowser>> {
        self.loader.browser()
    }

    pub fn foreground_checker(&self) -> Result<ForegroundChecker> {
        Ok(ForegroundChecker::new(self.registry.clone(), self.browser()?))
    }

    /// Build the runtime that reacts to `alarm` firing.
    ///
    /// `alarm` should be the same one backing the time-based scheduler.
    pub fn wake_runtime(
        &self,
        alarm: Arc<dyn WakeAlarm>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Result<WakeRuntime> {
        Ok(WakeRuntime::new(
            Arc::clone(&self.store),
            BatchTaskRunner::new(self.runner.clone()),
            self.foreground_checker()?,
            alarm,
            self.bus.clone(),
            Arc::clone(&self.clock),
            self.config.scheduling,
            event_rx,
        ))
    }
}

/// Re-plans a task as a one-shot delayed run through the planner.
struct PlannerDeferrer {
    planner: TaskPlanner,
    clock: Arc<dyn Clock>,
}

impl TaskDeferrer for PlannerDeferrer {
    fn defer(&self, task_name: &str, seconds: u64, params: TaskParams) {
        let task = RunnableTaskBuilder::new(task_name, params)
            .with_clock(Arc::clone(&self.clock))
            .after(seconds, TimeUnit::Seconds)
            .build();
        let planner = self.planner.clone();
        spawn_detached("defer task", async move {
            let name = task.name.clone();
            if let Err(err) = planner.plan(task, None).await {
                error!(task = %name, error = %err, "could not defer task");
            }
        });
    }
}
