// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::SchedulingConfig;
use crate::dag::ForegroundChecker;
use crate::errors::Result;
use crate::events::{DispatcherEvent, Event, EventBus, emit_timeout};
use crate::runners::{BatchTaskRunner, RunOutcome};
use crate::scheduler::WakeAlarm;
use crate::store::PlannedTaskStore;
use crate::support::Clock;
use crate::types::PlanningType;

use super::RuntimeEvent;
use super::due::DueTaskManager;

/// What one wake-up did.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeReport {
    /// Id of the execution window's start event, if one was opened.
    pub execution_id: Option<String>,
    /// Names of the planned tasks that ran, with their outcomes.
    pub ran: Vec<(String, Option<RunOutcome>)>,
    pub requires_foreground: bool,
    /// Delay the alarm was re-armed with (before clamping).
    pub next_interval: Option<i64>,
}

/// Reacts to wake-ups by running whatever scheduled work is due.
///
/// This is the async shell around [`DueTaskManager`]: it reads
/// [`RuntimeEvent`]s, re-arms the alarm and drives the batch runner.
pub struct WakeRuntime {
    store: Arc<dyn PlannedTaskStore>,
    runner: BatchTaskRunner,
    checker: ForegroundChecker,
    alarm: Arc<dyn WakeAlarm>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    scheduling: SchedulingConfig,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for WakeRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeRuntime")
            .field("scheduling", &self.scheduling)
            .field("alarm", &self.alarm)
            .finish_non_exhaustive()
    }
}

impl WakeRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn PlannedTaskStore>,
        runner: BatchTaskRunner,
        checker: ForegroundChecker,
        alarm: Arc<dyn WakeAlarm>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        scheduling: SchedulingConfig,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            store,
            runner,
            checker,
            alarm,
            bus,
            clock,
            scheduling,
            event_rx,
        }
    }

    /// Main event loop. Returns when shutdown is requested or the channel
    /// closes.
    pub async fn run(mut self) -> Result<()> {
        info!("wake runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "wake runtime received event");
            match event {
                RuntimeEvent::AlarmFired => match self.handle_wake().await {
                    Ok(report) => info!(
                        tasks = report.ran.len(),
                        next_interval_ms = ?report.next_interval,
                        "wake-up handled"
                    ),
                    Err(err) => error!(error = %err, "error while handling wake-up"),
                },
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping wake runtime");
                    break;
                }
            }
        }

        info!("wake runtime exiting");
        Ok(())
    }

    /// Re-arm the alarm, then run every due scheduled task inside one
    /// execution window.
    pub async fn handle_wake(&self) -> Result<WakeReport> {
        let now = self.clock.now_millis();
        let manager = DueTaskManager::load(
            PlanningType::Scheduled,
            self.store.as_ref(),
            self.scheduling.interval_offset_ms,
            now,
        )
        .await?;

        let next_interval = manager.next_interval();
        match next_interval {
            Some(next) => {
                let delay = next.max(self.scheduling.min_alarm_interval_ms);
                info!(delay_ms = delay, "next alarm armed");
                self.alarm.set(delay);
            }
            None => info!("nothing left to run; alarm not re-armed"),
        }

        let due = manager.tasks_to_run();
        if due.is_empty() {
            warn!("woken up without tasks to run");
            return Ok(WakeReport {
                execution_id: None,
                ran: Vec::new(),
                requires_foreground: false,
                next_interval,
            });
        }

        let requires_foreground = manager.requires_foreground(&self.checker)?;
        let timeout = next_interval
            .unwrap_or(0)
            .max(self.scheduling.min_timeout_ms);
        let start = Event::new(DispatcherEvent::TaskExecutionStarted).expiring_at(Some(now + timeout));

        let fire_in = (timeout - self.scheduling.timeout_event_offset_ms).max(0);
        info!(
            execution = %start.id(),
            timeout_ms = fire_in,
            foreground = requires_foreground,
            tasks = due.len(),
            "opening execution window"
        );
        let timer = {
            let bus = self.bus.clone();
            let id = start.id().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(fire_in as u64)).await;
                warn!(execution = %id, "execution timed out");
                emit_timeout(&bus, &id);
            })
        };

        let outcomes = self.runner.run(&due, &start).await;
        timer.abort();

        let ran = due
            .iter()
            .map(|task| task.name().to_string())
            .zip(outcomes)
            .collect();

        Ok(WakeReport {
            execution_id: Some(start.id().to_string()),
            ran,
            requires_foreground,
            next_interval,
        })
    }
}
