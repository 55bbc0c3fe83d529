#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdag::scheduler::{AlarmScheduler, WakeAlarm};
use taskdag::store::InMemoryPlannedTaskStore;
use taskdag::support::{Clock, ManualClock};
use taskdag::tasks::{SimpleTask, TaskDefinition, TaskOutcome};
use taskdag::Collaborators;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmCall {
    Set(i64),
    Cancel,
}

/// `WakeAlarm` that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingAlarm {
    calls: Mutex<Vec<AlarmCall>>,
    up: AtomicBool,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AlarmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_set(&self) -> Option<i64> {
        self.calls().iter().rev().find_map(|call| match call {
            AlarmCall::Set(ms) => Some(*ms),
            AlarmCall::Cancel => None,
        })
    }
}

impl WakeAlarm for RecordingAlarm {
    fn set(&self, interval_ms: i64) {
        self.calls.lock().unwrap().push(AlarmCall::Set(interval_ms));
        self.up.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().push(AlarmCall::Cancel);
        self.up.store(false, Ordering::SeqCst);
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

/// In-memory collaborators sharing one manual clock.
pub struct Harness {
    pub clock: ManualClock,
    pub store: InMemoryPlannedTaskStore,
    pub alarm: Arc<RecordingAlarm>,
    pub scheduler: Arc<AlarmScheduler>,
}

impl Harness {
    pub fn new(start: i64) -> Self {
        let clock = ManualClock::new(start);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = InMemoryPlannedTaskStore::new(Arc::clone(&shared));
        let alarm = Arc::new(RecordingAlarm::new());
        let scheduler = Arc::new(AlarmScheduler::new(
            Arc::new(store.clone()),
            alarm.clone(),
            Arc::clone(&shared),
            60_000,
        ));
        Self {
            clock,
            store,
            alarm,
            scheduler,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: Arc::new(self.store.clone()),
            scheduler: self.scheduler.clone(),
            clock: self.clock(),
        }
    }
}

/// Task that counts its runs and completes on its default output.
pub fn counting_task(name: &str, runs: Arc<AtomicUsize>) -> TaskDefinition {
    SimpleTask::define(name, move |_ctx| {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(TaskOutcome::empty())
        }
    })
}

/// Task that appends its name to `log` on every run.
pub fn logging_task(name: &str, log: Arc<Mutex<Vec<String>>>) -> TaskDefinition {
    let own = name.to_string();
    SimpleTask::define(name, move |_ctx| {
        let log = Arc::clone(&log);
        let own = own.clone();
        async move {
            log.lock().unwrap().push(own);
            Ok(TaskOutcome::empty())
        }
    })
}

/// Task whose body always fails.
pub fn failing_task(name: &str) -> TaskDefinition {
    SimpleTask::define(name, |_ctx| async { Err(anyhow::anyhow!("boom")) })
}

/// Task that sleeps for `delay` before completing.
pub fn slow_task(name: &str, delay: Duration) -> TaskDefinition {
    SimpleTask::define(name, move |_ctx| async move {
        tokio::time::sleep(delay).await;
        Ok(TaskOutcome::empty())
    })
}
