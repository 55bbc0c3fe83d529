// tests/runners.rs

mod common;
use crate::common::builders::PlannedTaskBuilder;
use crate::common::fakes::{Harness, counting_task, failing_task};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use taskdag::events::{DispatcherEvent, Event, EventBus, emit_timeout};
use taskdag::runners::{BatchTaskRunner, InstantTaskRunner, RunOutcome, SingleTaskRunner};
use taskdag::store::PlannedTaskStore;
use taskdag::tasks::{PlannedTask, RunnableTaskBuilder, SimpleTask, TaskDefinition, TaskOutcome, TaskRegistry};
use taskdag::types::TaskParams;

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    h: Harness,
    bus: EventBus,
    runner: SingleTaskRunner,
}

fn fixture(defs: Vec<TaskDefinition>) -> Fixture {
    let h = Harness::new(600_000);
    let bus = EventBus::new();
    let registry = TaskRegistry::new(defs, &bus, h.clock()).expect("valid registry");
    let runner = SingleTaskRunner::new(registry, Arc::new(h.store.clone()), bus.clone(), h.clock(), 3);
    Fixture { h, bus, runner }
}

/// Task that signals `started` and then blocks until cancelled.
fn blocking_task(name: &str, started: Arc<Notify>) -> TaskDefinition {
    SimpleTask::define(name, move |ctx| {
        let started = Arc::clone(&started);
        async move {
            started.notify_one();
            ctx.cancellation_token().cancelled().await;
            Ok(TaskOutcome::empty())
        }
    })
}

async fn stored(f: &Fixture, planned: PlannedTask) -> Result<PlannedTask, Box<dyn Error>> {
    f.h.store.insert(planned.clone()).await?;
    Ok(planned)
}

fn start() -> Event {
    Event::new(DispatcherEvent::TaskExecutionStarted)
}

#[tokio::test]
async fn successful_one_shot_is_removed() -> TestResult {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let f = fixture(vec![counting_task("once", Arc::clone(&runs))]);
    let planned = stored(&f, PlannedTaskBuilder::new("once").after_minutes(1).build()).await?;

    let outcome = f.runner.run(&planned, start()).await?;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(f.h.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn recurrent_task_records_last_run() -> TestResult {
    init_tracing();
    let f = fixture(vec![counting_task("tick", Arc::new(AtomicUsize::new(0)))]);
    let planned = stored(&f, PlannedTaskBuilder::new("tick").every_minutes(1).build()).await?;

    f.runner.run(&planned, start()).await?;

    let record = f.h.store.get(&planned.id).await?.ok_or("record removed")?;
    assert_eq!(record.last_run, Some(600_000));
    assert_eq!(record.error_count, 0);
    Ok(())
}

#[tokio::test]
async fn failures_are_counted_not_rethrown() -> TestResult {
    init_tracing();
    let f = fixture(vec![failing_task("flaky")]);
    let recurrent = stored(&f, PlannedTaskBuilder::new("flaky").every_minutes(1).build()).await?;
    let one_shot = stored(&f, PlannedTaskBuilder::new("flaky").after_minutes(1).build()).await?;

    let outcome = f.runner.run(&recurrent, start()).await?;
    assert!(matches!(outcome, RunOutcome::Failed(ref reason) if reason.contains("boom")));
    f.runner.run(&one_shot, start()).await?;

    let recurrent = f.h.store.get(&recurrent.id).await?.ok_or("recurrent removed")?;
    assert_eq!(recurrent.error_count, 1);
    // Failed one-shots stay around while under the threshold.
    let one_shot = f.h.store.get(&one_shot.id).await?.ok_or("one-shot removed")?;
    assert_eq!(one_shot.error_count, 1);
    Ok(())
}

#[tokio::test]
async fn one_shot_is_abandoned_past_the_failure_threshold() -> TestResult {
    init_tracing();
    let f = fixture(vec![failing_task("flaky")]);
    let at_threshold = stored(
        &f,
        PlannedTaskBuilder::new("flaky").after_minutes(1).with_errors(2).build(),
    )
    .await?;

    f.runner.run(&at_threshold, start()).await?;
    let record = f.h.store.get(&at_threshold.id).await?.ok_or("removed too early")?;
    assert_eq!(record.error_count, 3);

    f.runner.run(&record, start()).await?;
    assert!(f.h.store.get(&at_threshold.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn timeout_cancels_the_task_and_is_counted() -> TestResult {
    init_tracing();
    let started = Arc::new(Notify::new());
    let f = fixture(vec![blocking_task("stuck", Arc::clone(&started))]);
    let planned = stored(&f, PlannedTaskBuilder::new("stuck").every_minutes(1).build()).await?;

    let event = start();
    let id = event.id().to_string();
    let run = {
        let runner = f.runner.clone();
        let planned = planned.clone();
        tokio::spawn(async move { runner.run(&planned, event).await })
    };

    with_timeout(started.notified()).await;
    emit_timeout(&f.bus, &id);

    let outcome = with_timeout(run).await??;
    assert_eq!(outcome, RunOutcome::TimedOut);

    let record = f.h.store.get(&planned.id).await?.ok_or("record removed")?;
    assert_eq!(record.timeout_count, 1);
    Ok(())
}

#[tokio::test]
async fn batch_forwards_the_window_timeout_to_every_task() -> TestResult {
    init_tracing();
    let first_started = Arc::new(Notify::new());
    let second_started = Arc::new(Notify::new());
    let f = fixture(vec![
        blocking_task("left", Arc::clone(&first_started)),
        blocking_task("right", Arc::clone(&second_started)),
    ]);
    let left = stored(&f, PlannedTaskBuilder::new("left").every_minutes(1).build()).await?;
    let right = stored(&f, PlannedTaskBuilder::new("right").every_minutes(2).build()).await?;
    let unknown = PlannedTaskBuilder::new("ghost").every_minutes(1).build();

    let window = start().expiring_at(Some(700_000));
    let window_id = window.id().to_string();
    let batch = BatchTaskRunner::new(f.runner.clone());
    let run = tokio::spawn(async move { batch.run(&[left, right, unknown], &window).await });

    with_timeout(first_started.notified()).await;
    with_timeout(second_started.notified()).await;
    emit_timeout(&f.bus, &window_id);

    let outcomes = with_timeout(run).await?;
    assert_eq!(
        outcomes,
        vec![Some(RunOutcome::TimedOut), Some(RunOutcome::TimedOut), None]
    );
    assert!(!f.bus.has_subscribers(DispatcherEvent::TaskExecutionTimedOut.as_str()));
    Ok(())
}

#[tokio::test]
async fn instant_runner_reuses_the_immediate_record() -> TestResult {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let f = fixture(vec![counting_task("now", Arc::clone(&runs))]);
    let store: Arc<dyn PlannedTaskStore> = Arc::new(f.h.store.clone());
    let instant = InstantTaskRunner::new(f.runner.clone(), store, f.h.clock());
    let task = RunnableTaskBuilder::new("now", TaskParams::new()).build();

    let first = instant.run(task.clone(), start()).await?;
    f.h.clock.advance(1_000);
    let second = instant.run(task, start()).await?;

    assert_eq!(first.id, second.id);
    assert_eq!(second.last_run, Some(601_000));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(f.h.store.len(), 1);
    Ok(())
}
