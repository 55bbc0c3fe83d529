// tests/planner.rs

mod common;
use crate::common::fakes::{AlarmCall, Harness, counting_task};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use taskdag::events::{DispatcherEvent, Event, EventBus};
use taskdag::planner::{TaskCancelManager, TaskPlanner};
use taskdag::runners::{InstantTaskRunner, SingleTaskRunner};
use taskdag::store::PlannedTaskStore;
use taskdag::tasks::{RunnableTaskBuilder, TaskDefinition, TaskRegistry};
use taskdag::types::{PlanningType, SchedulerType, TaskParams, TimeUnit};
use taskdag::{DispatchError, TaskResultStatus};

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    h: Harness,
    bus: EventBus,
    planner: TaskPlanner,
}

fn fixture(defs: Vec<TaskDefinition>) -> Fixture {
    let h = Harness::new(0);
    let bus = EventBus::new();
    let registry = TaskRegistry::new(defs, &bus, h.clock()).expect("valid registry");
    let store: Arc<dyn PlannedTaskStore> = Arc::new(h.store.clone());
    let runner = SingleTaskRunner::new(registry.clone(), Arc::clone(&store), bus.clone(), h.clock(), 3);
    let planner = TaskPlanner::new(
        registry,
        Arc::clone(&store),
        h.scheduler.clone(),
        InstantTaskRunner::new(runner, Arc::clone(&store), h.clock()),
        TaskCancelManager::new(store, h.scheduler.clone(), bus.clone()),
        bus.clone(),
    );
    Fixture { h, bus, planner }
}

fn builder(name: &str) -> RunnableTaskBuilder {
    RunnableTaskBuilder::new(name, TaskParams::new())
}

#[tokio::test]
async fn scheduled_planning_is_idempotent() -> TestResult {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let f = fixture(vec![counting_task("sync", Arc::clone(&runs))]);
    let task = builder("sync").every(5, TimeUnit::Minutes).cancel_on("stop").build();

    let first = f.planner.plan(task.clone(), None).await?;
    let second = f.planner.plan(task, None).await?;

    assert_eq!(first.id, second.id);
    assert_eq!(first.planning_type, PlanningType::Scheduled);
    assert_eq!(first.scheduler_type, SchedulerType::TimerBacked);
    assert_eq!(f.h.store.len(), 1);
    assert_eq!(f.h.alarm.calls(), vec![AlarmCall::Set(300_000)]);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(f.planner.cancel_manager().is_watching("stop"));
    Ok(())
}

#[tokio::test]
async fn scheduling_finishes_the_triggering_chain() -> TestResult {
    init_tracing();
    let f = fixture(vec![counting_task("sync", Arc::new(AtomicUsize::new(0)))]);
    let trigger = Event::new("startEvent");
    let finished = f.bus.wait_for_chain(trigger.id());

    f.planner
        .plan(builder("sync").every(1, TimeUnit::Minutes).build(), Some(trigger))
        .await?;

    let result = with_timeout(finished)
        .await
        .and_then(|e| e.chain_result())
        .ok_or("chain not finished")?;
    assert_eq!(result.status, TaskResultStatus::Ok);
    Ok(())
}

#[tokio::test]
async fn immediate_planning_runs_right_away() -> TestResult {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let f = fixture(vec![counting_task("now", Arc::clone(&runs))]);
    let task = builder("now").now().build();

    let first = f.planner.plan(task.clone(), None).await?;
    let second = f.planner.plan(task, None).await?;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(first.id, second.id);
    assert_eq!(first.planning_type, PlanningType::Immediate);
    assert_eq!(second.last_run, Some(0));
    assert_eq!(f.h.store.len(), 1);
    assert!(f.h.alarm.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn immediate_planning_keeps_the_trigger_chain() -> TestResult {
    init_tracing();
    let f = fixture(vec![counting_task("now", Arc::new(AtomicUsize::new(0)))]);
    let trigger = Event::new("startEvent");
    let finished = f.bus.wait_for_chain(trigger.id());

    f.planner.plan(builder("now").build(), Some(trigger)).await?;

    let event = with_timeout(finished).await.ok_or("chain not finished")?;
    assert!(event.is(DispatcherEvent::TaskChainFinished));
    assert_eq!(event.chain_result().map(|r| r.status), Some(TaskResultStatus::Ok));
    Ok(())
}

#[tokio::test]
async fn unknown_task_fails_the_chain() -> TestResult {
    init_tracing();
    let f = fixture(vec![]);
    let trigger = Event::new("startEvent");
    let finished = f.bus.wait_for_chain(trigger.id());

    let err = f
        .planner
        .plan(builder("ghost").build(), Some(trigger))
        .await
        .expect_err("unknown task");
    assert!(matches!(err, DispatchError::TaskNotFound(_)));

    let result = with_timeout(finished)
        .await
        .and_then(|e| e.chain_result())
        .ok_or("chain not finished")?;
    assert_eq!(result.status, TaskResultStatus::Error);
    Ok(())
}

#[tokio::test]
async fn delayed_one_shot_goes_to_the_scheduler() -> TestResult {
    init_tracing();
    let f = fixture(vec![counting_task("later", Arc::new(AtomicUsize::new(0)))]);

    let planned = f
        .planner
        .plan(builder("later").after(30, TimeUnit::Seconds).build(), None)
        .await?;

    assert!(planned.task.is_one_shot());
    assert_eq!(planned.planning_type, PlanningType::Scheduled);
    // The alarm is never armed closer than a minute.
    assert_eq!(f.h.alarm.last_set(), Some(60_000));
    Ok(())
}

#[tokio::test]
async fn cancel_event_removes_planned_work() -> TestResult {
    init_tracing();
    let f = fixture(vec![
        counting_task("a", Arc::new(AtomicUsize::new(0))),
        counting_task("b", Arc::new(AtomicUsize::new(0))),
    ]);

    f.planner
        .plan(builder("a").every(2, TimeUnit::Minutes).cancel_on("stop").build(), None)
        .await?;
    f.planner
        .plan(builder("b").every(3, TimeUnit::Minutes).cancel_on("other").build(), None)
        .await?;
    assert_eq!(f.h.store.len(), 2);

    let stop = Event::new("stop");
    let finished = f.bus.wait_for_chain(stop.id());
    f.bus.publish(&stop);

    let result = with_timeout(finished)
        .await
        .and_then(|e| e.chain_result())
        .ok_or("cancel chain not finished")?;
    assert_eq!(result.status, TaskResultStatus::Ok);

    let left: Vec<String> = f.h.store.all().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(left, vec!["b".to_string()]);
    assert!(!f.planner.cancel_manager().is_watching("stop"));
    assert!(f.planner.cancel_manager().is_watching("other"));
    Ok(())
}

#[tokio::test]
async fn cancel_manager_init_watches_stored_cancel_events() -> TestResult {
    init_tracing();
    let h = Harness::new(0);
    let bus = EventBus::new();
    let store: Arc<dyn PlannedTaskStore> = Arc::new(h.store.clone());
    store
        .insert(
            crate::common::builders::PlannedTaskBuilder::new("a")
                .every_minutes(1)
                .cancel_on("halt")
                .immediate()
                .build(),
        )
        .await?;

    let manager = TaskCancelManager::new(Arc::clone(&store), h.scheduler.clone(), bus.clone());
    manager.init().await?;
    assert!(manager.is_watching("halt"));

    manager.cancel_by_event_name("halt").await?;
    assert!(h.store.is_empty());
    Ok(())
}
