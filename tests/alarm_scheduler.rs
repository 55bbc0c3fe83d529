// tests/alarm_scheduler.rs

mod common;
use crate::common::builders::{MINUTE_MS, PlannedTaskBuilder};
use crate::common::fakes::{AlarmCall, Harness};
use crate::common::init_tracing;

use std::error::Error;

use taskdag::scheduler::{TimeBasedScheduler, WakeAlarm};
use taskdag::store::PlannedTaskStore;
use taskdag::tasks::{RunnableTask, RunnableTaskBuilder};
use taskdag::types::{TaskParams, TimeUnit};

type TestResult = Result<(), Box<dyn Error>>;

fn every(name: &str, minutes: u64) -> RunnableTask {
    RunnableTaskBuilder::new(name, TaskParams::new())
        .every(minutes, TimeUnit::Minutes)
        .build()
}

#[tokio::test]
async fn alarm_follows_the_earliest_task() -> TestResult {
    init_tracing();
    let h = Harness::new(0);

    let five = h.scheduler.schedule(every("five", 5)).await?;
    let ten = h.scheduler.schedule(every("ten", 10)).await?;
    let two = h.scheduler.schedule(every("two", 2)).await?;

    assert_eq!(
        h.alarm.calls(),
        vec![AlarmCall::Set(5 * MINUTE_MS), AlarmCall::Set(2 * MINUTE_MS)]
    );
    assert_eq!(h.store.len(), 3);

    // Not the head: alarm untouched.
    h.scheduler.cancel(&ten.id).await?;
    assert_eq!(h.alarm.calls().len(), 2);

    // Head: re-armed for the next one.
    h.scheduler.cancel(&two.id).await?;
    assert_eq!(h.alarm.last_set(), Some(5 * MINUTE_MS));

    // Last one: disarmed.
    h.scheduler.cancel(&five.id).await?;
    assert_eq!(h.alarm.calls().last(), Some(&AlarmCall::Cancel));
    assert!(!h.alarm.is_up());
    assert!(h.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn equivalent_task_is_not_scheduled_twice() -> TestResult {
    init_tracing();
    let h = Harness::new(0);

    let first = h.scheduler.schedule(every("sync", 5)).await?;
    let again = RunnableTaskBuilder::new("sync", TaskParams::new())
        .every(5, TimeUnit::Minutes)
        .cancel_on("somethingElse")
        .build();
    let second = h.scheduler.schedule(again).await?;

    assert_eq!(first.id, second.id);
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.alarm.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn alarm_is_never_armed_below_the_minimum() -> TestResult {
    init_tracing();
    let h = Harness::new(0);
    let soon = RunnableTaskBuilder::new("soon", TaskParams::new())
        .after(10, TimeUnit::Seconds)
        .build();

    h.scheduler.schedule(soon).await?;
    assert_eq!(h.alarm.last_set(), Some(MINUTE_MS));
    Ok(())
}

#[tokio::test]
async fn cancelling_an_unknown_id_is_a_no_op() -> TestResult {
    init_tracing();
    let h = Harness::new(0);
    h.scheduler.cancel("nope").await?;
    assert!(h.alarm.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn setup_rearms_after_a_restart() -> TestResult {
    init_tracing();
    let h = Harness::new(0);
    h.store
        .insert(
            PlannedTaskBuilder::new("persisted")
                .every_minutes(3)
                .build(),
        )
        .await?;

    h.scheduler.setup().await?;
    assert_eq!(h.alarm.calls(), vec![AlarmCall::Set(3 * MINUTE_MS)]);

    // Already armed: nothing to do.
    h.scheduler.setup().await?;
    assert_eq!(h.alarm.calls().len(), 1);
    Ok(())
}
