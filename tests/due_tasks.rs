// tests/due_tasks.rs

mod common;
use crate::common::builders::{MINUTE_MS, PlannedTaskBuilder};
use crate::common::fakes::Harness;
use crate::common::init_tracing;

use std::error::Error;

use taskdag::engine::DueTaskManager;
use taskdag::store::PlannedTaskStore;
use taskdag::types::PlanningType;

type TestResult = Result<(), Box<dyn Error>>;

const OFFSET: i64 = 30_000;

/// `(last runs in minutes, current minute, expected next interval in minutes)`.
/// `None` means the task never ran. Every task is recurrent and was
/// created at t=0.
type Fixture = (&'static [Option<i64>], i64, i64);

fn next_interval(periods: &[u64], last_runs: &[Option<i64>], minute: i64) -> Option<i64> {
    let tasks = periods
        .iter()
        .zip(last_runs)
        .enumerate()
        .map(|(i, (period, last))| {
            PlannedTaskBuilder::new(&format!("task{i}"))
                .every_minutes(*period)
                .last_run_minute(*last)
                .build()
        })
        .collect();
    DueTaskManager::new(tasks, OFFSET, minute * MINUTE_MS).next_interval()
}

fn check(periods: &[u64], fixtures: &[Fixture]) {
    for (last_runs, minute, expected) in fixtures {
        assert_eq!(
            next_interval(periods, last_runs, *minute),
            Some(expected * MINUTE_MS),
            "periods {periods:?}, last runs {last_runs:?}, minute {minute}"
        );
    }
}

#[test]
fn two_three_five_minute_tasks() {
    check(
        &[2, 3, 5],
        &[
            (&[None, None, None], 2, 1),
            (&[Some(2), None, None], 3, 1),
            (&[Some(2), Some(3), None], 4, 1),
            (&[Some(4), Some(3), None], 5, 1),
            (&[Some(4), Some(3), Some(5)], 6, 2),
            (&[Some(6), Some(6), Some(5)], 8, 1),
        ],
    );
}

#[test]
fn three_five_minute_tasks() {
    check(
        &[3, 5],
        &[
            (&[None, None], 3, 2),
            (&[Some(3), None], 5, 1),
            (&[Some(3), Some(5)], 6, 3),
            (&[Some(6), Some(5)], 9, 1),
            (&[Some(9), Some(5)], 10, 2),
            (&[Some(9), Some(10)], 12, 3),
            (&[Some(12), Some(10)], 15, 3),
        ],
    );
}

#[test]
fn one_two_minute_tasks() {
    check(
        &[1, 2],
        &[
            (&[None, None], 1, 1),
            (&[Some(1), None], 2, 1),
            (&[Some(2), Some(2)], 3, 1),
        ],
    );
}

#[test]
fn nothing_to_arm_without_tasks() {
    let manager = DueTaskManager::new(Vec::new(), OFFSET, 0);
    assert_eq!(manager.next_interval(), None);
    assert!(!manager.will_continue());
    assert!(manager.tasks_to_run().is_empty());
}

#[test]
fn due_one_shot_does_not_keep_the_alarm_alive() {
    let one_shot = PlannedTaskBuilder::new("once").after_minutes(1).build();
    let manager = DueTaskManager::new(vec![one_shot], OFFSET, MINUTE_MS);

    assert_eq!(manager.tasks_to_run().len(), 1);
    assert_eq!(manager.next_interval(), None);
}

#[test]
fn early_wake_ups_within_the_offset_count_as_due() {
    let task = PlannedTaskBuilder::new("tick").every_minutes(2).build();

    let early = DueTaskManager::new(vec![task.clone()], OFFSET, 2 * MINUTE_MS - 20_000);
    assert!(early.should_run(&task));

    let too_early = DueTaskManager::new(vec![task.clone()], OFFSET, 2 * MINUTE_MS - 40_000);
    assert!(!too_early.should_run(&task));
}

#[test]
fn start_time_gates_the_first_run() {
    let delayed = PlannedTaskBuilder::new("delayed")
        .every_minutes(10)
        .starting_at_minute(5)
        .build();

    let before = DueTaskManager::new(vec![delayed.clone()], OFFSET, 4 * MINUTE_MS);
    assert!(!before.should_run(&delayed));
    assert_eq!(before.next_interval(), Some(MINUTE_MS));

    // Runs at its start time even though the interval has not elapsed.
    let at_start = DueTaskManager::new(vec![delayed.clone()], OFFSET, 5 * MINUTE_MS);
    assert!(at_start.should_run(&delayed));

    let mut ran = delayed.clone();
    ran.last_run = Some(5 * MINUTE_MS);
    let after = DueTaskManager::new(vec![ran.clone()], OFFSET, 6 * MINUTE_MS);
    assert!(!after.should_run(&ran));
}

#[tokio::test]
async fn load_only_reads_the_requested_planning_type() -> TestResult {
    init_tracing();
    let h = Harness::new(2 * MINUTE_MS);
    h.store
        .insert(PlannedTaskBuilder::new("scheduled").every_minutes(2).build())
        .await?;
    h.store
        .insert(PlannedTaskBuilder::new("immediate").immediate().build())
        .await?;

    let manager =
        DueTaskManager::load(PlanningType::Scheduled, &h.store, OFFSET, 2 * MINUTE_MS).await?;
    let due: Vec<String> = manager
        .tasks_to_run()
        .iter()
        .map(|t| t.name().to_string())
        .collect();

    assert_eq!(due, vec!["scheduled".to_string()]);
    assert_eq!(manager.current_time(), 2 * MINUTE_MS);
    Ok(())
}
