// tests/parallelizer.rs

mod common;
use crate::common::fakes::{Harness, counting_task};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use taskdag::dag::TaskGraphBrowser;
use taskdag::events::{DispatcherEvent, Event, EventBus, TaskChainResult, emit_timeout, finalize_chain};
use taskdag::planner::TaskPlannerParallelizer;
use taskdag::tasks::{RunnableTaskBuilder, TaskRegistry};
use taskdag::types::TaskParams;
use taskdag::TaskResultStatus;

type TestResult = Result<(), Box<dyn Error>>;

fn parallelizer(bus: &EventBus) -> TaskPlannerParallelizer {
    let h = Harness::new(0);
    let defs = ["a", "b", "solo"]
        .into_iter()
        .map(|name| counting_task(name, Arc::new(AtomicUsize::new(0))))
        .collect();
    let registry = TaskRegistry::new(defs, bus, h.clock()).expect("valid registry");

    let mut browser = TaskGraphBrowser::new(registry);
    for (event, task) in [("fanOut", "a"), ("fanOut", "b"), ("single", "solo")] {
        browser.add_entry(event, RunnableTaskBuilder::new(task, TaskParams::new()).build());
    }
    TaskPlannerParallelizer::new(Arc::new(browser), bus.clone())
}

#[tokio::test]
async fn single_binding_keeps_the_parent_event() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let parallelizer = parallelizer(&bus);

    let parent = Event::new("single");
    let child = parallelizer.spawn_child_event(&parent);

    assert_eq!(child.id(), parent.id());
    assert_eq!(parallelizer.pending_joins(), 0);
    Ok(())
}

#[tokio::test]
async fn parent_chain_finishes_once_every_child_has() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let parallelizer = parallelizer(&bus);

    let parent = Event::new("fanOut").expiring_at(Some(5_000));
    let first = parallelizer.spawn_child_event(&parent);
    let second = parallelizer.spawn_child_event(&parent);

    assert_ne!(first.id(), second.id());
    assert_ne!(first.id(), parent.id());
    assert_eq!(first.name(), "fanOut");
    assert_eq!(first.expiration_timestamp(), Some(5_000));
    assert_eq!(parallelizer.pending_joins(), 1);

    let parent_done = bus.wait_for_chain(parent.id());

    finalize_chain(&bus, first.id(), TaskChainResult::ok());
    assert_eq!(parallelizer.pending_joins(), 1);
    finalize_chain(&bus, second.id(), TaskChainResult::error("child failed"));
    assert_eq!(parallelizer.pending_joins(), 0);

    let result = with_timeout(parent_done)
        .await
        .and_then(|e| e.chain_result())
        .ok_or("parent chain not finished")?;
    assert_eq!(result.status, TaskResultStatus::Ok);
    assert!(!bus.has_subscribers(DispatcherEvent::TaskExecutionTimedOut.as_str()));
    Ok(())
}

#[tokio::test]
async fn parent_timeout_reaches_children_and_cancels_the_join() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let parallelizer = parallelizer(&bus);

    let parent = Event::new("fanOut");
    let first = parallelizer.spawn_child_event(&parent);
    let second = parallelizer.spawn_child_event(&parent);

    let timeout_name = DispatcherEvent::TaskExecutionTimedOut.as_str();
    let first_timeout = bus.wait_for(timeout_name, first.id());
    let second_timeout = bus.wait_for(timeout_name, second.id());
    let parent_done = bus.wait_for_chain(parent.id());

    emit_timeout(&bus, parent.id());
    assert!(with_timeout(first_timeout).await.is_some());
    assert!(with_timeout(second_timeout).await.is_some());

    finalize_chain(&bus, first.id(), TaskChainResult::cancelled(None));
    finalize_chain(&bus, second.id(), TaskChainResult::cancelled(None));

    let result = with_timeout(parent_done)
        .await
        .and_then(|e| e.chain_result())
        .ok_or("parent chain not finished")?;
    assert_eq!(result.status, TaskResultStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn retired_binding_no_longer_counts_as_a_sibling() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let parallelizer = parallelizer(&bus);
    assert_eq!(parallelizer.live_siblings("fanOut"), 2);

    parallelizer.retire_binding("fanOut");
    assert_eq!(parallelizer.live_siblings("fanOut"), 1);

    let parent = Event::new("fanOut");
    let child = parallelizer.spawn_child_event(&parent);
    assert_eq!(child.id(), parent.id());
    assert_eq!(parallelizer.pending_joins(), 0);

    parallelizer.retire_binding("fanOut");
    parallelizer.retire_binding("fanOut");
    assert_eq!(parallelizer.live_siblings("fanOut"), 0);
    Ok(())
}
