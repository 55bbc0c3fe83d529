// tests/event_bus.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};

use taskdag::events::{DispatcherEvent, Event, EventBus, TaskChainResult, finalize_chain};
use taskdag::TaskResultStatus;

type TestResult = Result<(), Box<dyn Error>>;

fn recorder(bus: &EventBus, name: &str) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(name, move |event: &Event| {
        sink.lock().unwrap().push(event.id().to_string());
    });
    seen
}

#[tokio::test]
async fn publish_reaches_every_listener_in_registration_order() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        bus.subscribe("ping", move |_event: &Event| {
            order.lock().unwrap().push(label);
        });
    }

    bus.publish(&Event::new("ping"));
    bus.publish(&Event::new("pong"));

    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    Ok(())
}

#[tokio::test]
async fn unsubscribe_single_listener_and_whole_event() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let seen = recorder(&bus, "ping");
    let extra = bus.subscribe("ping", |_event: &Event| {});

    bus.unsubscribe("ping", Some(extra));
    assert!(bus.has_subscribers("ping"));

    bus.publish(&Event::with_id("ping", "a"));
    bus.unsubscribe("ping", None);
    assert!(!bus.has_subscribers("ping"));
    bus.publish(&Event::with_id("ping", "b"));

    assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
    Ok(())
}

#[tokio::test]
async fn subscribe_once_fires_only_for_first_match() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&hits);

    bus.subscribe_once(
        "ping",
        |event| event.id() == "wanted",
        move |event| sink.lock().unwrap().push(event.id().to_string()),
    );

    bus.publish(&Event::with_id("ping", "other"));
    assert!(bus.has_subscribers("ping"));

    bus.publish(&Event::with_id("ping", "wanted"));
    bus.publish(&Event::with_id("ping", "wanted"));

    assert_eq!(*hits.lock().unwrap(), vec!["wanted".to_string()]);
    assert!(!bus.has_subscribers("ping"));
    Ok(())
}

#[tokio::test]
async fn listeners_added_during_publish_only_see_later_events() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let late_hits = Arc::new(Mutex::new(0usize));

    let inner_bus = bus.clone();
    let counter = Arc::clone(&late_hits);
    bus.subscribe_once(
        "ping",
        |_| true,
        move |_| {
            inner_bus.subscribe("ping", move |_event: &Event| {
                *counter.lock().unwrap() += 1;
            });
        },
    );

    bus.publish(&Event::new("ping"));
    assert_eq!(*late_hits.lock().unwrap(), 0);

    bus.publish(&Event::new("ping"));
    assert_eq!(*late_hits.lock().unwrap(), 1);
    Ok(())
}

#[tokio::test]
async fn wait_for_chain_resolves_with_the_matching_result() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let waiter = bus.wait_for_chain("chain-1");

    finalize_chain(&bus, "chain-2", TaskChainResult::ok());
    finalize_chain(&bus, "chain-1", TaskChainResult::error("broken"));

    let event = with_timeout(waiter).await.ok_or("waiter dropped")?;
    assert!(event.is(DispatcherEvent::TaskChainFinished));
    assert_eq!(event.id(), "chain-1");

    let result = event.chain_result().ok_or("missing chain result")?;
    assert_eq!(result.status, TaskResultStatus::Error);
    assert_eq!(result.reason.as_deref(), Some("broken"));
    Ok(())
}

#[tokio::test]
async fn dropping_a_waiter_removes_its_listener() -> TestResult {
    init_tracing();
    let bus = EventBus::new();

    let waiter = bus.wait_for(DispatcherEvent::TaskExecutionTimedOut.as_str(), "x");
    assert!(bus.has_subscribers(DispatcherEvent::TaskExecutionTimedOut.as_str()));

    drop(waiter);
    assert!(!bus.has_subscribers(DispatcherEvent::TaskExecutionTimedOut.as_str()));
    Ok(())
}

#[tokio::test]
async fn waiter_resolves_to_none_when_swept() -> TestResult {
    init_tracing();
    let bus = EventBus::new();
    let waiter = bus.wait_for("ping", "x");

    bus.unsubscribe("ping", None);

    assert!(with_timeout(waiter).await.is_none());
    Ok(())
}
