// src/support/mod.rs

//! Pure helpers the core leans on: a clock, an id generator and the
//! deep-copy used for task results.

pub mod clock;
pub mod serialization;

pub use clock::{Clock, ManualClock, SystemClock};
pub use serialization::{flatten, into_event_data};

/// Globally unique identifier for events and planned tasks.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Spawn fire-and-forget work on the current tokio runtime.
///
/// Event callbacks are synchronous; any async follow-up goes through here.
pub(crate) fn spawn_detached<F>(what: &'static str, fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => tracing::error!(work = what, "no tokio runtime available; work dropped"),
    }
}
