// src/engine/mod.rs

//! Wake-up driven execution of scheduled work.
//!
//! The pure arbiter deciding what is due and when to wake next lives in
//! [`due`]; the async shell reacting to alarms is [`runtime`], and
//! [`timer`] provides a tokio-backed alarm feeding it.

pub mod due;
pub mod runtime;
pub mod timer;

pub use due::DueTaskManager;
pub use runtime::{WakeReport, WakeRuntime};
pub use timer::TokioWakeAlarm;

/// Events flowing into the wake runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// The wake alarm fired; re-evaluate due tasks.
    AlarmFired,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
