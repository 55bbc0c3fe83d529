// src/runners/mod.rs

//! Execution of planned tasks against a start event.
//!
//! - [`single`]: one planned task, racing completion against a timeout.
//! - [`batch`]: many planned tasks sharing one execution window.
//! - [`instant`]: immediate-path runs triggered by an event.

pub mod batch;
pub mod instant;
pub mod single;

pub use batch::BatchTaskRunner;
pub use instant::InstantTaskRunner;
pub use single::{RunOutcome, SingleTaskRunner};
