// src/store/mod.rs

//! Persisted planned-task collaborator.
//!
//! The store is the only cross-invocation mutable state and the single
//! source of truth for deduplication and due-date decisions.
//! [`memory::InMemoryPlannedTaskStore`] is the reference implementation.

pub mod memory;

use std::fmt;

use crate::errors::Result;
use crate::tasks::{PlannedTask, RunnableTask};
use crate::types::{BoxFuture, PlanningType, Timestamp};

pub use memory::InMemoryPlannedTaskStore;

pub trait PlannedTaskStore: Send + Sync + fmt::Debug {
    /// Fails with `DuplicatePlannedTask` if an equivalent task is stored.
    fn insert(&self, task: PlannedTask) -> BoxFuture<'_, Result<()>>;

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<()>>;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<PlannedTask>>>;

    /// Stored task equivalent to `task`, if any.
    fn get_equivalent(&self, task: &RunnableTask) -> BoxFuture<'_, Result<Option<PlannedTask>>>;

    /// Ascending by `next_run(now)`, optionally restricted to one planning type.
    fn get_all_sorted_by_next_run(
        &self,
        planning_type: Option<PlanningType>,
    ) -> BoxFuture<'_, Result<Vec<PlannedTask>>>;

    /// Distinct cancel-event names referenced by stored tasks.
    fn get_all_cancel_events(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    fn get_all_filtered_by_cancel_event(
        &self,
        cancel_event: &str,
    ) -> BoxFuture<'_, Result<Vec<PlannedTask>>>;

    fn increase_error_count(&self, id: &str) -> BoxFuture<'_, Result<()>>;

    fn increase_timeout_count(&self, id: &str) -> BoxFuture<'_, Result<()>>;

    fn update_last_run(&self, id: &str, timestamp: Timestamp) -> BoxFuture<'_, Result<()>>;

    fn delete_all(&self) -> BoxFuture<'_, Result<()>>;
}
