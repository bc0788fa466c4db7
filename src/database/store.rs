//! # TaskStore Contract
//!
//! Every mutating operation is one atomic unit against the rows it touches:
//! the row is loaded under the backend's exclusion primitive, the
//! [`TaskEvent`] is applied through [`apply_event`], and the result is
//! persisted before any other claimer can observe the row.
//!
//! [`apply_event`]: crate::state_machine::apply_event

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PollerResult;
use crate::models::{Task, TaskId};
use crate::state_machine::TaskEvent;

#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug {
    async fn find_by_id(&self, id: TaskId) -> PollerResult<Option<Task>>;

    async fn find_by_entity_id(&self, entity_id: &str) -> PollerResult<Option<Task>>;

    /// Load the task for `entity_id` (creating an inactive one if none exists),
    /// apply `event`, and persist, as one atomic unit.
    async fn upsert_by_entity_id(&self, entity_id: &str, event: &TaskEvent) -> PollerResult<Task>;

    /// Load task `id`, apply `event`, and persist, as one atomic unit.
    ///
    /// Fails with `TaskNotFound` if the row does not exist. A rejected
    /// transition leaves the row untouched.
    async fn update(&self, id: TaskId, event: &TaskEvent) -> PollerResult<Task>;

    /// Select up to `limit` due tasks, oldest `next_due_at` first, and claim each
    /// one in the same atomic unit. Rows held by a concurrent claimer are
    /// skipped, never returned twice.
    async fn claim_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>>;

    /// Return every task in flight since before `threshold` to the rotation,
    /// due at `now`.
    async fn reclaim_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> PollerResult<Vec<Task>>;

    /// Read-only view of the next due batch, in claim order.
    async fn find_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>>;

    /// Read-only view of in-flight tasks started before `threshold`.
    async fn find_stale_in_flight(&self, threshold: DateTime<Utc>) -> PollerResult<Vec<Task>>;

    /// Number of tasks currently due.
    async fn count_due(&self, now: DateTime<Utc>) -> PollerResult<u64>;
}
