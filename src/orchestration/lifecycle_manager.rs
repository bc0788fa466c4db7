//! # Task Lifecycle Manager
//!
//! Owns every task state change: activation from the inbound API, batch
//! claims from the scheduler, and outcome reports from task processors. Each
//! operation is one atomic store call carrying a [`TaskEvent`]; the
//! transition rules themselves live in [`crate::state_machine`].
//!
//! ```rust
//! use std::sync::Arc;
//! use livescore_poller::config::TaskConfig;
//! use livescore_poller::database::InMemoryTaskStore;
//! use livescore_poller::{LifecycleManager, TaskStatus};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryTaskStore::new());
//! let lifecycle = LifecycleManager::new(store, &TaskConfig::default()).unwrap();
//!
//! let task = lifecycle.set_active("match-42", true).await.unwrap();
//! assert_eq!(task.status, TaskStatus::Active);
//!
//! let task = lifecycle.set_active("match-42", false).await.unwrap();
//! assert_eq!(task.status, TaskStatus::Inactive);
//! # });
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::TaskConfig;
use crate::constants::{truncate_error_message, MAX_ENTITY_ID_LENGTH};
use crate::database::TaskStore;
use crate::error::{PollerError, PollerResult};
use crate::logging::log_task_operation;
use crate::models::{Task, TaskId};
use crate::state_machine::TaskEvent;

pub struct LifecycleManager {
    store: Arc<dyn TaskStore>,
    execution_interval: chrono::Duration,
    max_error_message_length: usize,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("execution_interval", &self.execution_interval)
            .field("max_error_message_length", &self.max_error_message_length)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn TaskStore>, config: &TaskConfig) -> PollerResult<Self> {
        let execution_interval = chrono::Duration::from_std(config.execution_interval())
            .map_err(|e| {
                PollerError::ConfigurationError(format!("execution interval out of range: {e}"))
            })?;
        Ok(Self {
            store,
            execution_interval,
            max_error_message_length: config.max_error_message_length,
        })
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Delay between an attempt and the task's next due time
    pub fn execution_interval(&self) -> Duration {
        self.execution_interval.to_std().unwrap_or_default()
    }

    /// Put an entity into (or take it out of) the polling rotation, creating
    /// its task on first sight.
    pub async fn set_active(&self, entity_id: &str, live: bool) -> PollerResult<Task> {
        self.set_active_at(entity_id, live, Utc::now()).await
    }

    /// [`set_active`](Self::set_active) with an explicit clock reading.
    ///
    /// Idempotent: repeating a call leaves the task as the last call left
    /// it, with `next_due_at` taken from the last activation. Error fields
    /// are never touched.
    #[instrument(skip(self), fields(entity_id = %entity_id))]
    pub async fn set_active_at(
        &self,
        entity_id: &str,
        live: bool,
        now: DateTime<Utc>,
    ) -> PollerResult<Task> {
        if entity_id.trim().is_empty() {
            return Err(PollerError::ValidationError(
                "entity id must not be blank".to_string(),
            ));
        }
        if entity_id.chars().count() > MAX_ENTITY_ID_LENGTH {
            return Err(PollerError::ValidationError(format!(
                "entity id must be at most {MAX_ENTITY_ID_LENGTH} characters"
            )));
        }

        let event = if live {
            TaskEvent::Activate { at: now }
        } else {
            TaskEvent::Deactivate { at: now }
        };
        let task = self.store.upsert_by_entity_id(entity_id, &event).await?;

        log_task_operation(
            event.event_type(),
            Some(task.id),
            &task.entity_id,
            task.status.as_str(),
            None,
        );
        Ok(task)
    }

    /// Claim up to `limit` due tasks, oldest due first.
    ///
    /// Tasks beyond `limit` stay due for a later tick.
    #[instrument(skip(self))]
    pub async fn claim_due_batch(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PollerResult<Vec<TaskId>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let claimed = self.store.claim_due_batch(now, limit).await?;

        if claimed.len() == limit {
            match self.store.count_due(now).await {
                Ok(remaining) if remaining > 0 => warn!(
                    claimed = claimed.len(),
                    remaining,
                    "Found more due tasks than the batch size, claiming only {}",
                    limit
                ),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Could not count remaining due tasks"),
            }
        }

        if !claimed.is_empty() {
            debug!(claimed = claimed.len(), "Claimed due tasks");
        }

        Ok(claimed.into_iter().map(|task| task.id).collect())
    }

    /// Close out a successful attempt; the task is due again one interval
    /// after `attempt_time`.
    #[instrument(skip(self))]
    pub async fn report_success(
        &self,
        task_id: TaskId,
        attempt_time: DateTime<Utc>,
    ) -> PollerResult<Task> {
        let event = TaskEvent::Succeed {
            attempt_time,
            next_due_at: attempt_time + self.execution_interval,
            at: Utc::now(),
        };
        let task = self.store.update(task_id, &event).await?;
        debug!(
            execution_count = task.execution_count,
            next_due_at = ?task.next_due_at,
            "Attempt succeeded"
        );
        Ok(task)
    }

    /// Close out a failed attempt. The task keeps its normal cadence; the
    /// error detail is truncated before it is stored.
    #[instrument(skip(self, error_detail))]
    pub async fn report_failure(
        &self,
        task_id: TaskId,
        attempt_time: DateTime<Utc>,
        error_detail: &str,
    ) -> PollerResult<Task> {
        let error = truncate_error_message(error_detail, self.max_error_message_length);
        let event = TaskEvent::Fail {
            attempt_time,
            next_due_at: attempt_time + self.execution_interval,
            error,
            at: Utc::now(),
        };
        let task = self.store.update(task_id, &event).await?;
        info!(
            execution_count = task.execution_count,
            next_due_at = ?task.next_due_at,
            error = ?task.last_error,
            "Attempt failed"
        );
        Ok(task)
    }

    pub async fn resolve_entity_id(&self, task_id: TaskId) -> PollerResult<String> {
        self.store
            .find_by_id(task_id)
            .await?
            .map(|task| task.entity_id)
            .ok_or(PollerError::TaskNotFound { task_id })
    }

    /// [`resolve_entity_id`](Self::resolve_entity_id) for a claim that is
    /// about to be processed. Fails with `AttemptSuperseded` when the claim
    /// made at `attempt_time` no longer holds the task, e.g. it sat queued
    /// long enough to be reclaimed.
    pub async fn resolve_claimed_entity(
        &self,
        task_id: TaskId,
        attempt_time: DateTime<Utc>,
    ) -> PollerResult<String> {
        let task = self
            .store
            .find_by_id(task_id)
            .await?
            .ok_or(PollerError::TaskNotFound { task_id })?;
        if !task.holds_attempt(attempt_time) {
            return Err(PollerError::AttemptSuperseded { task_id });
        }
        Ok(task.entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTaskStore;
    use crate::state_machine::TaskStatus;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn manager() -> (Arc<InMemoryTaskStore>, LifecycleManager) {
        let store = Arc::new(InMemoryTaskStore::new());
        let manager = LifecycleManager::new(store.clone(), &TaskConfig::default()).unwrap();
        (store, manager)
    }

    #[tokio::test]
    async fn test_activation_creates_due_task() {
        let (_, manager) = manager();
        let task = manager.set_active_at("match-1", true, t0()).await.unwrap();

        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.next_due_at, Some(t0()));
        assert_eq!(task.execution_count, 0);
    }

    #[tokio::test]
    async fn test_repeated_activation_is_idempotent() {
        let (store, manager) = manager();
        let later = t0() + chrono::Duration::seconds(3);

        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let task = manager.set_active_at("match-1", true, later).await.unwrap();

        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.next_due_at, Some(later));
    }

    #[tokio::test]
    async fn test_deactivation_clears_due_time_and_keeps_errors() {
        let (_, manager) = manager();
        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let ids = manager.claim_due_batch(t0(), 10).await.unwrap();
        manager
            .report_failure(ids[0], t0(), "upstream down")
            .await
            .unwrap();

        let task = manager.set_active_at("match-1", false, t0()).await.unwrap();
        assert_eq!(task.status, TaskStatus::Inactive);
        assert_eq!(task.next_due_at, None);
        assert_eq!(task.last_error.as_deref(), Some("upstream down"));
    }

    #[tokio::test]
    async fn test_blank_entity_id_is_rejected() {
        let (_, manager) = manager();
        let err = manager.set_active_at("  ", true, t0()).await.unwrap_err();
        assert!(matches!(err, PollerError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_claim_respects_limit_and_due_order() {
        let (_, manager) = manager();
        for (offset, entity) in [(2, "c"), (0, "a"), (1, "b")] {
            manager
                .set_active_at(entity, true, t0() + chrono::Duration::seconds(offset))
                .await
                .unwrap();
        }

        let now = t0() + chrono::Duration::seconds(10);
        let first = manager.claim_due_batch(now, 2).await.unwrap();
        let mut entities = Vec::new();
        for id in &first {
            entities.push(manager.resolve_entity_id(*id).await.unwrap());
        }
        assert_eq!(entities, vec!["a", "b"]);

        let rest = manager.claim_due_batch(now, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(manager.resolve_entity_id(rest[0]).await.unwrap(), "c");
    }

    #[tokio::test]
    async fn test_claim_with_zero_limit_claims_nothing() {
        let (_, manager) = manager();
        manager.set_active_at("a", true, t0()).await.unwrap();
        assert!(manager.claim_due_batch(t0(), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_entity_id_is_rejected() {
        let (store, manager) = manager();
        let err = manager
            .set_active_at(&"m".repeat(256), true, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, PollerError::ValidationError(_)));
        assert!(store.snapshot().is_empty());

        let longest = "é".repeat(255);
        let task = manager.set_active_at(&longest, true, t0()).await.unwrap();
        assert_eq!(task.entity_id, longest);
    }

    #[tokio::test]
    async fn test_claimed_entity_resolution_tracks_the_attempt() {
        let (_, manager) = manager();
        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let ids = manager.claim_due_batch(t0(), 1).await.unwrap();

        assert_eq!(
            manager.resolve_claimed_entity(ids[0], t0()).await.unwrap(),
            "match-1"
        );

        let reclaimed_at = t0() + chrono::Duration::seconds(31);
        manager.set_active_at("match-1", true, reclaimed_at).await.unwrap();
        let err = manager
            .resolve_claimed_entity(ids[0], t0())
            .await
            .unwrap_err();
        assert_eq!(err, PollerError::AttemptSuperseded { task_id: ids[0] });
    }

    #[tokio::test]
    async fn test_late_report_after_reclaim_is_rejected() {
        let (store, manager) = manager();
        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let first = manager.claim_due_batch(t0(), 1).await.unwrap();

        let reclaimed_at = t0() + chrono::Duration::seconds(31);
        store
            .reclaim_stale(reclaimed_at - chrono::Duration::seconds(30), reclaimed_at)
            .await
            .unwrap();
        let second = manager.claim_due_batch(reclaimed_at, 1).await.unwrap();
        assert_eq!(second, first);

        let err = manager.report_success(first[0], t0()).await.unwrap_err();
        assert_eq!(err, PollerError::AttemptSuperseded { task_id: first[0] });

        // the second claim still owns the task
        let later = reclaimed_at + chrono::Duration::seconds(1);
        assert!(manager.claim_due_batch(later, 1).await.unwrap().is_empty());
        let task = manager
            .report_success(second[0], reclaimed_at)
            .await
            .unwrap();
        assert_eq!(task.execution_count, 1);
        assert_eq!(
            task.next_due_at,
            Some(reclaimed_at + chrono::Duration::seconds(10))
        );
    }

    #[tokio::test]
    async fn test_success_round_trip() {
        let (store, manager) = manager();
        let mut task = Task::new(TaskId(7), "match-7", t0());
        task.status = TaskStatus::InFlight;
        task.next_due_at = Some(t0());
        task.last_attempt_at = Some(t0());
        task.execution_count = 5;
        task.last_error = Some("old".into());
        task.last_error_at = Some(t0());
        store.seed(task);

        let task = manager.report_success(TaskId(7), t0()).await.unwrap();
        assert_eq!(task.execution_count, 6);
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.next_due_at, Some(t0() + chrono::Duration::seconds(10)));
        assert_eq!(task.last_error, None);
        assert_eq!(task.last_error_at, None);
    }

    #[tokio::test]
    async fn test_failure_truncates_and_reschedules() {
        let (_, manager) = manager();
        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let ids = manager.claim_due_batch(t0(), 1).await.unwrap();

        let detail = "x".repeat(1500);
        let task = manager.report_failure(ids[0], t0(), &detail).await.unwrap();

        let stored = task.last_error.unwrap();
        assert_eq!(stored.chars().count(), 1000);
        assert!(detail.starts_with(&stored));
        assert_eq!(task.last_error_at, Some(t0()));
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.execution_count, 1);
        assert_eq!(task.next_due_at, Some(t0() + chrono::Duration::seconds(10)));
    }

    #[tokio::test]
    async fn test_unknown_task_reports_not_found() {
        let (_, manager) = manager();
        let err = manager.report_success(TaskId(404), t0()).await.unwrap_err();
        assert_eq!(err, PollerError::TaskNotFound { task_id: TaskId(404) });

        let err = manager.resolve_entity_id(TaskId(404)).await.unwrap_err();
        assert_eq!(err, PollerError::TaskNotFound { task_id: TaskId(404) });
    }

    #[tokio::test]
    async fn test_outcome_after_deactivation_stays_inactive() {
        let (_, manager) = manager();
        manager.set_active_at("match-1", true, t0()).await.unwrap();
        let ids = manager.claim_due_batch(t0(), 1).await.unwrap();
        manager.set_active_at("match-1", false, t0()).await.unwrap();

        let task = manager.report_success(ids[0], t0()).await.unwrap();
        assert_eq!(task.status, TaskStatus::Inactive);
        assert_eq!(task.next_due_at, None);
        assert_eq!(task.execution_count, 1);
    }
}
