//! # Stale Task Reclaimer
//!
//! Returns tasks stuck in flight past the configured timeout to the rotation,
//! due immediately. A processor that crashed, hung, or lost its outcome
//! report therefore never strands its task. Runs at the start of every tick.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::TaskConfig;
use crate::database::TaskStore;
use crate::error::{PollerError, PollerResult};

pub struct StaleTaskReclaimer {
    store: Arc<dyn TaskStore>,
    stale_after: chrono::Duration,
}

impl std::fmt::Debug for StaleTaskReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleTaskReclaimer")
            .field("stale_after", &self.stale_after)
            .finish_non_exhaustive()
    }
}

impl StaleTaskReclaimer {
    pub fn new(store: Arc<dyn TaskStore>, config: &TaskConfig) -> PollerResult<Self> {
        Self::with_timeout(store, config.in_flight_timeout())
    }

    pub fn with_timeout(store: Arc<dyn TaskStore>, stale_after: Duration) -> PollerResult<Self> {
        let stale_after = chrono::Duration::from_std(stale_after).map_err(|e| {
            PollerError::ConfigurationError(format!("in-flight timeout out of range: {e}"))
        })?;
        Ok(Self { store, stale_after })
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after.to_std().unwrap_or_default()
    }

    /// Reclaim every task in flight since before `now - stale_after`.
    ///
    /// Returns the number of tasks put back into the rotation.
    #[instrument(skip(self))]
    pub async fn reclaim_stuck(&self, now: DateTime<Utc>) -> PollerResult<usize> {
        let threshold = now - self.stale_after;
        let reclaimed = self.store.reclaim_stale(threshold, now).await?;

        if reclaimed.is_empty() {
            debug!("No stuck tasks");
        } else {
            let task_ids: Vec<i64> = reclaimed.iter().map(|task| task.id.0).collect();
            warn!(
                count = reclaimed.len(),
                ?task_ids,
                stale_after_seconds = self.stale_after.num_seconds(),
                "Reclaimed tasks stuck in flight"
            );
        }

        Ok(reclaimed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTaskStore;
    use crate::models::{Task, TaskId};
    use crate::state_machine::TaskStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn in_flight(id: i64, started: DateTime<Utc>) -> Task {
        let mut task = Task::new(TaskId(id), format!("entity-{id}"), started);
        task.status = TaskStatus::InFlight;
        task.next_due_at = Some(started);
        task.last_attempt_at = Some(started);
        task
    }

    #[tokio::test]
    async fn test_reclaim_boundary() {
        let store = Arc::new(InMemoryTaskStore::new());
        let stale_after = Duration::from_secs(30);
        let window = chrono::Duration::seconds(30);
        store.seed(in_flight(1, now() - window - chrono::Duration::seconds(1)));
        store.seed(in_flight(2, now() - window + chrono::Duration::seconds(1)));

        let reclaimer = StaleTaskReclaimer::with_timeout(store.clone(), stale_after).unwrap();
        assert_eq!(reclaimer.reclaim_stuck(now()).await.unwrap(), 1);

        let tasks = store.snapshot();
        assert_eq!(tasks[0].status, TaskStatus::Active);
        assert_eq!(tasks[0].next_due_at, Some(now()));
        assert_eq!(tasks[1].status, TaskStatus::InFlight);
    }

    #[tokio::test]
    async fn test_reclaim_leaves_counts_and_errors_alone() {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut task = in_flight(1, now() - chrono::Duration::minutes(5));
        task.execution_count = 3;
        task.last_error = Some("timeout".into());
        store.seed(task);

        let reclaimer = StaleTaskReclaimer::new(store.clone(), &TaskConfig::default()).unwrap();
        assert_eq!(reclaimer.reclaim_stuck(now()).await.unwrap(), 1);

        let task = &store.snapshot()[0];
        assert_eq!(task.execution_count, 3);
        assert_eq!(task.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_nothing_to_reclaim() {
        let store = Arc::new(InMemoryTaskStore::new());
        let reclaimer = StaleTaskReclaimer::new(store, &TaskConfig::default()).unwrap();
        assert_eq!(reclaimer.reclaim_stuck(now()).await.unwrap(), 0);
        assert_eq!(reclaimer.stale_after(), Duration::from_secs(30));
    }
}
