//! # PostgreSQL Task Store
//!
//! Row-level locking gives each mutation exclusive access to the rows it
//! touches. Batch claims and reclaims read with `FOR UPDATE SKIP LOCKED`, so
//! concurrent schedulers (in this process or another) partition the due set
//! instead of racing for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

use super::store::TaskStore;
use crate::error::{PollerError, PollerResult};
use crate::models::task::TaskRow;
use crate::models::{Task, TaskId};
use crate::state_machine::{apply_event, TaskEvent};

const TASK_COLUMNS: &str = "id, entity_id, status, next_due_at, last_attempt_at, created_at, \
     updated_at, execution_count, last_error, last_error_at";

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

// Manual Debug implementation because PgPool carries connection internals
impl std::fmt::Debug for PgTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTaskStore").finish_non_exhaustive()
    }
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn persist(tx: &mut Transaction<'_, Postgres>, task: &Task) -> PollerResult<()> {
        sqlx::query(
            r#"
            UPDATE event_tasks
            SET status = $2,
                next_due_at = $3,
                last_attempt_at = $4,
                updated_at = $5,
                execution_count = $6,
                last_error = $7,
                last_error_at = $8
            WHERE id = $1
            "#,
        )
        .bind(task.id.0)
        .bind(task.status.as_str())
        .bind(task.next_due_at)
        .bind(task.last_attempt_at)
        .bind(task.updated_at)
        .bind(i64::try_from(task.execution_count).unwrap_or(i64::MAX))
        .bind(task.last_error.as_deref())
        .bind(task.last_error_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn apply_to_locked_rows(
        tx: &mut Transaction<'_, Postgres>,
        rows: Vec<TaskRow>,
        event: &TaskEvent,
    ) -> PollerResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut task = Task::try_from(row)?;
            apply_event(&mut task, event)?;
            Self::persist(tx, &task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn limit_param(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn find_by_id(&self, id: TaskId) -> PollerResult<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM event_tasks WHERE id = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn find_by_entity_id(&self, entity_id: &str) -> PollerResult<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM event_tasks WHERE entity_id = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    #[instrument(skip(self, event), fields(event = event.event_type()))]
    async fn upsert_by_entity_id(&self, entity_id: &str, event: &TaskEvent) -> PollerResult<Task> {
        let mut tx = self.pool.begin().await?;
        let at = event.occurred_at();

        sqlx::query(
            r#"
            INSERT INTO event_tasks (entity_id, status, next_due_at, created_at, updated_at, execution_count)
            VALUES ($1, 'inactive', NULL, $2, $2, 0)
            ON CONFLICT (entity_id) DO NOTHING
            "#,
        )
        .bind(entity_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let query = format!("SELECT {TASK_COLUMNS} FROM event_tasks WHERE entity_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(entity_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut task = Task::try_from(row)?;
        apply_event(&mut task, event)?;
        Self::persist(&mut tx, &task).await?;
        tx.commit().await?;

        Ok(task)
    }

    #[instrument(skip(self, event), fields(event = event.event_type()))]
    async fn update(&self, id: TaskId, event: &TaskEvent) -> PollerResult<Task> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {TASK_COLUMNS} FROM event_tasks WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PollerError::TaskNotFound { task_id: id })?;

        let mut task = Task::try_from(row)?;
        apply_event(&mut task, event)?;
        Self::persist(&mut tx, &task).await?;
        tx.commit().await?;

        Ok(task)
    }

    #[instrument(skip(self))]
    async fn claim_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM event_tasks
            WHERE status = 'active'
              AND next_due_at <= $1
            ORDER BY next_due_at ASC, id ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#
        );
        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(now)
            .bind(Self::limit_param(limit))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to select due tasks: {}", e);
                PollerError::DatabaseError(format!("Task claiming failed: {e}"))
            })?;

        let claimed = Self::apply_to_locked_rows(&mut tx, rows, &TaskEvent::Claim { at: now }).await?;
        tx.commit().await?;

        debug!(claimed_count = claimed.len(), "Claimed due tasks");
        Ok(claimed)
    }

    #[instrument(skip(self))]
    async fn reclaim_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> PollerResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM event_tasks
            WHERE status = 'in_flight'
              AND last_attempt_at < $1
            ORDER BY last_attempt_at ASC, id ASC
            FOR UPDATE SKIP LOCKED
            "#
        );
        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(threshold)
            .fetch_all(&mut *tx)
            .await?;

        let reclaimed =
            Self::apply_to_locked_rows(&mut tx, rows, &TaskEvent::Reclaim { at: now }).await?;
        tx.commit().await?;

        Ok(reclaimed)
    }

    async fn find_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>> {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM event_tasks
            WHERE status = 'active'
              AND next_due_at <= $1
            ORDER BY next_due_at ASC, id ASC
            LIMIT $2
            "#
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(now)
            .bind(Self::limit_param(limit))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn find_stale_in_flight(&self, threshold: DateTime<Utc>) -> PollerResult<Vec<Task>> {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM event_tasks
            WHERE status = 'in_flight'
              AND last_attempt_at < $1
            ORDER BY last_attempt_at ASC, id ASC
            "#
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn count_due(&self, now: DateTime<Utc>) -> PollerResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM event_tasks WHERE status = 'active' AND next_due_at <= $1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pg_store_debug_hides_pool() {
        let pool = PgPool::connect_lazy("postgresql://test").expect("Should create lazy pool");
        let store = PgTaskStore::new(pool);
        assert!(format!("{store:?}").starts_with("PgTaskStore"));
    }

    #[test]
    fn test_limit_param_saturates() {
        assert_eq!(PgTaskStore::limit_param(25), 25);
        assert_eq!(PgTaskStore::limit_param(usize::MAX), i64::MAX);
    }
}
