use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::state_machine::TaskStatus;

/// Store-assigned identity of a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A polled external entity and its scheduling state.
/// Maps to the `event_tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// External identity being polled; unique across all tasks
    pub entity_id: String,
    pub status: TaskStatus,
    /// Earliest time the task may be claimed; `None` iff the task is inactive
    pub next_due_at: Option<DateTime<Utc>>,
    /// Start of the most recent claim, used for stuck detection
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Completed attempts, successful or not
    pub execution_count: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A fresh, never-scheduled task. Callers apply an activation event before persisting.
    pub fn new(id: TaskId, entity_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            entity_id: entity_id.into(),
            status: TaskStatus::Inactive,
            next_due_at: None,
            last_attempt_at: None,
            created_at: now,
            updated_at: now,
            execution_count: 0,
            last_error: None,
            last_error_at: None,
        }
    }

    /// Active with a due time that has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Active && self.next_due_at.is_some_and(|due| due <= now)
    }

    /// In flight since before `threshold`.
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        self.status == TaskStatus::InFlight
            && self.last_attempt_at.is_some_and(|started| started < threshold)
    }

    /// Whether the claim started at `attempt_time` is still the task's
    /// current attempt: nothing has reclaimed, re-activated or re-claimed
    /// it since. Compared at microsecond precision, the resolution the
    /// PostgreSQL store keeps.
    pub fn holds_attempt(&self, attempt_time: DateTime<Utc>) -> bool {
        matches!(self.status, TaskStatus::InFlight | TaskStatus::Inactive)
            && self
                .last_attempt_at
                .is_some_and(|started| started.trunc_subsecs(6) == attempt_time.trunc_subsecs(6))
    }

    /// `inactive ⇔ next_due_at = None`, and every active task has a due time.
    pub fn satisfies_schedule_invariant(&self) -> bool {
        match self.status {
            TaskStatus::Inactive => self.next_due_at.is_none(),
            TaskStatus::Active => self.next_due_at.is_some(),
            TaskStatus::InFlight => true,
        }
    }
}

/// Raw row as stored in PostgreSQL.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub entity_id: String,
    pub status: String,
    pub next_due_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub execution_count: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = crate::error::PollerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TaskStatus>()
            .map_err(crate::error::PollerError::DatabaseError)?;

        let execution_count = u64::try_from(row.execution_count).map_err(|_| {
            crate::error::PollerError::DatabaseError(format!(
                "task {} has a negative execution count: {}",
                row.id, row.execution_count
            ))
        })?;

        Ok(Self {
            id: TaskId(row.id),
            entity_id: row.entity_id,
            status,
            next_due_at: row.next_due_at,
            last_attempt_at: row.last_attempt_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            execution_count,
            last_error: row.last_error,
            last_error_at: row.last_error_at,
        })
    }
}
