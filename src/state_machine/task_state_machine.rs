//! Transition rules for [`Task`].
//!
//! | from \ event | Activate | Deactivate | Claim        | Succeed / Fail   | Reclaim |
//! |--------------|----------|------------|--------------|------------------|---------|
//! | Inactive     | Active   | Inactive   | conflict     | record, stay†    | reject  |
//! | Active       | Active   | Inactive   | InFlight*    | superseded       | reject  |
//! | InFlight     | Active   | Inactive   | conflict     | Active†          | Active  |
//!
//! `*` only when due. `†` only for the current attempt: the outcome's
//! `attempt_time` must equal `last_attempt_at`, otherwise it is rejected as
//! superseded and the row is left alone. An outcome arriving after a
//! deactivation records the attempt but keeps the task out of rotation.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{TaskEvent, TaskStatus};
use crate::error::{PollerError, PollerResult};
use crate::models::Task;

/// Apply `event` to `task` in place, or leave it untouched and return the reason.
pub fn apply_event(task: &mut Task, event: &TaskEvent) -> PollerResult<()> {
    let from = task.status;

    match event {
        TaskEvent::Activate { at } => {
            task.status = TaskStatus::Active;
            task.next_due_at = Some(*at);
        }
        TaskEvent::Deactivate { .. } => {
            task.status = TaskStatus::Inactive;
            task.next_due_at = None;
        }
        TaskEvent::Claim { at } => {
            if from != TaskStatus::Active {
                return Err(PollerError::ClaimConflict { task_id: task.id });
            }
            if !task.is_due(*at) {
                return Err(PollerError::StateTransitionError(format!(
                    "task {} is not due at {at}",
                    task.id
                )));
            }
            task.status = TaskStatus::InFlight;
            task.last_attempt_at = Some(*at);
        }
        TaskEvent::Succeed {
            attempt_time,
            next_due_at,
            ..
        } => {
            ensure_current_attempt(task, *attempt_time)?;
            record_attempt(task, *next_due_at);
            task.last_error = None;
            task.last_error_at = None;
        }
        TaskEvent::Fail {
            attempt_time,
            next_due_at,
            error,
            ..
        } => {
            ensure_current_attempt(task, *attempt_time)?;
            record_attempt(task, *next_due_at);
            task.last_error = Some(error.clone());
            task.last_error_at = Some(*attempt_time);
        }
        TaskEvent::Reclaim { at } => {
            if from != TaskStatus::InFlight {
                return Err(PollerError::StateTransitionError(format!(
                    "cannot reclaim task {} in status {from}",
                    task.id
                )));
            }
            task.status = TaskStatus::Active;
            task.next_due_at = Some(*at);
        }
    }

    task.updated_at = event.occurred_at();

    debug!(
        task_id = %task.id,
        event = event.event_type(),
        from = %from,
        to = %task.status,
        "Task transition applied"
    );

    Ok(())
}

fn ensure_current_attempt(task: &Task, attempt_time: DateTime<Utc>) -> PollerResult<()> {
    if task.holds_attempt(attempt_time) {
        return Ok(());
    }
    debug!(
        task_id = %task.id,
        status = %task.status,
        attempt_time = %attempt_time,
        last_attempt_at = ?task.last_attempt_at,
        "Rejecting outcome for a superseded attempt"
    );
    Err(PollerError::AttemptSuperseded { task_id: task.id })
}

fn record_attempt(task: &mut Task, next_due_at: DateTime<Utc>) {
    task.execution_count += 1;
    if task.status == TaskStatus::Inactive {
        return;
    }
    task.status = TaskStatus::Active;
    task.next_due_at = Some(next_due_at);
}
