//! Error types for the poller.
//!

use thiserror::Error;

use crate::models::task::TaskId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollerError {
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },
    #[error("Score fetch failed (transient): {0}")]
    FetchTransientError(String),
    #[error("Score fetch failed (permanent): {0}")]
    FetchPermanentError(String),
    #[error("Score publish failed: {0}")]
    PublishTransientError(String),
    /// Two claimers obtained the same task. The claim primitive makes this
    /// unreachable; seeing it means the store lost its row-level atomicity.
    #[error("Task {task_id} claimed concurrently")]
    ClaimConflict { task_id: TaskId },
    /// An outcome or processing run for a claim the task no longer holds:
    /// it was reclaimed, re-activated or claimed again since.
    #[error("Attempt on task {task_id} superseded")]
    AttemptSuperseded { task_id: TaskId },
    #[error("Scheduler tick failed: {0}")]
    SchedulerTickError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PollerError {
    /// Errors that a later attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FetchTransientError(_) | Self::PublishTransientError(_) | Self::DatabaseError(_)
        )
    }

    /// The failing collaborator's own message, without this error's kind
    /// prefix. This is what a failed attempt stores as `last_error`.
    pub fn detail(&self) -> String {
        match self {
            Self::FetchTransientError(message)
            | Self::FetchPermanentError(message)
            | Self::PublishTransientError(message)
            | Self::DatabaseError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for PollerError {
    fn from(err: sqlx::Error) -> Self {
        PollerError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PollerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PollerError::DatabaseError(format!("Migration failed: {err}"))
    }
}

impl From<serde_json::Error> for PollerError {
    fn from(error: serde_json::Error) -> Self {
        PollerError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<crate::config::ConfigurationError> for PollerError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        PollerError::ConfigurationError(error.to_string())
    }
}

impl From<crate::client::FetchError> for PollerError {
    fn from(error: crate::client::FetchError) -> Self {
        match error {
            crate::client::FetchError::Transient(msg) => PollerError::FetchTransientError(msg),
            crate::client::FetchError::Permanent(msg) => PollerError::FetchPermanentError(msg),
        }
    }
}

impl From<crate::messaging::MessagingError> for PollerError {
    fn from(error: crate::messaging::MessagingError) -> Self {
        PollerError::PublishTransientError(error.to_string())
    }
}

pub type PollerResult<T> = Result<T, PollerError>;
