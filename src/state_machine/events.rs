use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events that drive task state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Put the task into the polling rotation, due immediately
    Activate { at: DateTime<Utc> },
    /// Remove the task from the polling rotation
    Deactivate { at: DateTime<Utc> },
    /// Grant exclusive processing rights to one claimer
    Claim { at: DateTime<Utc> },
    /// Attempt completed; fetch and publish both succeeded
    Succeed {
        attempt_time: DateTime<Utc>,
        next_due_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Attempt completed with an error
    Fail {
        attempt_time: DateTime<Utc>,
        next_due_at: DateTime<Utc>,
        error: String,
        at: DateTime<Utc>,
    },
    /// Return an abandoned in-flight task to the rotation, due immediately
    Reclaim { at: DateTime<Utc> },
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Deactivate { .. } => "deactivate",
            Self::Claim { .. } => "claim",
            Self::Succeed { .. } => "succeed",
            Self::Fail { .. } => "fail",
            Self::Reclaim { .. } => "reclaim",
        }
    }

    /// Wall time the event is recorded at (`updated_at`)
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Activate { at }
            | Self::Deactivate { at }
            | Self::Claim { at }
            | Self::Succeed { at, .. }
            | Self::Fail { at, .. }
            | Self::Reclaim { at } => *at,
        }
    }
}
