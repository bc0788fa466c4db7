//! Score message published for every successful fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{"eventId": "...", "score": "2:1", "timestamp": "..."}` on the wire.
///
/// `timestamp` is the attempt time of the task that produced the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScoreMessage {
    #[serde(rename = "eventId")]
    pub entity_id: String,
    pub score: String,
    pub timestamp: DateTime<Utc>,
}

impl EventScoreMessage {
    pub fn new(entity_id: impl Into<String>, score: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            score: score.into(),
            timestamp,
        }
    }
}
