//! # Score Fetch Client
//!
//! The fetch collaborator a task processor calls for each claimed task.
//! Failures are split into transient (worth retrying) and permanent kinds;
//! either way the processor records a failed attempt and the task comes due
//! again on its normal cadence.

pub mod score_client;

use async_trait::async_trait;
use thiserror::Error;

pub use score_client::HttpScoreClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Transient fetch failure: {0}")]
    Transient(String),
    #[error("Permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Fetches the current score for an external entity
#[async_trait]
pub trait ScoreFetcher: Send + Sync + std::fmt::Debug {
    /// Returns the score string, retrying internally per the client's policy.
    async fn fetch_score(&self, entity_id: &str) -> Result<String, FetchError>;
}
