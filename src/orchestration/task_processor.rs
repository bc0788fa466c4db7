//! # Task Processor
//!
//! One unit of work per claimed task: resolve the entity, fetch its score,
//! publish it, and report the outcome. Every per-task error is absorbed here
//! and turned into a stored `last_error` plus the next scheduled attempt;
//! nothing propagates back to the scheduler.

use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::lifecycle_manager::LifecycleManager;
use super::worker_pool::TaskDispatch;
use crate::client::ScoreFetcher;
use crate::error::{PollerError, PollerResult};
use crate::logging::task_span;
use crate::messaging::{EventScoreMessage, ScorePublisher};

/// How a single processing run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Fetched, published, and recorded
    Succeeded,
    /// Recorded as a failed attempt with this (untruncated) error
    Failed { error: String },
    /// The claim was reclaimed or re-claimed before this run could finish;
    /// the newer attempt owns the task and nothing is recorded here
    Superseded,
    /// No outcome could be recorded; the task is left to the reclaimer
    Abandoned { reason: String },
}

pub struct TaskProcessor {
    lifecycle: Arc<LifecycleManager>,
    fetcher: Arc<dyn ScoreFetcher>,
    publisher: Arc<dyn ScorePublisher>,
}

impl std::fmt::Debug for TaskProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProcessor")
            .field("fetcher", &self.fetcher)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl TaskProcessor {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        fetcher: Arc<dyn ScoreFetcher>,
        publisher: Arc<dyn ScorePublisher>,
    ) -> Self {
        Self {
            lifecycle,
            fetcher,
            publisher,
        }
    }

    pub async fn process(&self, dispatch: TaskDispatch) -> ProcessOutcome {
        let span = task_span(&dispatch.trace_id, dispatch.task_id);
        self.process_inner(dispatch).instrument(span).await
    }

    async fn process_inner(&self, dispatch: TaskDispatch) -> ProcessOutcome {
        let TaskDispatch {
            task_id,
            attempt_time,
            ..
        } = dispatch;

        let entity_id = match self
            .lifecycle
            .resolve_claimed_entity(task_id, attempt_time)
            .await
        {
            Ok(entity_id) => entity_id,
            Err(PollerError::AttemptSuperseded { .. }) => {
                info!("Skipping task: claim was superseded while queued");
                return ProcessOutcome::Superseded;
            }
            Err(e) => {
                warn!(error = %e, "Abandoning task: entity could not be resolved");
                return ProcessOutcome::Abandoned {
                    reason: e.to_string(),
                };
            }
        };

        let failure = match self.fetch_and_publish(&entity_id, attempt_time).await {
            Ok(()) => match self.lifecycle.report_success(task_id, attempt_time).await {
                Ok(_) => {
                    debug!(entity_id = %entity_id, "Task processed");
                    return ProcessOutcome::Succeeded;
                }
                Err(PollerError::AttemptSuperseded { .. }) => {
                    info!(entity_id = %entity_id, "Success not recorded: attempt superseded");
                    return ProcessOutcome::Superseded;
                }
                Err(e) => {
                    warn!(entity_id = %entity_id, error = %e, "Recording success failed");
                    e
                }
            },
            Err(e) => {
                warn!(entity_id = %entity_id, error = %e, "Task attempt failed");
                e
            }
        };

        let message = failure.detail();
        match self
            .lifecycle
            .report_failure(task_id, attempt_time, &message)
            .await
        {
            Ok(_) => ProcessOutcome::Failed { error: message },
            Err(PollerError::AttemptSuperseded { .. }) => {
                info!(entity_id = %entity_id, "Failure not recorded: attempt superseded");
                ProcessOutcome::Superseded
            }
            Err(e) => {
                error!(
                    entity_id = %entity_id,
                    error = %e,
                    original_error = %message,
                    "Recording failure failed; task stays in flight until reclaimed"
                );
                ProcessOutcome::Abandoned {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn fetch_and_publish(
        &self,
        entity_id: &str,
        attempt_time: chrono::DateTime<chrono::Utc>,
    ) -> PollerResult<()> {
        let score = self.fetcher.fetch_score(entity_id).await?;
        let message = EventScoreMessage::new(entity_id, score, attempt_time);
        self.publisher
            .publish(&message)
            .await
            .map_err(PollerError::from)
    }
}
