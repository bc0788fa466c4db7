//! # Score Publisher
//!
//! Sends [`EventScoreMessage`]s to a pgmq queue sharing the store's pool.
//! Each send is bounded by a timeout and retried on transient failure.

use async_trait::async_trait;
use pgmq::PGMQueue;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use super::{EventScoreMessage, MessagingError};
use crate::config::PublisherConfig;
use crate::resilience::RetryPolicy;

/// Publishes scores onto the message bus
#[async_trait]
pub trait ScorePublisher: Send + Sync + std::fmt::Debug {
    /// Returns once delivery is confirmed, retrying internally per policy.
    async fn publish(&self, message: &EventScoreMessage) -> Result<(), MessagingError>;
}

#[derive(Clone)]
pub struct PgmqScorePublisher {
    pgmq: PGMQueue,
    queue_name: String,
    send_timeout: std::time::Duration,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for PgmqScorePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgmqScorePublisher")
            .field("queue_name", &self.queue_name)
            .field("send_timeout", &self.send_timeout)
            .field("max_attempts", &self.retry_policy.max_attempts)
            .finish_non_exhaustive()
    }
}

impl PgmqScorePublisher {
    /// Create a publisher over an existing pool (no queue setup)
    pub async fn new_with_pool(pool: PgPool, config: &PublisherConfig) -> Self {
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self {
            pgmq,
            queue_name: config.queue_name.clone(),
            send_timeout: config.send_timeout(),
            retry_policy: config.retry_policy(),
        }
    }

    /// Create the target queue if it does not exist yet
    pub async fn ensure_queue(&self) -> Result<(), MessagingError> {
        self.pgmq
            .create(&self.queue_name)
            .await
            .map_err(|e| MessagingError::QueueSetup {
                queue_name: self.queue_name.clone(),
                message: e.to_string(),
            })?;
        info!(queue_name = %self.queue_name, "Score queue ready");
        Ok(())
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    async fn send_once(&self, payload: &serde_json::Value) -> Result<i64, MessagingError> {
        match tokio::time::timeout(self.send_timeout, self.pgmq.send(&self.queue_name, payload))
            .await
        {
            Ok(Ok(message_id)) => Ok(message_id),
            Ok(Err(e)) => Err(MessagingError::SendFailed {
                queue_name: self.queue_name.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(MessagingError::Timeout {
                operation: format!("send to {}", self.queue_name),
                timeout_ms: self.send_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl ScorePublisher for PgmqScorePublisher {
    #[instrument(skip(self, message), fields(entity_id = %message.entity_id, queue = %self.queue_name))]
    async fn publish(&self, message: &EventScoreMessage) -> Result<(), MessagingError> {
        let payload = serde_json::to_value(message)?;
        let message_id = self
            .retry_policy
            .retry(
                "publish_score",
                |_| self.send_once(&payload),
                MessagingError::is_transient,
            )
            .await?;
        debug!(message_id, "Score published");
        Ok(())
    }
}
