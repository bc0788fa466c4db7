//! # Poller Configuration
//!
//! Typed configuration for every component. Values come from an optional TOML
//! file plus `POLLER__SECTION__KEY` environment overrides (see [`loader`]);
//! anything left unset falls back to the defaults below.
//!
//! ```toml
//! [scheduler]
//! min_delay_ms = 100
//! max_delay_ms = 5000
//! batch_size = 100
//!
//! [tasks]
//! execution_interval_seconds = 10
//! in_flight_timeout_seconds = 30
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::MAX_ERROR_MESSAGE_LENGTH;
use crate::resilience::RetryPolicy;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub tasks: TaskConfig,
    pub worker_pool: WorkerPoolConfig,
    pub score_api: ScoreApiConfig,
    pub publisher: PublisherConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/livescore_poller".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 3000,
            run_migrations: true,
        }
    }
}

/// Adaptive scheduler bounds and step sizes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub initial_delay_ms: u64,
    /// Upper bound on tasks claimed per tick
    pub batch_size: usize,
    /// Added when a tick finds nothing due
    pub idle_step_ms: u64,
    /// Removed when a tick fills its batch
    pub load_step_ms: u64,
    /// Added when a tick fills less than half its batch
    pub light_load_step_ms: u64,
    /// Added when a tick fails
    pub error_penalty_ms: u64,
    /// Headroom over an overrunning tick's duration
    pub overrun_margin_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 100,
            max_delay_ms: 5000,
            initial_delay_ms: 1000,
            batch_size: 100,
            idle_step_ms: 500,
            load_step_ms: 200,
            light_load_step_ms: 100,
            error_penalty_ms: 500,
            overrun_margin_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// Task cadence and recovery
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Added to the attempt time to schedule the next attempt
    pub execution_interval_seconds: u64,
    /// In-flight tasks older than this are presumed abandoned
    pub in_flight_timeout_seconds: u64,
    pub max_error_message_length: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            execution_interval_seconds: 10,
            in_flight_timeout_seconds: 30,
            max_error_message_length: MAX_ERROR_MESSAGE_LENGTH,
        }
    }
}

impl TaskConfig {
    pub fn execution_interval(&self) -> Duration {
        Duration::from_secs(self.execution_interval_seconds)
    }

    pub fn in_flight_timeout(&self) -> Duration {
        Duration::from_secs(self.in_flight_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Processors running at once, independent of batch size
    pub max_concurrency: usize,
    /// Dispatches buffered ahead of free workers
    pub queue_capacity: usize,
    pub shutdown_grace_period_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            queue_capacity: 1000,
            shutdown_grace_period_ms: 5000,
        }
    }
}

/// Remote score source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreApiConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for ScoreApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/mock-api".to_string(),
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            max_attempts: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 1000,
        }
    }
}

impl ScoreApiConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    /// Longest a single fetch can take, retries included
    pub fn worst_case_latency(&self) -> Duration {
        let per_attempt = Duration::from_millis(self.connect_timeout_ms + self.read_timeout_ms);
        per_attempt * self.max_attempts + self.retry_policy().total_backoff()
    }
}

/// Message queue the scores are republished onto
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub queue_name: String,
    pub send_timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_name: "live_events_scores".to_string(),
            send_timeout_ms: 5000,
            max_attempts: 3,
            initial_backoff_ms: 200,
            backoff_multiplier: 2.0,
            max_backoff_ms: 2000,
        }
    }
}

impl PublisherConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    pub fn worst_case_latency(&self) -> Duration {
        self.send_timeout() * self.max_attempts + self.retry_policy().total_backoff()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
    /// Serve a random-score stand-in for the remote API under `/mock-api`
    pub mock_score_api: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            mock_score_api: true,
        }
    }
}

impl PollerConfig {
    /// Reject configurations the scheduler cannot honour.
    pub fn validate(&self) -> ConfigResult<()> {
        let scheduler = &self.scheduler;
        if scheduler.min_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.min_delay_ms",
                scheduler.min_delay_ms,
                "must be greater than zero",
            ));
        }
        if scheduler.min_delay_ms > scheduler.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "scheduler.max_delay_ms",
                scheduler.max_delay_ms,
                "must not be below scheduler.min_delay_ms",
            ));
        }
        if !(scheduler.min_delay_ms..=scheduler.max_delay_ms).contains(&scheduler.initial_delay_ms)
        {
            return Err(ConfigurationError::invalid_value(
                "scheduler.initial_delay_ms",
                scheduler.initial_delay_ms,
                "must lie within [min_delay_ms, max_delay_ms]",
            ));
        }
        if scheduler.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.batch_size",
                scheduler.batch_size,
                "must be greater than zero",
            ));
        }
        if self.tasks.execution_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.execution_interval_seconds",
                self.tasks.execution_interval_seconds,
                "must be greater than zero",
            ));
        }
        if self.tasks.in_flight_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.in_flight_timeout_seconds",
                self.tasks.in_flight_timeout_seconds,
                "must be greater than zero",
            ));
        }
        if self.worker_pool.max_concurrency == 0 || self.worker_pool.queue_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_pool",
                format!(
                    "max_concurrency={}, queue_capacity={}",
                    self.worker_pool.max_concurrency, self.worker_pool.queue_capacity
                ),
                "both must be greater than zero",
            ));
        }
        if self.score_api.max_attempts == 0 || self.publisher.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_attempts",
                0,
                "score_api and publisher need at least one attempt",
            ));
        }
        if self.score_api.base_url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "score_api.base_url",
                "\"\"",
                "must not be empty",
            ));
        }
        if self.publisher.queue_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "publisher.queue_name",
                "\"\"",
                "must not be empty",
            ));
        }

        let worst_case = self.score_api.worst_case_latency() + self.publisher.worst_case_latency();
        if self.tasks.in_flight_timeout() <= worst_case {
            warn!(
                in_flight_timeout_ms = self.tasks.in_flight_timeout().as_millis() as u64,
                worst_case_processing_ms = worst_case.as_millis() as u64,
                "In-flight timeout does not exceed worst-case processing latency; slow tasks may be reclaimed while still running"
            );
        }

        Ok(())
    }
}
