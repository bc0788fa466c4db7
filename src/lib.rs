#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Live Score Poller
//!
//! Adaptive poll scheduler for live-event scores. Each tracked event is a
//! task; a single self-tuning timer claims due tasks in batches, fetches
//! their scores from a remote API, republishes them onto a PostgreSQL message
//! queue, and schedules the next attempt. Tasks abandoned mid-flight are
//! recovered automatically.
//!
//! ## Guarantees
//!
//! - A task is never claimed by two workers at once, across processes
//!   (`FOR UPDATE SKIP LOCKED` claims).
//! - Delivery to the queue is at-least-once.
//! - Failed attempts are never terminal; the task comes due again one
//!   execution interval after the attempt.
//! - The scheduler delay stays within its configured bounds and the
//!   scheduler survives every tick failure.
//!
//! ## Module Organization
//!
//! - [`models`] - the `Task` record
//! - [`state_machine`] - task statuses, events and the transition rules
//! - [`database`] - the `TaskStore` contract with PostgreSQL and in-memory backends
//! - [`orchestration`] - lifecycle manager, reclaimer, scheduler, worker pool
//! - [`client`] - remote score fetch
//! - [`messaging`] - score publishing over pgmq
//! - [`resilience`] - retry with exponential backoff
//! - [`web`] - inbound activation API
//! - [`config`], [`logging`], [`error`] - ambient concerns
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livescore_poller::config::ConfigManager;
//! use livescore_poller::orchestration::PollerSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! livescore_poller::logging::init_structured_logging();
//! let config = ConfigManager::load()?;
//! let mut system = PollerSystem::bootstrap(config).await?;
//! system.start().await?;
//! // ...
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;
pub mod web;

pub use error::{PollerError, PollerResult};
pub use models::{Task, TaskId};
pub use orchestration::{AdaptiveScheduler, LifecycleManager, PollerSystem};
pub use state_machine::{TaskEvent, TaskStatus};
