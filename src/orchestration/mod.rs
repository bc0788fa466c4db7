//! # Orchestration
//!
//! The polling core. Leaves first:
//!
//! - [`lifecycle_manager`]: every task state change, over the task store
//! - [`stale_task_reclaimer`]: frees tasks stuck in flight
//! - [`adaptive_delay`] and [`scheduler`]: the self-tuning tick timer
//! - [`task_processor`] and [`worker_pool`]: bounded-concurrency fetch and publish
//! - [`bootstrap`]: wires the above into a running [`PollerSystem`]
//!
//! A tick flows scheduler → reclaimer → lifecycle claim → worker pool →
//! processor → lifecycle outcome report.

pub mod adaptive_delay;
pub mod bootstrap;
pub mod lifecycle_manager;
pub mod scheduler;
pub mod stale_task_reclaimer;
pub mod task_processor;
pub mod worker_pool;

pub use adaptive_delay::AdaptiveDelay;
pub use bootstrap::PollerSystem;
pub use lifecycle_manager::LifecycleManager;
pub use scheduler::{AdaptiveScheduler, SchedulerHandle, TickOutcome};
pub use stale_task_reclaimer::StaleTaskReclaimer;
pub use task_processor::{ProcessOutcome, TaskProcessor};
pub use worker_pool::{TaskDispatch, WorkerPool};
