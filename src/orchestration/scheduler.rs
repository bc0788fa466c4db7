//! # Adaptive Scheduler
//!
//! A single logical timer. Each tick reclaims stuck tasks, claims a batch of
//! due tasks, and hands them to the worker pool; the delay before the next
//! tick is then recomputed from the batch size and tick duration (see
//! [`AdaptiveDelay`]). Tick duration covers reclaim, claim and dispatch only;
//! processors finish on their own time.
//!
//! At most one tick body runs at a time. A tick that finds the previous one
//! still running is skipped, not queued. A failed tick widens the delay and
//! the timer carries on.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::adaptive_delay::AdaptiveDelay;
use super::lifecycle_manager::LifecycleManager;
use super::stale_task_reclaimer::StaleTaskReclaimer;
use super::worker_pool::{TaskDispatch, WorkerPool};
use crate::config::SchedulerConfig;
use crate::error::{PollerError, PollerResult};
use crate::logging::new_trace_id;

/// What one completed tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub reclaimed: usize,
    pub claimed: usize,
    /// Claimed tasks accepted by the worker pool
    pub dispatched: usize,
    pub duration: Duration,
    /// Delay chosen for the next tick
    pub next_delay: Duration,
}

pub struct AdaptiveScheduler {
    lifecycle: Arc<LifecycleManager>,
    reclaimer: Arc<StaleTaskReclaimer>,
    worker_pool: Arc<WorkerPool>,
    delay: Mutex<AdaptiveDelay>,
    running: AtomicBool,
    batch_size: usize,
}

impl std::fmt::Debug for AdaptiveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveScheduler")
            .field("batch_size", &self.batch_size)
            .field("current_delay", &self.current_delay())
            .field("tick_running", &self.is_tick_running())
            .finish_non_exhaustive()
    }
}

/// Releases the re-entry flag when the tick body ends, even by panic
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AdaptiveScheduler {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        reclaimer: Arc<StaleTaskReclaimer>,
        worker_pool: Arc<WorkerPool>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            lifecycle,
            reclaimer,
            worker_pool,
            delay: Mutex::new(AdaptiveDelay::new(config)),
            running: AtomicBool::new(false),
            batch_size: config.batch_size,
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.delay.lock().current()
    }

    /// Whether a tick body is executing right now
    pub fn is_tick_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the timer loop. The first tick fires after the initial delay.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let scheduler = Arc::clone(self);

        let join = tokio::spawn(async move {
            info!(
                initial_delay_ms = scheduler.current_delay().as_millis() as u64,
                batch_size = scheduler.batch_size,
                "Adaptive scheduler started"
            );

            loop {
                let delay = scheduler.current_delay();
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let span = info_span!("scheduler_tick", trace_id = %new_trace_id());
                match scheduler.run_tick().instrument(span).await {
                    Ok(Some(outcome)) => {
                        if outcome.claimed > 0 || outcome.reclaimed > 0 {
                            info!(
                                reclaimed = outcome.reclaimed,
                                claimed = outcome.claimed,
                                dispatched = outcome.dispatched,
                                duration_ms = outcome.duration.as_millis() as u64,
                                next_delay_ms = outcome.next_delay.as_millis() as u64,
                                "Scheduler tick completed"
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!(
                        error = %e,
                        next_delay_ms = scheduler.current_delay().as_millis() as u64,
                        "Scheduler tick failed"
                    ),
                }
            }

            info!("Adaptive scheduler stopped");
        });

        SchedulerHandle {
            scheduler: Arc::clone(self),
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        }
    }

    /// Run one tick now.
    ///
    /// Returns `Ok(None)` when another tick is still running (skipped, delay
    /// untouched). A failed tick has already widened the delay when its
    /// error is returned.
    pub async fn run_tick(&self) -> PollerResult<Option<TickOutcome>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous tick still running; skipping this one");
            return Ok(None);
        }
        let _guard = TickGuard(&self.running);

        let started = Instant::now();
        match self.tick_body().await {
            Ok((reclaimed, claimed, dispatched)) => {
                let duration = started.elapsed();
                let next_delay = self.delay.lock().observe(claimed, duration);
                debug!(
                    reclaimed,
                    claimed,
                    dispatched,
                    duration_ms = duration.as_millis() as u64,
                    next_delay_ms = next_delay.as_millis() as u64,
                    "Tick finished"
                );
                Ok(Some(TickOutcome {
                    reclaimed,
                    claimed,
                    dispatched,
                    duration,
                    next_delay,
                }))
            }
            Err(e) => {
                let next_delay = self.delay.lock().penalize();
                debug!(next_delay_ms = next_delay.as_millis() as u64, "Tick penalized");
                Err(PollerError::SchedulerTickError(e.to_string()))
            }
        }
    }

    async fn tick_body(&self) -> PollerResult<(usize, usize, usize)> {
        let now = Utc::now();
        let reclaimed = self.reclaimer.reclaim_stuck(now).await?;

        // claims beyond the pool's free room would sit in flight unprocessed
        let room = self.worker_pool.available_capacity();
        let limit = self.batch_size.min(room);
        if limit < self.batch_size {
            debug!(room, batch_size = self.batch_size, "Worker queue backlog limits this claim");
        }
        let claimed = self.lifecycle.claim_due_batch(now, limit).await?;

        let dispatched = claimed
            .iter()
            .filter(|task_id| self.worker_pool.dispatch(TaskDispatch::new(**task_id, now)))
            .count();
        if dispatched < claimed.len() {
            warn!(
                claimed = claimed.len(),
                dispatched,
                "Some claimed tasks could not be dispatched"
            );
        }

        Ok((reclaimed, claimed.len(), dispatched))
    }
}

/// Control over a started scheduler
pub struct SchedulerHandle {
    scheduler: Arc<AdaptiveScheduler>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("running", &self.is_running())
            .field("current_delay", &self.current_delay())
            .finish()
    }
}

impl SchedulerHandle {
    pub fn current_delay(&self) -> Duration {
        self.scheduler.current_delay()
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Cancel the pending timer and wait for the loop to exit. A tick that
    /// is already running completes first.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(error = %e, "Scheduler loop terminated abnormally");
            }
        }
    }
}
