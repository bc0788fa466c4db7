//! # Worker Pool
//!
//! Bounded-concurrency execution of task processors. The scheduler hands
//! claimed tasks over a bounded channel; a dispatcher loop runs at most
//! `max_concurrency` processors at once, independent of batch size.
//!
//! Dispatch never blocks a tick. The scheduler claims no more than
//! [`WorkerPool::available_capacity`]; a dispatch that still does not fit is
//! dropped and its task stays in flight until the reclaimer returns it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::task_processor::TaskProcessor;
use crate::config::WorkerPoolConfig;
use crate::logging::new_trace_id;
use crate::models::TaskId;

/// A claimed task handed to the pool
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDispatch {
    pub task_id: TaskId,
    /// Claim time; becomes the message timestamp and the base for the next due time
    pub attempt_time: DateTime<Utc>,
    pub trace_id: String,
}

impl TaskDispatch {
    pub fn new(task_id: TaskId, attempt_time: DateTime<Utc>) -> Self {
        Self {
            task_id,
            attempt_time,
            trace_id: new_trace_id(),
        }
    }
}

pub struct WorkerPool {
    sender: mpsc::Sender<TaskDispatch>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    shutdown_grace_period: Duration,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrency", &self.max_concurrency)
            .field("active_workers", &self.active_workers())
            .field("queued", &self.queued())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn the dispatcher loop. Must be called inside a tokio runtime.
    pub fn start(processor: Arc<TaskProcessor>, config: &WorkerPoolConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let shutdown_grace_period = Duration::from_millis(config.shutdown_grace_period_ms);

        let dispatcher = tokio::spawn(run_dispatcher(
            processor,
            receiver,
            semaphore.clone(),
            shutdown_rx,
            shutdown_grace_period,
        ));

        info!(
            max_concurrency,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            sender,
            semaphore,
            max_concurrency,
            shutdown_grace_period,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a claimed task without waiting. Returns `false` if the queue is
    /// full or the pool is shut down.
    pub fn dispatch(&self, dispatch: TaskDispatch) -> bool {
        match self.sender.try_send(dispatch) {
            Ok(()) => true,
            Err(TrySendError::Full(dispatch)) => {
                warn!(
                    task_id = %dispatch.task_id,
                    "Worker queue full; task left in flight for the reclaimer"
                );
                false
            }
            Err(TrySendError::Closed(dispatch)) => {
                warn!(
                    task_id = %dispatch.task_id,
                    "Worker pool shut down; task left in flight for the reclaimer"
                );
                false
            }
        }
    }

    /// Processors running right now
    pub fn active_workers(&self) -> usize {
        self.max_concurrency
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Dispatches waiting for a free worker
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Dispatches the queue can take right now without rejecting any
    pub fn available_capacity(&self) -> usize {
        if self.sender.is_closed() {
            return 0;
        }
        self.sender.capacity()
    }

    pub fn is_accepting(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Stop accepting work, give running processors the grace period to
    /// finish, then abort the rest. Queued dispatches are dropped.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker pool dispatcher terminated abnormally");
            }
            info!(
                grace_period_ms = self.shutdown_grace_period.as_millis() as u64,
                "Worker pool stopped"
            );
        }
    }
}

async fn run_dispatcher(
    processor: Arc<TaskProcessor>,
    mut receiver: mpsc::Receiver<TaskDispatch>,
    semaphore: Arc<Semaphore>,
    mut shutdown_rx: oneshot::Receiver<()>,
    grace_period: Duration,
) {
    let mut workers = JoinSet::new();

    loop {
        let dispatch = tokio::select! {
            _ = &mut shutdown_rx => break,
            next = receiver.recv() => match next {
                Some(dispatch) => dispatch,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = &mut shutdown_rx => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let processor = processor.clone();
        workers.spawn(async move {
            let _permit = permit;
            processor.process(dispatch).await
        });

        while let Some(finished) = workers.try_join_next() {
            log_worker_exit(finished);
        }
    }

    receiver.close();
    let abandoned = drain(&mut receiver);
    if abandoned > 0 {
        warn!(abandoned, "Dropped queued dispatches at shutdown");
    }

    let running = workers.len();
    if running == 0 {
        return;
    }
    debug!(running, "Waiting for running processors");

    let drained = tokio::time::timeout(grace_period, async {
        while let Some(finished) = workers.join_next().await {
            log_worker_exit(finished);
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = workers.len(),
            "Grace period elapsed; aborting running processors"
        );
        workers.abort_all();
        while workers.join_next().await.is_some() {}
    }
}

fn drain(receiver: &mut mpsc::Receiver<TaskDispatch>) -> usize {
    let mut count = 0;
    while receiver.try_recv().is_ok() {
        count += 1;
    }
    count
}

fn log_worker_exit<T: std::fmt::Debug>(finished: Result<T, tokio::task::JoinError>) {
    match finished {
        Ok(outcome) => debug!(?outcome, "Processor finished"),
        Err(e) if e.is_panic() => error!(error = %e, "Processor panicked; task left for the reclaimer"),
        Err(_) => {}
    }
}
