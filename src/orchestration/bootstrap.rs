//! # Poller Bootstrap
//!
//! Builds the whole system from configuration: database pool and migrations,
//! task store, lifecycle manager, reclaimer, fetch and publish collaborators,
//! worker pool, scheduler, and the optional web server.
//!
//! Shutdown order: stop the scheduler (no new claims), stop the web server
//! (no new activations), drain the worker pool, close the pool.

use std::sync::Arc;
use tracing::{info, warn};

use super::lifecycle_manager::LifecycleManager;
use super::scheduler::{AdaptiveScheduler, SchedulerHandle};
use super::stale_task_reclaimer::StaleTaskReclaimer;
use super::task_processor::TaskProcessor;
use super::worker_pool::WorkerPool;
use crate::client::{HttpScoreClient, ScoreFetcher};
use crate::config::ConfigManager;
use crate::database::{migrator, DatabaseConnection, PgTaskStore, TaskStore};
use crate::error::PollerResult;
use crate::messaging::{PgmqScorePublisher, ScorePublisher};
use crate::web::{self, AppState, WebServerHandle};

pub struct PollerSystem {
    config_manager: Arc<ConfigManager>,
    database: Option<DatabaseConnection>,
    store: Arc<dyn TaskStore>,
    lifecycle: Arc<LifecycleManager>,
    scheduler: Arc<AdaptiveScheduler>,
    worker_pool: Arc<WorkerPool>,
    scheduler_handle: Option<SchedulerHandle>,
    web_server: Option<WebServerHandle>,
}

impl std::fmt::Debug for PollerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerSystem")
            .field("environment", &self.config_manager.environment())
            .field("running", &self.is_running())
            .field("worker_pool", &self.worker_pool)
            .finish_non_exhaustive()
    }
}

impl PollerSystem {
    /// Connect to PostgreSQL and build every component. Nothing runs until
    /// [`start`](Self::start).
    pub async fn bootstrap(config_manager: Arc<ConfigManager>) -> PollerResult<Self> {
        let config = config_manager.config();

        let database = DatabaseConnection::connect(&config.database).await?;
        if config.database.run_migrations {
            migrator::run_migrations(database.pool()).await?;
        }

        let store: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(database.pool().clone()));
        let fetcher: Arc<dyn ScoreFetcher> = Arc::new(HttpScoreClient::new(&config.score_api)?);
        let publisher =
            PgmqScorePublisher::new_with_pool(database.pool().clone(), &config.publisher).await;
        publisher.ensure_queue().await?;

        let mut system =
            Self::from_components(config_manager.clone(), store, fetcher, Arc::new(publisher))?;
        system.database = Some(database);

        info!(
            environment = %config_manager.environment(),
            "Poller system bootstrapped"
        );
        Ok(system)
    }

    /// Build the system over caller-supplied collaborators. Must run inside a
    /// tokio runtime; the worker pool starts immediately and idles until work
    /// arrives.
    pub fn from_components(
        config_manager: Arc<ConfigManager>,
        store: Arc<dyn TaskStore>,
        fetcher: Arc<dyn ScoreFetcher>,
        publisher: Arc<dyn ScorePublisher>,
    ) -> PollerResult<Self> {
        let config = config_manager.config();

        let lifecycle = Arc::new(LifecycleManager::new(store.clone(), &config.tasks)?);
        let reclaimer = Arc::new(StaleTaskReclaimer::new(store.clone(), &config.tasks)?);
        let processor = Arc::new(TaskProcessor::new(lifecycle.clone(), fetcher, publisher));
        let worker_pool = Arc::new(WorkerPool::start(processor, &config.worker_pool));
        let scheduler = Arc::new(AdaptiveScheduler::new(
            lifecycle.clone(),
            reclaimer,
            worker_pool.clone(),
            &config.scheduler,
        ));

        Ok(Self {
            config_manager,
            database: None,
            store,
            lifecycle,
            scheduler,
            worker_pool,
            scheduler_handle: None,
            web_server: None,
        })
    }

    /// Start the scheduler and, when enabled, the web server.
    pub async fn start(&mut self) -> PollerResult<()> {
        if self.is_running() {
            warn!("Poller system already running");
            return Ok(());
        }

        let web_config = &self.config_manager.config().web;
        if web_config.enabled {
            let state = AppState::new(self.lifecycle.clone(), self.store.clone());
            let server =
                web::start_server(&web_config.bind_address, state, web_config.mock_score_api)
                    .await?;
            self.web_server = Some(server);
        }

        self.scheduler_handle = Some(self.scheduler.start());
        info!("Poller system started");
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        info!("Poller system shutting down");
        if let Some(mut handle) = self.scheduler_handle.take() {
            handle.stop().await;
        }
        if let Some(server) = self.web_server.take() {
            server.shutdown().await;
        }
        self.worker_pool.shutdown().await;
        if let Some(database) = self.database.take() {
            database.close().await;
        }
        info!("Poller system stopped");
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_handle
            .as_ref()
            .is_some_and(SchedulerHandle::is_running)
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn scheduler(&self) -> &Arc<AdaptiveScheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn web_address(&self) -> Option<std::net::SocketAddr> {
        self.web_server.as_ref().map(WebServerHandle::local_addr)
    }
}
