#![allow(dead_code)]

pub mod doubles;

pub use doubles::*;

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use livescore_poller::config::{ConfigManager, PollerConfig};
use livescore_poller::database::InMemoryTaskStore;
use livescore_poller::orchestration::{LifecycleManager, PollerSystem};

/// Fixed reference instant for deterministic timestamps
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn lifecycle_over(store: Arc<InMemoryTaskStore>) -> LifecycleManager {
    LifecycleManager::new(store, &PollerConfig::default().tasks).unwrap()
}

/// Configuration for in-process runs: fast ticks, no web server
pub fn fast_config() -> PollerConfig {
    let mut config = PollerConfig::default();
    config.scheduler.min_delay_ms = 10;
    config.scheduler.initial_delay_ms = 10;
    config.web.enabled = false;
    config
}

/// A full system over the in-memory store and the given doubles
pub fn system_with(
    config: PollerConfig,
    store: Arc<InMemoryTaskStore>,
    fetcher: Arc<ScriptedFetcher>,
    publisher: Arc<RecordingPublisher>,
) -> PollerSystem {
    let manager = ConfigManager::from_config(config).unwrap();
    PollerSystem::from_components(manager, store, fetcher, publisher).unwrap()
}
