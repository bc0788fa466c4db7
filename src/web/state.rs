//! Shared state handed to every handler.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::database::TaskStore;
use crate::orchestration::LifecycleManager;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub store: Arc<dyn TaskStore>,
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(lifecycle: Arc<LifecycleManager>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            lifecycle,
            store,
            started_at: Utc::now(),
        }
    }
}
