//! # Health Check Handlers

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::web::error::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Basic health check endpoint: GET /health
///
/// Answers as long as the process is serving requests.
pub async fn basic_health(_state: State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: String,
    pub due_tasks: u64,
    pub uptime_seconds: i64,
}

/// Readiness probe: GET /ready
///
/// Ready once the task store answers queries.
pub async fn readiness_probe(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, ApiError> {
    let now = Utc::now();
    let due_tasks = state.store.count_due(now).await.map_err(|e| {
        warn!(error = %e, "Readiness check failed: task store unreachable");
        ApiError::ServiceUnavailable
    })?;

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        timestamp: now.to_rfc3339(),
        due_tasks,
        uptime_seconds: (now - state.started_at).num_seconds(),
    }))
}
