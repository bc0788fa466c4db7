//! # Web API Route Definitions

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::middleware::propagate_trace_id;
use crate::web::state::AppState;

/// Routes under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new().route(
        "/events/status",
        post(handlers::events::update_event_status),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_probe))
}

pub fn mock_api_routes() -> Router<AppState> {
    Router::new().route("/events/:event_id", get(handlers::mock_api::event_score))
}

/// Full application router
pub fn create_router(state: AppState, mock_score_api: bool) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(health_routes());

    if mock_score_api {
        router = router.nest("/mock-api", mock_api_routes());
    }

    router
        .layer(middleware::from_fn(propagate_trace_id))
        .with_state(state)
}
