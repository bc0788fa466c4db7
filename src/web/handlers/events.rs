//! # Event Status Handler
//!
//! `POST /api/v1/events/status` is the activation boundary: it puts an event
//! into (or out of) the polling rotation and answers `202 Accepted`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::web::error::{ApiError, PathedApiError};
use crate::web::middleware::TraceId;
use crate::web::state::AppState;

/// Request body. Fields are optional so missing and `null` values surface
/// as validation messages rather than generic decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusRequest {
    pub event_id: Option<String>,
    pub live: Option<bool>,
}

impl EventStatusRequest {
    fn validate(self) -> Result<(String, bool), ApiError> {
        let event_id = match self.event_id {
            Some(event_id) if !event_id.trim().is_empty() => event_id,
            _ => return Err(ApiError::bad_request("eventId is required")),
        };
        let live = self
            .live
            .ok_or_else(|| ApiError::bad_request("live is required"))?;
        Ok((event_id, live))
    }
}

pub async fn update_event_status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    trace_id: Option<Extension<TraceId>>,
    payload: Result<Json<EventStatusRequest>, JsonRejection>,
) -> Result<StatusCode, PathedApiError> {
    let path = uri.path().to_string();
    let trace_id = trace_id.map(|Extension(id)| id.0).unwrap_or_default();

    let Json(request) = payload
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()).at(path.clone()))?;
    let (event_id, live) = request.validate().map_err(|e| e.at(path.clone()))?;

    info!(trace_id = %trace_id, event_id = %event_id, live, "Received event status update");

    state
        .lifecycle
        .set_active(&event_id, live)
        .await
        .map_err(|e| ApiError::from(e).at(path))?;

    info!(trace_id = %trace_id, event_id = %event_id, live, "Event status update accepted");
    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rules() {
        let ok = EventStatusRequest {
            event_id: Some("match-1".into()),
            live: Some(false),
        };
        assert_eq!(ok.validate().unwrap(), ("match-1".to_string(), false));

        let blank = EventStatusRequest {
            event_id: Some("   ".into()),
            live: Some(true),
        };
        assert_eq!(blank.validate().unwrap_err(), ApiError::bad_request("eventId is required"));

        let no_live = EventStatusRequest {
            event_id: Some("match-1".into()),
            live: None,
        };
        assert_eq!(no_live.validate().unwrap_err(), ApiError::bad_request("live is required"));

        assert!(EventStatusRequest::default().validate().is_err());
    }
}
