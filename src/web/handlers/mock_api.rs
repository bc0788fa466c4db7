//! # Mock Score API
//!
//! `GET /mock-api/events/:event_id` stands in for the remote score source
//! during local runs, answering a random `home:away` score.

use axum::extract::Path;
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockScoreResponse {
    pub event_id: String,
    pub current_score: String,
}

pub async fn event_score(Path(event_id): Path<String>) -> Json<MockScoreResponse> {
    let mut rng = rand::thread_rng();
    let home: u8 = rng.gen_range(0..5);
    let away: u8 = rng.gen_range(0..5);
    Json(MockScoreResponse {
        event_id,
        current_score: format!("{home}:{away}"),
    })
}
