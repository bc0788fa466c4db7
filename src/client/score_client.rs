//! # HTTP Score Client
//!
//! `GET {base_url}/events/{entity_id}` against the remote score API, which
//! answers `{"eventId": "...", "currentScore": "2:1"}`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{FetchError, ScoreFetcher};
use crate::config::ScoreApiConfig;
use crate::error::{PollerError, PollerResult};
use crate::resilience::RetryPolicy;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
    current_score: Option<String>,
}

#[derive(Clone)]
pub struct HttpScoreClient {
    client: Client,
    base_url: Url,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for HttpScoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScoreClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_attempts", &self.retry_policy.max_attempts)
            .finish()
    }
}

impl HttpScoreClient {
    pub fn new(config: &ScoreApiConfig) -> PollerResult<Self> {
        // Normalized to exactly one trailing slash; `event_url` drops the empty segment.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            PollerError::ConfigurationError(format!("Invalid score API base URL: {e}"))
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(
                config.connect_timeout_ms + config.read_timeout_ms,
            ))
            .user_agent(format!("livescore-poller/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PollerError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            base_url = %base_url,
            max_attempts = config.max_attempts,
            "Created score API client"
        );

        Ok(Self {
            client,
            base_url,
            retry_policy: config.retry_policy(),
        })
    }

    fn event_url(&self, entity_id: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Permanent("score API base URL cannot hold a path".into()))?
            .pop_if_empty()
            .push("events")
            .push(entity_id);
        Ok(url)
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP {status} from {url}: {body}");
            return Err(if is_transient_status(status) {
                FetchError::Transient(message)
            } else {
                FetchError::Permanent(message)
            });
        }

        let body: ScoreResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transient(format!("Timed out reading score body: {e}"))
            } else {
                FetchError::Permanent(format!("Invalid score response body: {e}"))
            }
        })?;

        match body.current_score {
            Some(score) if !score.trim().is_empty() => Ok(score),
            _ => Err(FetchError::Permanent(format!(
                "Score response from {url} has no currentScore"
            ))),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_request_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        FetchError::Transient(format!("Score API request failed: {error}"))
    } else {
        FetchError::Permanent(format!("Score API request failed: {error}"))
    }
}

#[async_trait]
impl ScoreFetcher for HttpScoreClient {
    #[instrument(skip(self))]
    async fn fetch_score(&self, entity_id: &str) -> Result<String, FetchError> {
        let url = self.event_url(entity_id)?;
        debug!(url = %url, "Fetching score");
        self.retry_policy
            .retry(
                "fetch_score",
                |_| self.fetch_once(&url),
                FetchError::is_transient,
            )
            .await
    }
}
