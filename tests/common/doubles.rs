//! Scripted fetch and publish collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use livescore_poller::client::{FetchError, ScoreFetcher};
use livescore_poller::messaging::{EventScoreMessage, MessagingError, ScorePublisher};

/// Returns a configured result per entity, `"0:0"` otherwise
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    results: Mutex<HashMap<String, Result<String, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, entity_id: &str, result: Result<String, FetchError>) {
        self.results.lock().insert(entity_id.to_string(), result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreFetcher for ScriptedFetcher {
    async fn fetch_score(&self, entity_id: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .get(entity_id)
            .cloned()
            .unwrap_or_else(|| Ok("0:0".to_string()))
    }
}

/// Records every published message, or fails every publish when told to
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    failure: Mutex<Option<MessagingError>>,
    sent: Mutex<Vec<EventScoreMessage>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: MessagingError) {
        *self.failure.lock() = Some(error);
    }

    pub fn sent(&self) -> Vec<EventScoreMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ScorePublisher for RecordingPublisher {
    async fn publish(&self, message: &EventScoreMessage) -> Result<(), MessagingError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
