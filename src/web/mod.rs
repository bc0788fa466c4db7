//! # Web API
//!
//! Inbound HTTP surface: the event activation endpoint, health probes, and
//! an optional mock of the remote score API for local runs.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{PollerError, PollerResult};

/// A running HTTP server
#[derive(Debug)]
pub struct WebServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl WebServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            error!(error = %e, "Web server task terminated abnormally");
        }
        info!(address = %self.local_addr, "Web server stopped");
    }
}

/// Bind `bind_address` and serve the application router in the background.
pub async fn start_server(
    bind_address: &str,
    state: AppState,
    mock_score_api: bool,
) -> PollerResult<WebServerHandle> {
    let listener = TcpListener::bind(bind_address).await.map_err(|e| {
        PollerError::ConfigurationError(format!("Failed to bind {bind_address}: {e}"))
    })?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| PollerError::Internal(format!("Failed to read bound address: {e}")))?;

    let router = create_router(state, mock_score_api);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "Web server failed");
        }
    });

    info!(address = %local_addr, mock_score_api, "Web server listening");

    Ok(WebServerHandle {
        local_addr,
        shutdown_tx,
        join,
    })
}
