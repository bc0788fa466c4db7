//! # Live Score Poller Server
//!
//! Runs the poll scheduler, worker pool and inbound API as a standalone
//! process.
//!
//! ```bash
//! # Run with the default configuration file (config/poller.toml, optional)
//! cargo run --bin livescore-poller
//!
//! # Explicit file and overrides
//! POLLER_CONFIG_PATH=/etc/poller.toml POLLER__SCHEDULER__BATCH_SIZE=50 cargo run
//! ```

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use livescore_poller::config::ConfigManager;
use livescore_poller::logging;
use livescore_poller::orchestration::PollerSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build_mode = if cfg!(debug_assertions) { "debug" } else { "release" },
        "Starting live score poller"
    );

    let config_manager = ConfigManager::load().context("Failed to load configuration")?;

    let mut system = PollerSystem::bootstrap(config_manager.clone())
        .await
        .context("Failed to bootstrap poller system")?;
    system
        .start()
        .await
        .context("Failed to start poller system")?;

    info!(
        environment = %config_manager.environment(),
        web_address = ?system.web_address(),
        "Live score poller started; press Ctrl+C to shut down"
    );

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown");
    system.shutdown().await;
    info!("Live score poller shutdown complete");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
