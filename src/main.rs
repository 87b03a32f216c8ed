//! fscache janitor
//!
//! Reclaims expired entries from a filesystem cache tree, either once or on a
//! fixed interval until shut down.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fscache::{spawn_purge_task, Config, FileSystemDriver};

/// Main entry point for the janitor.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the driver, validating the cache root
/// 4. Purge once when the interval is 0, otherwise start the purge task
/// 5. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fscache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fscache janitor");

    let config = Config::from_env();
    info!(
        "Configuration loaded: path={}, dir_split={}, purge_interval={}s",
        config.base_path.display(),
        config.dir_split,
        config.purge_interval
    );

    let interval = config.purge_interval;
    let root = config.base_path.clone();
    let driver = Arc::new(
        FileSystemDriver::new(config)
            .with_context(|| format!("failed to open cache at {}", root.display()))?,
    );

    if interval == 0 {
        let report = tokio::task::spawn_blocking(move || driver.purge_with_report())
            .await
            .context("purge pass panicked")?;
        info!(
            "Single purge complete: {} files and {} directories removed",
            report.files_removed, report.dirs_removed
        );
        return Ok(());
    }

    let purge_handle = spawn_purge_task(driver, interval);
    shutdown_signal().await;

    purge_handle.abort();
    warn!("Purge task aborted");
    info!("Janitor shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
