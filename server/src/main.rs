//! narrator-server: HTTP control surface and status stream for the
//! narration pipeline.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use narrator::config::{find_config_path, load_config, Config};
use narrator::Narrator;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

mod api;
mod logging;
mod state;

use state::AppState;

/// How long the processor may spend finishing its current job on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match find_config_path().and_then(load_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("narrator-server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.logging.format);
    info!("Starting narrator-server v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let narrator = Arc::new(Narrator::from_config(&config)?);
    let processor = narrator.start().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(
        Arc::clone(&narrator),
        config.auth.token.clone(),
        shutdown_rx,
    );
    let app = api::create_router(state, &config.storage.directory);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    info!("HTTP server stopped; waiting for the processor");
    processor.shutdown(SHUTDOWN_GRACE).await;
    narrator.models().unload_all().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and tells open status streams to end.
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }

    let _ = shutdown.send(true);
}
