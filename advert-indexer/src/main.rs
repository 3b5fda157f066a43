//! Advert Indexer Main Entry Point
//!
//! Consumes advert and category events from Kafka and indexes them into
//! OpenSearch until SIGINT or SIGTERM.

use advert_indexer::server::{self, Health};
use advert_indexer::{Dependencies, IndexerError, Settings};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "advert_indexer=info,advert_indexer_kafka=info,advert_indexer_repository=info",
        )
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "advert-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "advert-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

/// Wait for Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() -> Result<(), IndexerError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())
            .map_err(|e| IndexerError::config(format!("Failed to install SIGTERM handler: {}", e)))?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| IndexerError::config(format!("Failed to listen for Ctrl-C: {}", e)))?;
                info!("Received SIGINT");
            }
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| IndexerError::config(format!("Failed to listen for Ctrl-C: {}", e)))?;
        info!("Received shutdown signal");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexerError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    info!("Starting Advert Indexer");

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return Err(e);
        }
    };

    let metrics = server::setup_metrics_recorder()?;
    let health = Arc::new(Health::default());
    let listener = TcpListener::bind(&settings.server.bind)
        .await
        .map_err(|e| IndexerError::server(format!("Failed to bind {}: {}", settings.server.bind, e)))?;
    let server_shutdown = CancellationToken::new();
    let http = tokio::spawn(server::serve(
        listener,
        server::router(health.clone(), metrics),
        server_shutdown.clone(),
    ));

    let deps = match Dependencies::new(settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            server_shutdown.cancel();
            return Err(e);
        }
    };
    health.set_ready(true);

    let signal = shutdown_signal().await;

    health.set_ready(false);
    deps.shutdown().await;
    server_shutdown.cancel();
    match http.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "HTTP server failed"),
        Err(e) => warn!(error = %e, "HTTP server task failed"),
    }
    info!("Advert indexer stopped");
    signal
}
