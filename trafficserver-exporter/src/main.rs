//! Prometheus exporter for Apache Traffic Server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use trafficserver_exporter::cli::Args;
use trafficserver_exporter::{Exporter, HttpServer, Registry, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Traffic Server exporter"
    );

    let listen_addr = config.telemetry.listen_addr()?;

    let exporter = Arc::new(Exporter::new(
        config.scrape.target(),
        &config.scrape.namespace,
    )?);
    info!(
        uri = %config.scrape.uri,
        insecure = config.scrape.insecure,
        "Scraping traffic server"
    );

    let mut registry = Registry::new();
    registry.register(exporter.clone())?;
    let registry = Arc::new(registry);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(registry, listen_addr, config.telemetry.path.clone());
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    tokio::select! {
        result = &mut http_task => {
            // The server only returns on its own when it failed to start
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(e.into()),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    if tokio::time::timeout(Duration::from_secs(5), http_task)
        .await
        .is_err()
    {
        warn!("HTTP server did not stop within 5s");
    }

    info!(
        scrape_failures = exporter.scrape_failures(),
        "Exporter stopped"
    );
    Ok(())
}

async fn sigterm() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
