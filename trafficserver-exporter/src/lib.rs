//! Prometheus exporter for Apache Traffic Server.
//!
//! Each request to the metrics endpoint scrapes the Traffic Server `/_billing`
//! JSON page once, decodes it, and renders the values in Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Traffic Server  │<────│    Exporter     │<────│   HTTP Server   │
//! │  (/_billing)    │     │ (scrape+decode) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Concurrent metrics requests are serialized by the exporter, so the Traffic
//! Server never sees more than one scrape at a time.
//!
//! # Usage
//!
//! ```bash
//! trafficserver-exporter --scrape_uri http://cache01/_billing --telemetry.address :8110
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod http;
pub mod metric;
pub mod registry;
pub mod traffic;

pub use config::ExporterConfig;
pub use error::{ExporterError, ScrapeError};
pub use exporter::{Exporter, ScrapeTarget};
pub use http::HttpServer;
pub use registry::{Collector, Registry, SharedRegistry};
pub use traffic::TrafficSnapshot;

use config::{LogFormat, LoggingConfig};

/// Initialize tracing based on logging configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}
