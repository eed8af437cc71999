//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ExporterConfig};

/// Prometheus exporter for Apache Traffic Server.
#[derive(Parser, Debug)]
#[command(name = "trafficserver-exporter")]
#[command(about = "Export Traffic Server billing statistics as Prometheus metrics")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address on which to expose metrics [default: :8110].
    #[arg(long = "telemetry.address")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics [default: /metrics].
    #[arg(long = "telemetry.endpoint")]
    pub metrics_endpoint: Option<String>,

    /// URI of the Traffic Server billing page [default: http://localhost/_billing].
    #[arg(long = "scrape_uri")]
    pub scrape_uri: Option<String>,

    /// Ignore server certificate if using https.
    #[arg(long)]
    pub insecure: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Load the configuration file (or defaults) and apply CLI overrides.
    pub fn load_config(&self) -> Result<ExporterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::read_from_file(path)?,
            None => ExporterConfig::default(),
        };

        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override configuration values with the ones given on the command line.
    pub fn apply(&self, config: &mut ExporterConfig) {
        if let Some(listen) = &self.listen_address {
            config.telemetry.listen = listen.clone();
        }
        if let Some(path) = &self.metrics_endpoint {
            config.telemetry.path = path.clone();
        }
        if let Some(uri) = &self.scrape_uri {
            config.scrape.uri = uri.clone();
        }
        if self.insecure {
            config.scrape.insecure = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
