//! Configuration for the Traffic Server exporter.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exporter::ScrapeTarget;
use crate::metric::is_valid_metric_name;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Metrics endpoint settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Upstream Traffic Server settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Address to listen on (default: ":8110").
    ///
    /// A missing host (`:8110`) listens on all interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    ":8110".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl TelemetryConfig {
    /// Resolve the listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        normalize_listen_address(&self.listen)
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", self.listen)))
    }
}

/// Expand a host-less `:port` address to `0.0.0.0:port`.
pub fn normalize_listen_address(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    }
}

/// Upstream scrape configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// URI of the Traffic Server billing page.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Metric name prefix (default: "Trafficserver").
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_uri() -> String {
    "http://localhost/_billing".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_namespace() -> String {
    "Trafficserver".to_string()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            insecure: false,
            timeout_secs: default_timeout(),
            namespace: default_namespace(),
        }
    }
}

impl ScrapeConfig {
    /// Build the scrape target.
    pub fn target(&self) -> ScrapeTarget {
        ScrapeTarget {
            uri: self.uri.clone(),
            insecure: self.insecure,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON5 file without validating it.
    ///
    /// For callers that still apply overrides before validation.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(json5::from_str(&content)?)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.telemetry.listen_addr()?;

        if !self.telemetry.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        // The path is matched literally, never as a route pattern
        if self
            .telemetry
            .path
            .contains(|c: char| matches!(c, ':' | '*' | '{' | '}' | '?' | '#'))
        {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} contains reserved characters",
                self.telemetry.path
            )));
        }

        // Reserved for the landing page and health check
        if self.telemetry.path == "/" || self.telemetry.path == "/health" {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.telemetry.path
            )));
        }

        match reqwest::Url::parse(&self.scrape.uri) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Invalid scrape URI: {}",
                    self.scrape.uri
                )));
            }
        }

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if !self.scrape.namespace.is_empty() && !is_valid_metric_name(&self.scrape.namespace) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric namespace: {}",
                self.scrape.namespace
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.telemetry.listen, ":8110");
        assert_eq!(config.telemetry.path, "/metrics");
        assert_eq!(config.scrape.uri, "http://localhost/_billing");
        assert!(!config.scrape.insecure);
        assert_eq!(config.scrape.timeout_secs, 10);
        assert_eq!(config.scrape.namespace, "Trafficserver");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            telemetry: {
                listen: "127.0.0.1:9122",
                path: "/ts/metrics",
            },
            scrape: {
                uri: "https://cache01.example.com/_billing",
                insecure: true,
                timeout_secs: 3,
                namespace: "ats",
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.telemetry.listen, "127.0.0.1:9122");
        assert_eq!(config.telemetry.path, "/ts/metrics");
        assert_eq!(config.scrape.uri, "https://cache01.example.com/_billing");
        assert!(config.scrape.insecure);
        assert_eq!(config.scrape.namespace, "ats");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        let target = config.scrape.target();
        assert!(target.insecure);
        assert_eq!(target.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ scrape: {{ uri: "http://10.0.0.5/_billing" }} }}"#).unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.scrape.uri, "http://10.0.0.5/_billing");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/exporter.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_listen_addr_hostless() {
        let config = TelemetryConfig::default();
        assert_eq!(
            config.listen_addr().unwrap(),
            "0.0.0.0:8110".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(normalize_listen_address("[::1]:8110"), "[::1]:8110");
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ExporterConfig::parse(r#"{ telemetry: { listen: "not-an-address" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let result = ExporterConfig::parse(r#"{ telemetry: { path: "no-leading-slash" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_reserved_path() {
        assert!(ExporterConfig::parse(r#"{ telemetry: { path: "/" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ telemetry: { path: "/health" } }"#).is_err());
    }

    #[test]
    fn test_validate_route_syntax_in_path() {
        for path in ["/a/*b/c", "/*stats", "/metrics/:x", "/metrics/{x}", "/metrics?x"] {
            let json = format!(r#"{{ telemetry: {{ path: "{}" }} }}"#, path);
            let err = ExporterConfig::parse(&json).unwrap_err();
            assert!(
                err.to_string().contains("reserved characters"),
                "{}: {}",
                path,
                err
            );
        }

        assert!(ExporterConfig::parse(r#"{ telemetry: { path: "/ts-stats/v1_metrics" } }"#).is_ok());
    }

    #[test]
    fn test_read_from_file_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ telemetry: {{ path: "metrics" }} }}"#).unwrap();

        let config = ExporterConfig::read_from_file(file.path()).unwrap();
        assert_eq!(config.telemetry.path, "metrics");
        assert!(ExporterConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_validate_invalid_uri() {
        assert!(ExporterConfig::parse(r#"{ scrape: { uri: "localhost/_billing" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ scrape: { uri: "ftp://localhost/_billing" } }"#).is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        assert!(ExporterConfig::parse(r#"{ scrape: { timeout_secs: 0 } }"#).is_err());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(ExporterConfig::parse(r#"{ scrape: { namespace: "traffic-server" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ scrape: { namespace: "" } }"#).is_ok());
    }
}
