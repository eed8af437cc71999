//! Metric registry and Prometheus text exposition.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};

use crate::metric::{MetricDesc, MetricSample, is_valid_metric_name};

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid metric name: {0}")]
    InvalidName(String),
    #[error("Duplicate metric name: {0}")]
    Duplicate(String),
}

/// A source of metric samples.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Every metric this collector can emit, independent of collection outcome.
    fn describe(&self) -> Vec<MetricDesc>;

    /// Produce the current samples.
    async fn collect(&self) -> Vec<MetricSample>;
}

/// Explicit registry of collectors.
#[derive(Default)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
    names: HashSet<String>,
}

/// Shareable registry handle.
pub type SharedRegistry = Arc<Registry>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector.
    ///
    /// All described names must be valid and unused; on error nothing is registered.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<(), RegistryError> {
        let descs = collector.describe();
        let mut incoming = HashSet::with_capacity(descs.len());

        for desc in &descs {
            if !is_valid_metric_name(&desc.name) {
                return Err(RegistryError::InvalidName(desc.name.clone()));
            }
            if self.names.contains(&desc.name) || !incoming.insert(desc.name.clone()) {
                return Err(RegistryError::Duplicate(desc.name.clone()));
            }
        }

        debug!(metrics = descs.len(), "Registered collector");
        self.names.extend(incoming);
        self.collectors.push(collector);
        Ok(())
    }

    /// Number of registered collectors.
    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Collect from every registered collector, in registration order.
    pub async fn gather(&self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        for collector in &self.collectors {
            samples.extend(collector.collect().await);
        }
        trace!(samples = samples.len(), "Gathered metrics");
        samples
    }

    /// Gather and render in Prometheus exposition format.
    pub async fn render(&self) -> String {
        encode_text(&self.gather().await)
    }
}

/// Render samples in Prometheus text exposition format.
///
/// `# HELP` and `# TYPE` are written once per metric name, at its first occurrence.
pub fn encode_text(samples: &[MetricSample]) -> String {
    let mut output = Vec::with_capacity(samples.len() * 100);
    let mut seen: HashSet<&str> = HashSet::with_capacity(samples.len());

    for sample in samples {
        if seen.insert(&sample.name) {
            writeln!(
                output,
                "# HELP {} {}",
                sample.name,
                escape_help(&sample.help)
            )
            .ok();
            writeln!(output, "# TYPE {} {}", sample.name, sample.kind.as_str()).ok();
        }
        writeln!(output, "{} {}", sample.name, format_value(sample.value)).ok();
    }

    String::from_utf8(output).unwrap_or_default()
}

/// Escape special characters in help text.
fn escape_help(help: &str) -> String {
    let mut result = String::with_capacity(help.len());
    for c in help.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricKind;

    struct StaticCollector {
        descs: Vec<MetricDesc>,
    }

    impl StaticCollector {
        fn new(names: &[&str]) -> Arc<Self> {
            let descs = names
                .iter()
                .map(|n| MetricDesc::new(*n, MetricKind::Gauge, "Test metric."))
                .collect();
            Arc::new(Self { descs })
        }
    }

    #[async_trait]
    impl Collector for StaticCollector {
        fn describe(&self) -> Vec<MetricDesc> {
            self.descs.clone()
        }

        async fn collect(&self) -> Vec<MetricSample> {
            self.descs
                .iter()
                .enumerate()
                .map(|(i, d)| d.sample(i as f64))
                .collect()
        }
    }

    #[test]
    fn test_register_rejects_duplicates_across_collectors() {
        let mut registry = Registry::new();
        registry.register(StaticCollector::new(&["a_up", "a_cpu"])).unwrap();

        let err = registry
            .register(StaticCollector::new(&["b_up", "a_cpu"]))
            .unwrap_err();

        assert_eq!(err, RegistryError::Duplicate("a_cpu".to_string()));
        assert_eq!(registry.collector_count(), 1);

        // Rejected collector left no names behind
        registry.register(StaticCollector::new(&["b_up"])).unwrap();
        assert_eq!(registry.collector_count(), 2);
    }

    #[test]
    fn test_register_rejects_duplicates_within_collector() {
        let mut registry = Registry::new();
        let err = registry
            .register(StaticCollector::new(&["x", "x"]))
            .unwrap_err();

        assert_eq!(err, RegistryError::Duplicate("x".to_string()));
        assert_eq!(registry.collector_count(), 0);
    }

    #[test]
    fn test_register_rejects_invalid_name() {
        let mut registry = Registry::new();
        let err = registry
            .register(StaticCollector::new(&["traffic-server_up"]))
            .unwrap_err();

        assert!(matches!(err, RegistryError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_gather_in_registration_order() {
        let mut registry = Registry::new();
        registry.register(StaticCollector::new(&["first"])).unwrap();
        registry
            .register(StaticCollector::new(&["second", "third"]))
            .unwrap();

        let names: Vec<_> = registry
            .gather()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_render_empty_registry() {
        let registry = Registry::new();
        assert_eq!(registry.render().await, "");
    }

    #[test]
    fn test_encode_text() {
        let samples = vec![
            MetricDesc::new("ts_up", MetricKind::Gauge, "Could the traffic server be reached")
                .sample(1.0),
            MetricDesc::new("ts_rx", MetricKind::Counter, "Received bytes.").sample(806138577.0),
        ];

        let output = encode_text(&samples);

        assert_eq!(
            output,
            "# HELP ts_up Could the traffic server be reached\n\
             # TYPE ts_up gauge\n\
             ts_up 1\n\
             # HELP ts_rx Received bytes.\n\
             # TYPE ts_rx counter\n\
             ts_rx 806138577\n"
        );
    }

    #[test]
    fn test_encode_text_header_once_per_name() {
        let desc = MetricDesc::new("ts_up", MetricKind::Gauge, "Up.");
        let output = encode_text(&[desc.sample(0.0), desc.sample(1.0)]);

        assert_eq!(output.matches("# TYPE ts_up").count(), 1);
        assert_eq!(output.lines().filter(|l| l.starts_with("ts_up ")).count(), 2);
    }

    #[test]
    fn test_escape_help() {
        assert_eq!(escape_help("simple"), "simple");
        assert_eq!(escape_help("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_help("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(14.47), "14.47");
        assert_eq!(format_value(17016624097.0), "17016624097");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
