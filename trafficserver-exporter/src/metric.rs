//! Metric descriptors and samples exchanged between collectors and the registry.

/// Prometheus metric type of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Static description of a metric a collector can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    /// Fully qualified metric name (namespace included).
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
}

impl MetricDesc {
    pub fn new(name: impl Into<String>, kind: MetricKind, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            help: help.into(),
        }
    }

    /// Create a sample for this descriptor.
    pub fn sample(&self, value: f64) -> MetricSample {
        MetricSample {
            name: self.name.clone(),
            kind: self.kind,
            value,
            help: self.help.clone(),
        }
    }
}

/// A single named metric value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub help: String,
}

/// Build a fully qualified metric name.
///
/// Format: `{namespace}_{name}`, or just `name` when the namespace is empty.
pub fn build_metric_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

/// Check whether a name is a valid Prometheus metric name.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
