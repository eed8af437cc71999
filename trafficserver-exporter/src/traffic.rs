//! The Traffic Server `/_billing` payload and its metric mapping.
//!
//! The status page returns a single JSON object:
//!
//! ```json
//! {"traffic": {"ccons": 4304, "cobj": 33013850, "cpu": 14.47, "cused": 29.07,
//!              "hit": 280225, "load": "1.14,1.40,1.90", "mem": 72.03,
//!              "reqs": 307648, "rpc": 1.88, "rx": 806138577, "time": 1540284300,
//!              "tpr": 80.37, "tx": 17016624097, "uptime": 708202}}
//! ```
//!
//! Every field is required. `load`, `rpc` and `time` are decoded but not exported.

use serde::Deserialize;

use crate::metric::MetricKind;

/// Decoded contents of the `traffic` object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrafficSnapshot {
    /// Current connections.
    pub ccons: i64,
    /// Closed objects.
    pub cobj: i64,
    /// System CPU percent.
    pub cpu: f64,
    /// Traffic Server CPU percent.
    pub cused: f64,
    pub hit: i64,
    /// Load averages, unparsed.
    pub load: String,
    /// Memory percent.
    pub mem: f64,
    pub reqs: i64,
    pub rpc: f64,
    /// Received bytes.
    pub rx: i64,
    /// Server timestamp (unix seconds).
    pub time: i64,
    pub tpr: f64,
    /// Transmitted bytes.
    pub tx: i64,
    /// Uptime in seconds.
    pub uptime: i64,
}

#[derive(Debug, Deserialize)]
struct BillingResponse {
    traffic: TrafficSnapshot,
}

impl TrafficSnapshot {
    /// Decode a `/_billing` response body.
    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        let response: BillingResponse = serde_json::from_str(body)?;
        Ok(response.traffic)
    }
}

/// An exported snapshot field.
pub struct TrafficField {
    /// Metric name without namespace.
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
    pub value: fn(&TrafficSnapshot) -> f64,
}

/// Snapshot fields exported as metrics, in emission order.
///
/// `tpr` and `uptime` are exposed as counters to match existing dashboards.
pub const TRAFFIC_FIELDS: &[TrafficField] = &[
    TrafficField {
        name: "ccons",
        kind: MetricKind::Gauge,
        help: "The current connecting requests.",
        value: |s| s.ccons as f64,
    },
    TrafficField {
        name: "cobj",
        kind: MetricKind::Counter,
        help: "Number of traffic server close objects.",
        value: |s| s.cobj as f64,
    },
    TrafficField {
        name: "cpu",
        kind: MetricKind::Gauge,
        help: "The current percentage CPU used in system.",
        value: |s| s.cpu,
    },
    TrafficField {
        name: "cused",
        kind: MetricKind::Gauge,
        help: "The current percentage traffic server used cpu.",
        value: |s| s.cused,
    },
    TrafficField {
        name: "hit",
        kind: MetricKind::Counter,
        help: "The total hit request in 5 minutes.",
        value: |s| s.hit as f64,
    },
    TrafficField {
        name: "mem",
        kind: MetricKind::Gauge,
        help: "The current percentage traffic server used memory.",
        value: |s| s.mem,
    },
    TrafficField {
        name: "reqs",
        kind: MetricKind::Counter,
        help: "The total request in 5 minutes.",
        value: |s| s.reqs as f64,
    },
    TrafficField {
        name: "rx",
        kind: MetricKind::Counter,
        help: "The total receive bytes in 5 minutes.",
        value: |s| s.rx as f64,
    },
    TrafficField {
        name: "tx",
        kind: MetricKind::Counter,
        help: "The total transmit bytes in 5 minutes.",
        value: |s| s.tx as f64,
    },
    TrafficField {
        name: "tpr",
        kind: MetricKind::Counter,
        help: "Unknown.",
        value: |s| s.tpr,
    },
    TrafficField {
        name: "uptime",
        kind: MetricKind::Counter,
        help: "Current uptime in seconds.",
        value: |s| s.uptime as f64,
    },
];
