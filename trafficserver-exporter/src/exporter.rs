//! Traffic Server exporter: one scrape of the `/_billing` page per collection.

use std::time::Duration;

use async_trait::async_trait;
use prometheus_client::metrics::counter::Counter;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{ExporterError, ScrapeError};
use crate::metric::{MetricDesc, MetricKind, MetricSample, build_metric_name};
use crate::registry::Collector;
use crate::traffic::{TRAFFIC_FIELDS, TrafficSnapshot};

const UP_HELP: &str = "Could the traffic server be reached";
const SCRAPE_FAILURES_HELP: &str = "Number of errors while scraping the traffic server.";

/// Where and how to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    /// Full URI of the status page.
    pub uri: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Request timeout; expiry counts as a transport error.
    pub timeout: Duration,
}

/// Scrapes a Traffic Server and turns the payload into metric samples.
///
/// Collections are serialized: at most one request to the target is in flight.
pub struct Exporter {
    target: ScrapeTarget,
    client: reqwest::Client,
    scrape_lock: Mutex<()>,
    scrape_failures: Counter,
    up: MetricDesc,
    failures: MetricDesc,
    fields: Vec<MetricDesc>,
}

impl Exporter {
    /// Create an exporter for the given target, prefixing all metrics with `namespace`.
    pub fn new(target: ScrapeTarget, namespace: &str) -> Result<Self, ExporterError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(target.insecure)
            .timeout(target.timeout)
            .build()?;

        let fields = TRAFFIC_FIELDS
            .iter()
            .map(|f| MetricDesc::new(build_metric_name(namespace, f.name), f.kind, f.help))
            .collect();

        Ok(Self {
            target,
            client,
            scrape_lock: Mutex::new(()),
            scrape_failures: Counter::default(),
            up: MetricDesc::new(
                build_metric_name(namespace, "up"),
                MetricKind::Gauge,
                UP_HELP,
            ),
            failures: MetricDesc::new(
                build_metric_name(namespace, "exporter_scrape_failures_total"),
                MetricKind::Counter,
                SCRAPE_FAILURES_HELP,
            ),
            fields,
        })
    }

    /// The configured target.
    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    /// Total failed scrapes since construction.
    pub fn scrape_failures(&self) -> u64 {
        self.scrape_failures.get()
    }

    /// Descriptors for every metric this exporter can emit.
    pub fn describe(&self) -> Vec<MetricDesc> {
        let mut descs = Vec::with_capacity(self.fields.len() + 2);
        descs.push(self.up.clone());
        descs.push(self.failures.clone());
        descs.extend(self.fields.iter().cloned());
        descs
    }

    /// Scrape the target once and return the resulting samples.
    ///
    /// Never fails: scrape errors are logged, counted, and reflected in `up`.
    /// The failure counter is always the last sample.
    pub async fn collect(&self) -> Vec<MetricSample> {
        let _guard = self.scrape_lock.lock().await;

        let mut samples = Vec::with_capacity(self.fields.len() + 2);
        match self.scrape(&mut samples).await {
            Ok(()) => {
                debug!(uri = %self.target.uri, samples = samples.len(), "Scrape succeeded");
            }
            Err(e) => {
                self.scrape_failures.inc();
                error!(
                    uri = %self.target.uri,
                    kind = e.kind(),
                    error = %e,
                    "Scrape failed"
                );
            }
        }

        samples.push(self.failures.sample(self.scrape_failures.get() as f64));
        samples
    }

    async fn scrape(&self, samples: &mut Vec<MetricSample>) -> Result<(), ScrapeError> {
        let response = match self.client.get(&self.target.uri).send().await {
            Ok(response) => response,
            Err(e) => {
                samples.push(self.up.sample(0.0));
                return Err(ScrapeError::Transport(e));
            }
        };
        samples.push(self.up.sample(1.0));

        let status = response.status();
        let body = response.text().await;

        if status != StatusCode::OK {
            let body = match body {
                Ok(text) => text,
                Err(e) => e.to_string(),
            };
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = body.map_err(ScrapeError::Body)?;
        let snapshot = TrafficSnapshot::decode(&body)?;

        samples.extend(
            TRAFFIC_FIELDS
                .iter()
                .zip(&self.fields)
                .map(|(field, desc)| desc.sample((field.value)(&snapshot))),
        );
        Ok(())
    }
}

#[async_trait]
impl Collector for Exporter {
    fn describe(&self) -> Vec<MetricDesc> {
        Exporter::describe(self)
    }

    async fn collect(&self) -> Vec<MetricSample> {
        Exporter::collect(self).await
    }
}
