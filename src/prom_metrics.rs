//! # Prometheus Metrics
//!
//! Service metrics in the Prometheus text exposition format, rendered on
//! each scrape of `GET /metrics`.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `arenadesk_http_request_duration_seconds` | Histogram | `method`, `route`, `status` | Request latency |
//! | `arenadesk_job_runs_total` | Counter | `job`, `outcome` | Scheduled job runs |
//! | `arenadesk_payments_expired_total` | Counter | — | Payments moved to `expired` by the sweep |
//! | `arenadesk_brackets_generated_total` | Counter | — | Brackets provisioned at the provider |
//! | `arenadesk_bracket_failures_total` | Counter | — | Tournaments whose provisioning failed |

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    /// Matched route template, not the raw path, to bound cardinality.
    pub route: String,
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct JobLabels {
    pub job: String,
    pub outcome: String,
}

/// How a scheduled job run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
    /// Another holder had the lease.
    Skipped,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
            JobOutcome::Skipped => "skipped",
        }
    }
}

type HistogramFamily = Family<HttpLabels, Histogram, fn() -> Histogram>;

fn request_histogram() -> Histogram {
    // 5ms .. ~10s
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

pub struct Metrics {
    pub registry: Registry,
    pub http_request_duration: HistogramFamily,
    pub job_runs: Family<JobLabels, Counter>,
    pub payments_expired: Counter,
    pub brackets_generated: Counter,
    pub bracket_failures: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_request_duration = HistogramFamily::new_with_constructor(request_histogram);
        registry.register(
            "arenadesk_http_request_duration_seconds",
            "HTTP request latency by route and status",
            http_request_duration.clone(),
        );

        let job_runs = Family::<JobLabels, Counter>::default();
        registry.register(
            "arenadesk_job_runs",
            "Scheduled job runs by job and outcome",
            job_runs.clone(),
        );

        let payments_expired = Counter::default();
        registry.register(
            "arenadesk_payments_expired",
            "Payments expired by the stale-payment sweep",
            payments_expired.clone(),
        );

        let brackets_generated = Counter::default();
        registry.register(
            "arenadesk_brackets_generated",
            "Tournament brackets provisioned at the bracket provider",
            brackets_generated.clone(),
        );

        let bracket_failures = Counter::default();
        registry.register(
            "arenadesk_bracket_failures",
            "Tournaments whose bracket provisioning failed",
            bracket_failures.clone(),
        );

        Self {
            registry,
            http_request_duration,
            job_runs,
            payments_expired,
            brackets_generated,
            bracket_failures,
        }
    }

    pub fn observe_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        self.http_request_duration
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                route: route.to_string(),
                status: status.to_string(),
            })
            .observe(seconds);
    }

    pub fn record_job(&self, job: &str, outcome: JobOutcome) {
        self.job_runs
            .get_or_create(&JobLabels {
                job: job.to_string(),
                outcome: outcome.as_str().to_string(),
            })
            .inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
