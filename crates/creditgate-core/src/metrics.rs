//! Prometheus metrics for creditgate.
//!
//! - `creditgate_requests_total{service,outcome}` - Generation requests by terminal outcome
//! - `creditgate_units_committed_total{service}` - Units charged to quota
//! - `creditgate_model_attempts_total{model,result}` - Upstream model calls by result
//! - `creditgate_commit_failures_total{service}` - Commits lost after a successful generation
//! - `creditgate_generation_duration_seconds{service}` - Time spent in the fallback executor

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Image and long-form text generation: seconds, not milliseconds.
const GENERATION_LATENCY_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0];

/// Initialize Prometheus metrics recorder.
/// Must be called once at application startup before any metrics are recorded.
#[allow(clippy::expect_used, reason = "A missing recorder at startup is unrecoverable")]
pub fn init_metrics() -> PrometheusHandle {
    let handle = PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .set_buckets(GENERATION_LATENCY_BUCKETS)
            .expect("Failed to set histogram buckets")
            .install_recorder()
            .expect("Failed to install Prometheus metrics recorder");

        describe_counter!(
            "creditgate_requests_total",
            "Generation requests by service and terminal outcome"
        );
        describe_counter!("creditgate_units_committed_total", "Units charged to monthly quota");
        describe_counter!(
            "creditgate_model_attempts_total",
            "Upstream model invocations by model and result"
        );
        describe_counter!(
            "creditgate_commit_failures_total",
            "Quota commits that failed after a successful generation"
        );
        describe_histogram!(
            "creditgate_generation_duration_seconds",
            "Time spent walking the model fallback chain"
        );

        handle
    });

    handle.clone()
}

/// Get the Prometheus handle for rendering metrics.
/// Returns None if metrics have not been initialized.
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

pub fn record_request(service: &str, outcome: &str) {
    let labels = [("service", service.to_string()), ("outcome", outcome.to_string())];
    counter!("creditgate_requests_total", &labels).increment(1);
}

pub fn record_units_committed(service: &str, units: u32) {
    let labels = [("service", service.to_string())];
    counter!("creditgate_units_committed_total", &labels).increment(u64::from(units));
}

pub fn record_model_attempt(model: &str, result: &str) {
    let labels = [("model", model.to_string()), ("result", result.to_string())];
    counter!("creditgate_model_attempts_total", &labels).increment(1);
}

pub fn record_commit_failure(service: &str) {
    let labels = [("service", service.to_string())];
    counter!("creditgate_commit_failures_total", &labels).increment(1);
}

pub fn record_generation_duration(service: &str, elapsed: Duration) {
    let labels = [("service", service.to_string())];
    histogram!("creditgate_generation_duration_seconds", &labels).record(elapsed.as_secs_f64());
}
