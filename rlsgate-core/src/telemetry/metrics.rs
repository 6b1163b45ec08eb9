//! Prometheus recorder and metric descriptions

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Latency buckets in seconds. Most requests are a session exchange plus one
/// or two row lookups against the backend.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Install the global Prometheus recorder and return a handle for rendering
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)
        .context("Failed to set histogram buckets")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Register HELP/TYPE lines and seed the counters that only move on rare paths
pub fn describe_metrics() {
    describe_counter!("rlsgate_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "rlsgate_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "rlsgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "rlsgate_flag_evaluations_total",
        "Feature flag evaluations by flag and decision source"
    );
    describe_counter!(
        "rlsgate_table_decisions_total",
        "Per-table RLS decisions (filter or bypass)"
    );
    describe_gauge!(
        "rlsgate_kill_switch_active",
        "1 while the emergency kill switch is active"
    );
    describe_counter!(
        "rlsgate_authz_requests_total",
        "Route guard outcomes (allowed, denied, bypassed, mock, anonymous)"
    );
    describe_counter!(
        "rlsgate_org_cache_total",
        "Organization cache lookups (hit, miss, expired)"
    );
    describe_counter!(
        "rlsgate_rate_limit_throttled_total",
        "Requests rejected by the rate limiter"
    );

    counter!("rlsgate_authz_requests_total", "result" => "denied").absolute(0);
    counter!("rlsgate_rate_limit_throttled_total", "key" => "").absolute(0);
    counter!("rlsgate_org_cache_total", "result" => "expired").absolute(0);
    gauge!("rlsgate_http_requests_in_flight").set(0.0);
}
