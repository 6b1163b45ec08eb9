//! Telemetry initialization: structured logging and metrics

pub mod metrics;

use crate::config::{LogFormat, TelemetryConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "rlsgate_core=info,tower_http=info";

/// Install the tracing subscriber and, when enabled, the Prometheus recorder.
///
/// Returns the handle backing `GET /metrics`. A recorder that cannot be
/// installed is logged and metrics stay off.
pub fn init(config: &TelemetryConfig) -> Option<PrometheusHandle> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            // Flattened so `message` sits at the top level of each line
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true);
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if !config.metrics_enabled {
        return None;
    }

    match metrics::install_prometheus_recorder() {
        Ok(handle) => {
            metrics::describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::error!(error = %e, "Metrics disabled");
            None
        }
    }
}
