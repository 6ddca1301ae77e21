//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use widget_bridge_core::telemetry::LogLevel;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))
}

/// Record a store request by outcome: `stored`, `rejected` or `failed`.
pub fn record_store(outcome: &'static str) {
    metrics::counter!("widget_store_total", "outcome" => outcome).increment(1);
}

/// Record a render response by HTTP status.
pub fn record_render(status: u16) {
    let labels = [("status", status.to_string())];
    metrics::counter!("widget_render_total", &labels).increment(1);
}

/// Record a telemetry event received from a frame.
pub fn record_log_event(level: LogLevel) {
    let level = match level {
        LogLevel::Log => "log",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };
    metrics::counter!("widget_log_events_total", "level" => level).increment(1);
}
