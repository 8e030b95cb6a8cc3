//! Prometheus metrics for the routing kernel.
//!
//! Provides the exporter bootstrap plus thin recording helpers used by the
//! tracker, the guard pipeline and the facade. Recording is a no-op until
//! [`init_metrics`] installs the global recorder, which keeps unit tests
//! free of exporter state.
//!
//! # Example
//!
//! ```ignore
//! use sor_engine::observability::{MetricsConfig, init_metrics};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("Failed to initialize metrics");
//! ```

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::orders::state::OrderState;
use crate::router::timeout::TimeoutKind;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for latency measurements (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".parse().unwrap_or_else(|_| {
                SocketAddr::from(([0, 0, 0, 0], 9090))
            }),
            // Latency buckets from 100us to 1s
            latency_buckets: vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ],
        }
    }
}

/// Errors from metrics initialization.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Invalid exporter configuration.
    #[error("Metrics configuration error: {0}")]
    Configuration(String),

    /// Failed to install the exporter.
    #[error("Metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP server exposing metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g. port in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );
    Ok(())
}

/// Update the live tracked-orders gauge.
pub fn set_tracked_orders(count: usize) {
    gauge!("orders_tracked").set(count as f64);
}

/// Count a finalized order by terminal state.
pub fn record_finalized(state: OrderState) {
    counter!("orders_finalized_total", "state" => state.metric_label()).increment(1);
}

/// Count an accepted submission.
pub fn record_order_submitted(venue: &str) {
    counter!("orders_submitted_total", "venue" => venue.to_string()).increment(1);
}

/// Count a guard block by reason and optional detail.
pub fn record_guard_block(reason: &str, detail: Option<&str>) {
    counter!(
        "router_guard_blocks_total",
        "reason" => reason.to_string(),
        "detail" => detail.unwrap_or("").to_string()
    )
    .increment(1);
}

/// Count a processed lifecycle event.
pub fn record_order_event(event: &str) {
    counter!("order_events_total", "event" => event.to_string()).increment(1);
}

/// Count a scheduler-driven expiry.
pub fn record_order_timeout(kind: TimeoutKind) {
    counter!("orders_timeout_total", "kind" => kind.as_str()).increment(1);
}

/// Count an outbox replay candidate handed back to the send path.
pub fn record_outbox_replay() {
    counter!("outbox_replayed_total").increment(1);
}

/// Export the current daily realized loss for a scope.
pub fn set_daily_loss(scope: &str, loss_usd: f64) {
    gauge!("pnl_daily_loss_usd", "scope" => scope.to_string()).set(loss_usd);
}

/// Count a PnL-cap block by detail and strategy.
pub fn record_pnl_cap_block(detail: &str, strategy: &str) {
    counter!(
        "pnl_cap_blocks_total",
        "detail" => detail.to_string(),
        "strategy" => strategy.to_string()
    )
    .increment(1);
}
