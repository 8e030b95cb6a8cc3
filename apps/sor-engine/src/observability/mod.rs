//! Observability: metrics exporter and tracing bootstrap.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{MetricsConfig, MetricsError, init_metrics};
pub use tracing_setup::init_tracing;
