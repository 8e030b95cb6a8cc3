//! Ack/fill timeout scheduling.
//!
//! The scan itself lives on the facade
//! ([`crate::router::SmartOrderRouter::scan_timeouts`]) so expiries settle
//! budgets and the outbox exactly like broker-delivered events. This
//! module provides the kind taxonomy and a tokio driver loop for hosts
//! that want the kernel to tick itself.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;

use crate::router::facade::SmartOrderRouter;

/// Which deadline expired an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No acknowledgement within `submit_ack_timeout_sec`.
    Ack,
    /// No fill progress within `fill_timeout_sec`.
    Fill,
}

impl TimeoutKind {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Fill => "fill",
        }
    }
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One expiry produced by a scheduler tick.
#[derive(Debug, Clone)]
pub struct TimeoutExpiry {
    /// Expired client order id.
    pub coid: String,
    /// Which deadline fired.
    pub kind: TimeoutKind,
}

/// Drive periodic timeout scans until shutdown.
///
/// Runs until `shutdown_rx` delivers; each tick calls
/// [`SmartOrderRouter::scan_timeouts`] with the router's clock. A small
/// random jitter decorrelates ticks across processes.
pub async fn run_timeout_scheduler(
    router: Arc<SmartOrderRouter>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    if !router.timeouts_enabled() {
        tracing::info!("timeout scheduler disabled, skipping");
        return;
    }
    let jitter = {
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(0u64..250))
    };
    let mut interval = tokio::time::interval(period + jitter);
    tracing::info!(period_ms = period.as_millis() as u64, "timeout scheduler started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let expired = router.scan_timeouts(None);
                if !expired.is_empty() {
                    tracing::warn!(count = expired.len(), "scheduler expired orders");
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("timeout scheduler stopping");
                return;
            }
        }
    }
}
