//! Readiness signal aggregation.
//!
//! Subsystems (market data, reconciliation, ...) report health beats; the
//! guard requires every configured signal to be present, healthy and
//! fresh within the TTL.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{BlockReason, GuardDecision};

#[derive(Debug, Clone, Copy)]
struct Signal {
    healthy: bool,
    ts: f64,
}

/// Aggregate named readiness signals with freshness tracking.
#[derive(Debug)]
pub struct ReadinessAggregator {
    required: Vec<String>,
    ttl_seconds: f64,
    signals: RwLock<HashMap<String, Signal>>,
}

impl ReadinessAggregator {
    /// Create an aggregator for the required signal names.
    #[must_use]
    pub fn new(required: Vec<String>, ttl_seconds: f64) -> Self {
        Self {
            required,
            ttl_seconds,
            signals: RwLock::new(HashMap::new()),
        }
    }

    /// Record a signal observation.
    pub fn record(&self, name: &str, healthy: bool, now: f64) {
        if let Ok(mut signals) = self.signals.write() {
            signals.insert(name.to_string(), Signal { healthy, ts: now });
        }
    }

    /// Names configured as required.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Check every required signal; the detail enumerates offenders as
    /// `name:missing`, `name:unhealthy` or `name:stale`.
    #[must_use]
    pub fn check(&self, now: f64) -> GuardDecision {
        let signals = match self.signals.read() {
            Ok(signals) => signals,
            Err(_) => return GuardDecision::block(BlockReason::ReadinessAgg),
        };
        let mut offenders = Vec::new();
        for name in &self.required {
            match signals.get(name) {
                None => offenders.push(format!("{name}:missing")),
                Some(signal) if !signal.healthy => offenders.push(format!("{name}:unhealthy")),
                Some(signal)
                    if self.ttl_seconds > 0.0 && now - signal.ts > self.ttl_seconds =>
                {
                    offenders.push(format!("{name}:stale"));
                }
                Some(_) => {}
            }
        }
        if offenders.is_empty() {
            GuardDecision::Allow
        } else {
            GuardDecision::block_with(BlockReason::ReadinessAgg, offenders.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> ReadinessAggregator {
        ReadinessAggregator::new(vec!["market".into(), "recon".into()], 10.0)
    }

    #[test]
    fn missing_signals_block_with_detail() {
        let agg = aggregator();
        agg.record("market", true, 100.0);
        let decision = agg.check(100.0);
        assert_eq!(
            decision,
            GuardDecision::block_with(BlockReason::ReadinessAgg, "recon:missing")
        );
    }

    #[test]
    fn unhealthy_and_stale_signals_block() {
        let agg = aggregator();
        agg.record("market", false, 100.0);
        agg.record("recon", true, 50.0);
        let GuardDecision::Block { detail, .. } = agg.check(100.0) else {
            panic!("expected block");
        };
        let detail = detail.unwrap_or_default();
        assert!(detail.contains("market:unhealthy"));
        assert!(detail.contains("recon:stale"));
    }

    #[test]
    fn fresh_healthy_signals_pass() {
        let agg = aggregator();
        agg.record("market", true, 100.0);
        agg.record("recon", true, 95.0);
        assert!(agg.check(100.0).is_allow());
    }
}
