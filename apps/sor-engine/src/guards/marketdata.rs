//! Market-data freshness watchdog.
//!
//! Tracks the last tick per (venue, symbol) and a rolling window of
//! staleness samples per venue. The guard blocks when the last tick is
//! older than the TTL or the p95 staleness over the window exceeds the
//! configured limit; a p95 trip opens a venue-scoped recovery cooldown.
//!
//! Sampling cadence: one staleness sample is recorded per
//! [`MarketDataWatchdog::staleness_ms`] observation (per host poll or
//! per guarded submit) and the window holds the most recent
//! [`SAMPLE_WINDOW`] samples per venue.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use super::{BlockReason, GuardDecision};

/// Rolling staleness samples kept per venue.
pub const SAMPLE_WINDOW: usize = 64;

/// Detail token reported when the p95 gate (or its cooldown) trips.
pub const DETAIL_STALE_P95: &str = "md_stale_p95";

/// Watchdog over market data tick freshness.
#[derive(Debug)]
pub struct MarketDataWatchdog {
    ttl_seconds: f64,
    p95_limit_ms: f64,
    cooldown_seconds: f64,
    ticks: RwLock<HashMap<(String, String), f64>>,
    samples: RwLock<HashMap<String, VecDeque<f64>>>,
    cooldown_until: RwLock<HashMap<String, f64>>,
}

impl MarketDataWatchdog {
    /// Create a watchdog.
    ///
    /// `p95_limit_ms == 0` disables the p95 gate; tick TTL stays active.
    #[must_use]
    pub fn new(ttl_seconds: f64, p95_limit_ms: f64, cooldown_seconds: f64) -> Self {
        Self {
            ttl_seconds,
            p95_limit_ms,
            cooldown_seconds,
            ticks: RwLock::new(HashMap::new()),
            samples: RwLock::new(HashMap::new()),
            cooldown_until: RwLock::new(HashMap::new()),
        }
    }

    fn key(venue: &str, symbol: &str) -> (String, String) {
        (venue.to_ascii_lowercase(), symbol.to_ascii_uppercase())
    }

    /// Record a tick heartbeat for the pair.
    pub fn beat(&self, venue: &str, symbol: &str, ts: f64) {
        if let Ok(mut ticks) = self.ticks.write() {
            ticks.insert(Self::key(venue, symbol), ts);
        }
    }

    /// Whether the pair's last tick is older than the TTL.
    ///
    /// Unknown pairs are not considered stale: absence of data is the
    /// readiness aggregator's concern, not the watchdog's.
    #[must_use]
    pub fn is_stale(&self, venue: &str, symbol: &str, now: f64) -> bool {
        let last = self
            .ticks
            .read()
            .ok()
            .and_then(|ticks| ticks.get(&Self::key(venue, symbol)).copied());
        match last {
            Some(ts) => self.ttl_seconds > 0.0 && now - ts > self.ttl_seconds,
            None => false,
        }
    }

    /// Current staleness in milliseconds, recorded into the venue's
    /// rolling sample window.
    #[must_use]
    pub fn staleness_ms(&self, venue: &str, symbol: &str, now: f64) -> f64 {
        let last = self
            .ticks
            .read()
            .ok()
            .and_then(|ticks| ticks.get(&Self::key(venue, symbol)).copied());
        let staleness = last.map_or(0.0, |ts| ((now - ts) * 1_000.0).max(0.0));
        if let Ok(mut samples) = self.samples.write() {
            let window = samples.entry(venue.to_ascii_lowercase()).or_default();
            window.push_back(staleness);
            while window.len() > SAMPLE_WINDOW {
                window.pop_front();
            }
        }
        staleness
    }

    /// p95 staleness over the venue's rolling window, in milliseconds.
    #[must_use]
    pub fn p95(&self, venue: &str) -> f64 {
        let Ok(samples) = self.samples.read() else {
            return 0.0;
        };
        let Some(window) = samples.get(&venue.to_ascii_lowercase()) else {
            return 0.0;
        };
        if window.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = window.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }

    /// Whether the venue is inside its recovery cooldown.
    #[must_use]
    pub fn cooldown_active(&self, venue: &str, now: f64) -> bool {
        self.cooldown_until
            .read()
            .ok()
            .and_then(|map| map.get(&venue.to_ascii_lowercase()).copied())
            .is_some_and(|until| now < until)
    }

    /// Configured p95 limit in milliseconds.
    #[must_use]
    pub const fn p95_limit_ms(&self) -> f64 {
        self.p95_limit_ms
    }

    /// Configured recovery cooldown in seconds.
    #[must_use]
    pub const fn cooldown_seconds(&self) -> f64 {
        self.cooldown_seconds
    }

    /// Guard check for a submit against the pair.
    ///
    /// Records a staleness sample, then blocks on tick TTL, on an active
    /// recovery cooldown or on a p95 breach. A p95 breach (re)opens the
    /// venue cooldown.
    #[must_use]
    pub fn check(&self, venue: &str, symbol: &str, now: f64) -> GuardDecision {
        let _ = self.staleness_ms(venue, symbol, now);
        if self.p95_limit_ms > 0.0 {
            let p95 = self.p95(venue);
            if p95 > self.p95_limit_ms {
                if let Ok(mut cooldowns) = self.cooldown_until.write() {
                    cooldowns
                        .insert(venue.to_ascii_lowercase(), now + self.cooldown_seconds);
                }
                tracing::warn!(
                    venue,
                    symbol,
                    p95_ms = p95,
                    limit_ms = self.p95_limit_ms,
                    "market data p95 staleness gate tripped"
                );
                return GuardDecision::block_with(BlockReason::MarketdataStale, DETAIL_STALE_P95);
            }
            if self.cooldown_active(venue, now) {
                return GuardDecision::block_with(BlockReason::MarketdataStale, DETAIL_STALE_P95);
            }
        }
        if self.is_stale(venue, symbol, now) {
            return GuardDecision::block(BlockReason::MarketdataStale);
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog() -> MarketDataWatchdog {
        MarketDataWatchdog::new(5.0, 1_500.0, 10.0)
    }

    #[test]
    fn fresh_ticks_pass() {
        let dog = watchdog();
        dog.beat("binance", "BTCUSDT", 100.0);
        assert!(dog.check("binance", "BTCUSDT", 100.5).is_allow());
    }

    #[test]
    fn stale_tick_trips_p95_gate_and_cooldown() {
        let dog = watchdog();
        dog.beat("binance", "BTCUSDT", 90.0);
        let decision = dog.check("binance", "BTCUSDT", 100.0);
        assert_eq!(
            decision,
            GuardDecision::block_with(BlockReason::MarketdataStale, DETAIL_STALE_P95)
        );
        assert!(dog.cooldown_active("binance", 100.0));
    }

    #[test]
    fn recovery_requires_cooldown_and_fresh_p95() {
        let dog = watchdog();
        let mut now = 1_000.0;
        dog.beat("binance", "BTCUSDT", now - 10.0);
        assert!(!dog.check("binance", "BTCUSDT", now).is_allow());

        // Fresh beats push the p95 back under the limit while the
        // cooldown window is still open.
        for _ in 0..SAMPLE_WINDOW {
            now += 0.1;
            dog.beat("binance", "BTCUSDT", now);
            let _ = dog.staleness_ms("binance", "BTCUSDT", now);
        }
        assert!(dog.p95("binance") <= dog.p95_limit_ms());
        // Cooldown still pins the gate shut.
        assert!(dog.cooldown_active("binance", now));
        assert!(!dog.check("binance", "BTCUSDT", now).is_allow());

        now += dog.cooldown_seconds() + 1.0;
        dog.beat("binance", "BTCUSDT", now);
        assert!(!dog.cooldown_active("binance", now));
        assert!(dog.p95("binance") <= dog.p95_limit_ms());
        assert!(dog.check("binance", "BTCUSDT", now).is_allow());
    }

    #[test]
    fn unknown_pair_is_not_stale() {
        let dog = watchdog();
        assert!(!dog.is_stale("binance", "ETHUSDT", 100.0));
        assert!(dog.check("binance", "ETHUSDT", 100.0).is_allow());
    }

    #[test]
    fn p95_is_computed_over_the_window() {
        let dog = watchdog();
        dog.beat("okx", "BTCUSDT", 100.0);
        for offset in [0.1, 0.2, 0.3, 0.4, 5.0] {
            let _ = dog.staleness_ms("okx", "BTCUSDT", 100.0 + offset);
        }
        assert!(dog.p95("okx") >= 5_000.0);
    }
}
