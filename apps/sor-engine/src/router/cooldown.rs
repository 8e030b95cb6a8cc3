//! Reasoned cooldowns on (venue, symbol, strategy) triples.
//!
//! After an adverse broker event the host applies a cooldown; submissions
//! against the triple are blocked until it expires. The TTL comes from a
//! per-reason map with a configured fallback.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::config::CooldownConfig;

/// An active cooldown on a routing triple.
#[derive(Debug, Clone, Serialize)]
pub struct CooldownHit {
    /// Why the cooldown was applied.
    pub reason: String,
    /// Expiry, Unix seconds.
    pub expires_at: f64,
    /// Seconds remaining at check time.
    pub remaining: f64,
}

type TripleKey = (String, String, String);

/// Registry of active cooldowns.
#[derive(Debug)]
pub struct CooldownRegistry {
    enabled: bool,
    default_seconds: u64,
    reason_seconds: HashMap<String, u64>,
    entries: RwLock<HashMap<TripleKey, (f64, String)>>,
}

impl CooldownRegistry {
    /// Create a registry from configuration; `enabled` mirrors the
    /// cooldown feature flag.
    #[must_use]
    pub fn new(config: &CooldownConfig, enabled: bool) -> Self {
        Self {
            enabled,
            default_seconds: config.default_sec,
            reason_seconds: config.reason_map.clone(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(venue: &str, symbol: &str, strategy: &str) -> TripleKey {
        (
            venue.to_ascii_lowercase(),
            symbol.to_ascii_uppercase(),
            strategy.to_ascii_lowercase(),
        )
    }

    /// TTL for a reason, falling back to the default.
    #[must_use]
    pub fn ttl_for(&self, reason: &str) -> u64 {
        self.reason_seconds
            .get(reason)
            .copied()
            .unwrap_or(self.default_seconds)
    }

    /// Apply a cooldown for `reason`; returns the expiry timestamp.
    pub fn hit(&self, venue: &str, symbol: &str, strategy: &str, reason: &str, now: f64) -> f64 {
        let expires_at = now + self.ttl_for(reason) as f64;
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                Self::key(venue, symbol, strategy),
                (expires_at, reason.to_string()),
            );
        }
        tracing::info!(venue, symbol, strategy, reason, expires_at, "cooldown applied");
        expires_at
    }

    /// Apply a cooldown with an explicit TTL, bypassing the reason map.
    pub fn hit_for(
        &self,
        venue: &str,
        symbol: &str,
        strategy: &str,
        seconds: u64,
        reason: &str,
        now: f64,
    ) -> f64 {
        let expires_at = now + seconds as f64;
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                Self::key(venue, symbol, strategy),
                (expires_at, reason.to_string()),
            );
        }
        expires_at
    }

    /// Active cooldown for the triple, if any.
    ///
    /// Disabled registries always report no cooldown; expired entries are
    /// dropped on the way through.
    #[must_use]
    pub fn check(&self, venue: &str, symbol: &str, strategy: &str, now: f64) -> Option<CooldownHit> {
        if !self.enabled {
            return None;
        }
        let key = Self::key(venue, symbol, strategy);
        let current = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&key).cloned());
        let (expires_at, reason) = current?;
        if now >= expires_at {
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(&key);
            }
            return None;
        }
        Some(CooldownHit {
            reason,
            expires_at,
            remaining: expires_at - now,
        })
    }

    /// Drop every expired cooldown.
    pub fn purge(&self, now: f64) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, (expires_at, _)| *expires_at > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(enabled: bool) -> CooldownRegistry {
        let mut reason_map = HashMap::new();
        reason_map.insert("rate_limit".to_string(), 8);
        reason_map.insert("venue_unhealthy".to_string(), 10);
        let config = CooldownConfig {
            default_sec: 5,
            reason_map,
        };
        CooldownRegistry::new(&config, enabled)
    }

    #[test]
    fn reason_ttl_applies() {
        let cooldowns = registry(true);
        cooldowns.hit("binance-um", "BTCUSDT", "alpha", "rate_limit", 100.0);
        let hit = cooldowns.check("binance-um", "BTCUSDT", "alpha", 104.0).unwrap();
        assert_eq!(hit.reason, "rate_limit");
        assert!((hit.remaining - 4.0).abs() < 1e-9);
        assert!(cooldowns.check("binance-um", "BTCUSDT", "alpha", 109.0).is_none());
    }

    #[test]
    fn unknown_reason_uses_default_ttl() {
        let cooldowns = registry(true);
        cooldowns.hit("okx-perp", "ETHUSDT", "beta", "mystery", 100.0);
        assert!(cooldowns.check("okx-perp", "ETHUSDT", "beta", 104.0).is_some());
        assert!(cooldowns.check("okx-perp", "ETHUSDT", "beta", 106.0).is_none());
    }

    #[test]
    fn disabled_registry_reports_nothing() {
        let cooldowns = registry(false);
        cooldowns.hit("binance-um", "BTCUSDT", "alpha", "rate_limit", 100.0);
        assert!(cooldowns.check("binance-um", "BTCUSDT", "alpha", 100.1).is_none());
    }

    #[test]
    fn keys_are_case_normalised() {
        let cooldowns = registry(true);
        cooldowns.hit("Binance-UM", "btcusdt", "Alpha", "rate_limit", 100.0);
        assert!(cooldowns.check("binance-um", "BTCUSDT", "alpha", 101.0).is_some());
    }

    #[test]
    fn purge_drops_expired_entries() {
        let cooldowns = registry(true);
        cooldowns.hit("a", "B", "c", "rate_limit", 100.0);
        cooldowns.hit("d", "E", "f", "venue_unhealthy", 100.0);
        assert_eq!(cooldowns.purge(109.0), 1);
        assert_eq!(cooldowns.purge(200.0), 1);
    }
}
