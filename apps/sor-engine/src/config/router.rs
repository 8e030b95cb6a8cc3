//! Scorer, cooldown and arbitrage configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{env_f64, env_json, env_string};

/// Per-venue fee schedule in basis points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueFees {
    /// Maker fee.
    pub maker_bps: f64,
    /// Taker fee.
    pub taker_bps: f64,
    /// VIP rebate credited against the applied fee.
    pub vip_rebate_bps: f64,
}

/// Fee resolution table for the scorer and the arbitrage planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeesConfig {
    /// Manual per-venue overrides (`ROUTER_FEES_JSON`, JSON map).
    pub manual: HashMap<String, VenueFees>,
    /// Fallback taker fee when a venue has no entry
    /// (`DEFAULT_TAKER_FEE_BPS`).
    pub default_taker_bps: f64,
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            manual: HashMap::new(),
            default_taker_bps: 2.0,
        }
    }
}

impl FeesConfig {
    /// Resolve the fee schedule for a venue.
    #[must_use]
    pub fn resolve(&self, venue: &str) -> VenueFees {
        self.manual.get(venue).copied().unwrap_or(VenueFees {
            maker_bps: self.default_taker_bps,
            taker_bps: self.default_taker_bps,
            vip_rebate_bps: 0.0,
        })
    }
}

/// Venue scorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Latency penalty weight (`SMART_ROUTER_LATENCY_BPS_PER_MS`).
    pub latency_bps_per_ms: f64,
    /// Latency target below which no penalty applies
    /// (`SMART_ROUTER_LATENCY_TARGET_MS`).
    pub latency_target_ms: f64,
    /// Linear impact coefficient over the notional/liquidity ratio.
    pub impact_k: f64,
    /// Score with maker fees when post-only submission is plausible.
    pub prefer_maker: bool,
    /// Fee resolution.
    pub fees: FeesConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            latency_bps_per_ms: 0.01,
            latency_target_ms: 200.0,
            impact_k: 0.0,
            prefer_maker: false,
            fees: FeesConfig::default(),
        }
    }
}

impl ScorerConfig {
    /// Read the scorer surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            latency_bps_per_ms: env_f64(
                "SMART_ROUTER_LATENCY_BPS_PER_MS",
                defaults.latency_bps_per_ms,
            )
            .max(0.0),
            latency_target_ms: env_f64(
                "SMART_ROUTER_LATENCY_TARGET_MS",
                defaults.latency_target_ms,
            ),
            impact_k: env_f64("SMART_ROUTER_IMPACT_K", defaults.impact_k),
            prefer_maker: super::env_flag("SMART_ROUTER_PREFER_MAKER"),
            fees: FeesConfig {
                manual: env_json("ROUTER_FEES_JSON"),
                default_taker_bps: env_f64(
                    "DEFAULT_TAKER_FEE_BPS",
                    defaults.fees.default_taker_bps,
                ),
            },
        }
    }
}

/// Cooldown registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Fallback cooldown seconds (`ROUTER_COOLDOWN_SEC_DEFAULT`).
    pub default_sec: u64,
    /// Reason-specific cooldown seconds
    /// (`ROUTER_COOLDOWN_REASON_MAP`, JSON map).
    pub reason_map: HashMap<String, u64>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_sec: 5,
            reason_map: HashMap::new(),
        }
    }
}

impl CooldownConfig {
    /// Read the cooldown surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_sec: super::env_u64("ROUTER_COOLDOWN_SEC_DEFAULT", defaults.default_sec),
            reason_map: env_json("ROUTER_COOLDOWN_REASON_MAP"),
        }
    }
}

/// Inter-venue arbitrage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbConfig {
    /// Candidate venues for two-leg submissions (`SOR_ARB_VENUES`, csv).
    pub venues: Vec<String>,
    /// Minimum net edge to submit (`SOR_MIN_EDGE_BPS`).
    pub min_edge_bps: f64,
    /// Slippage allowance charged against the edge
    /// (`SOR_MAX_LEG_SLIPPAGE_BPS`).
    pub max_leg_slippage_bps: f64,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            venues: vec!["binance-um".to_string(), "okx-perp".to_string()],
            min_edge_bps: 1.0,
            max_leg_slippage_bps: 0.0,
        }
    }
}

impl ArbConfig {
    /// Read the arbitrage surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let venues = env_string("SOR_ARB_VENUES").map_or(defaults.venues.clone(), |raw| {
            raw.split(',')
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect()
        });
        Self {
            venues,
            min_edge_bps: env_f64("SOR_MIN_EDGE_BPS", defaults.min_edge_bps),
            max_leg_slippage_bps: env_f64(
                "SOR_MAX_LEG_SLIPPAGE_BPS",
                defaults.max_leg_slippage_bps,
            ),
        }
    }
}
