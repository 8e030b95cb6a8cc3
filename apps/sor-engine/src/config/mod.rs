//! Configuration for the routing kernel.
//!
//! The configuration surface is env-style: every knob has a typed default
//! and an environment variable override. Malformed values degrade to the
//! default with a warning; boot never fails on configuration alone.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sor_engine::config::RouterConfig;
//!
//! // Defaults, then override in code (tests do this):
//! let mut config = RouterConfig::default();
//! config.features.router_cooldown = true;
//!
//! // Or read the full environment surface (production):
//! let config = RouterConfig::from_env();
//! ```

mod features;
mod limits;
mod outbox;
mod profile;
mod risk;
mod router;

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use features::FeatureFlags;
pub use limits::LimitsConfig;
pub use outbox::OutboxConfig;
pub use profile::{ExecProfile, LIVE_CONFIRM_TOKEN, ProfileConfig};
pub use risk::{RiskConfig, ScopedCaps, StrategyBudget};
pub use router::{ArbConfig, CooldownConfig, FeesConfig, ScorerConfig, VenueFees};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Feature flags.
    pub features: FeatureFlags,
    /// Execution profile and live confirmation.
    pub profile: ProfileConfig,
    /// Windows, TTLs and capacities.
    pub limits: LimitsConfig,
    /// Durable outbox settings.
    pub outbox: OutboxConfig,
    /// Caps, budgets and PnL limits.
    pub risk: RiskConfig,
    /// Venue scorer settings.
    pub scorer: ScorerConfig,
    /// Cooldown registry settings.
    pub cooldown: CooldownConfig,
    /// Inter-venue arbitrage settings.
    pub arb: ArbConfig,
}

impl RouterConfig {
    /// Read the complete configuration surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            features: FeatureFlags::from_env(),
            profile: ProfileConfig::from_env(),
            limits: LimitsConfig::from_env(),
            outbox: OutboxConfig::from_env(),
            risk: RiskConfig::from_env(),
            scorer: ScorerConfig::from_env(),
            cooldown: CooldownConfig::from_env(),
            arb: ArbConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Env parsing helpers
// ---------------------------------------------------------------------------

pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Truthy values accepted for boolean flags.
fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "y"
    )
}

pub(crate) fn env_flag(name: &str) -> bool {
    env_flag_default(name, false)
}

pub(crate) fn env_flag_default(name: &str, default: bool) -> bool {
    std::env::var(name).map_or(default, |raw| is_truthy(&raw))
}

pub(crate) fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .map_or(default, |value| value.max(0.0) as u64)
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .map_or(default, |value| value.max(0.0) as usize)
}

/// Parse a JSON object env var into a typed map; malformed input degrades
/// to an empty map with a warning.
pub(crate) fn env_json<T>(name: &str) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    let Some(raw) = env_string(name) else {
        return T::default();
    };
    match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(var = name, %error, "ignoring malformed JSON configuration");
            T::default()
        }
    }
}

/// Parse a JSON object of name → decimal; values may be strings or numbers.
pub(crate) fn env_decimal_map(name: &str) -> HashMap<String, Decimal> {
    let parsed: HashMap<String, Value> = env_json(name);
    parsed
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                _ => return None,
            };
            Decimal::from_str(text.trim()).ok().map(|dec| (key, dec))
        })
        .collect()
}

/// Collect `NAME__<SCOPE>` overrides into a scope → decimal map.
pub(crate) fn env_scoped_decimal(name: &str) -> HashMap<String, Decimal> {
    let prefix = format!("{name}__");
    std::env::vars()
        .filter_map(|(key, value)| {
            let scope = key.strip_prefix(&prefix)?;
            let parsed = Decimal::from_str(value.trim()).ok()?;
            Some((scope.to_ascii_lowercase(), parsed))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_set_matches_conventions() {
        for raw in ["1", "true", "YES", "On", "y"] {
            assert!(is_truthy(raw), "{raw} should be truthy");
        }
        for raw in ["0", "false", "off", "", "maybe"] {
            assert!(!is_truthy(raw), "{raw} should be falsy");
        }
    }

    #[test]
    fn defaults_keep_optional_machinery_off() {
        let config = RouterConfig::default();
        assert!(!config.features.pretrade_strict);
        assert!(!config.features.order_timeouts);
        assert_eq!(config.limits.submit_ack_timeout_sec, 0);
        assert!((config.limits.idempotency_window_sec - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.risk.pnl_tz, "UTC");
    }
}
