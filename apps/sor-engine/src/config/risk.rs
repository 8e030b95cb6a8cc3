//! Risk caps, budgets and PnL cap configuration.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{env_decimal_map, env_f64, env_json, env_scoped_decimal, env_string, env_u64, env_usize};

/// Per-strategy budget policy parsed from `RISK_BUDGETS_JSON`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyBudget {
    /// Total open notional allowed for the strategy; 0 means unlimited.
    #[serde(default)]
    pub max_notional_usd: Decimal,
    /// Distinct symbols with open reservations allowed; 0 means unlimited.
    #[serde(default)]
    pub max_positions: u32,
    /// Per-symbol notional ceilings.
    #[serde(default)]
    pub per_symbol_max_notional_usd: HashMap<String, Decimal>,
}

/// Scoped cap values: a `global` entry plus per-scope overrides.
pub type ScopedCaps = HashMap<String, Decimal>;

/// Risk configuration for caps, budgets and PnL limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Per-venue notional caps (`RISK_CAP_VENUE`, JSON map).
    pub cap_venue: HashMap<String, Decimal>,
    /// Per-symbol notional caps (`RISK_CAP_SYMBOL`, JSON map).
    pub cap_symbol: HashMap<String, Decimal>,
    /// Per-strategy notional caps (`RISK_CAP_STRATEGY`, JSON map).
    pub cap_strategy: HashMap<String, Decimal>,
    /// Daily realized-loss caps per scope (`DAILY_LOSS_CAP_USD_GLOBAL`
    /// plus `DAILY_LOSS_CAP_USD__<SCOPE>` overrides).
    pub daily_loss_cap_usd: ScopedCaps,
    /// Intraday drawdown caps per scope
    /// (`INTRADAY_DRAWDOWN_CAP_USD_GLOBAL` plus scoped overrides).
    pub intraday_drawdown_cap_usd: ScopedCaps,
    /// Cooloff minutes after a PnL cap trip (`PNL_CAPS_COOLOFF_MIN`).
    pub pnl_caps_cooloff_min: f64,
    /// Timezone anchoring the PnL day boundary (`PNL_TZ`).
    pub pnl_tz: String,
    /// Strategy budget policies (`RISK_BUDGETS_JSON`).
    pub budgets: HashMap<String, StrategyBudget>,
    /// Budget reservation TTL (`RISK_BUDGETS_TTL_SEC`).
    pub budgets_ttl_sec: u64,
    /// Budget reservation cap (`RISK_BUDGETS_MAX_RESERVATIONS`).
    pub budgets_max_reservations: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cap_venue: HashMap::new(),
            cap_symbol: HashMap::new(),
            cap_strategy: HashMap::new(),
            daily_loss_cap_usd: HashMap::new(),
            intraday_drawdown_cap_usd: HashMap::new(),
            pnl_caps_cooloff_min: 30.0,
            pnl_tz: "UTC".to_string(),
            budgets: HashMap::new(),
            budgets_ttl_sec: 600,
            budgets_max_reservations: 50_000,
        }
    }
}

impl RiskConfig {
    /// Read the risk surface from the environment.
    ///
    /// Malformed JSON maps degrade to empty maps with a warning rather
    /// than failing the boot.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut daily_loss = env_scoped_decimal("DAILY_LOSS_CAP_USD");
        if let Some(global) =
            env_string("DAILY_LOSS_CAP_USD_GLOBAL").and_then(|raw| Decimal::from_str(raw.trim()).ok())
        {
            daily_loss.insert("global".to_string(), global);
        }
        let mut drawdown = env_scoped_decimal("INTRADAY_DRAWDOWN_CAP_USD");
        if let Some(global) = env_string("INTRADAY_DRAWDOWN_CAP_USD_GLOBAL")
            .and_then(|raw| Decimal::from_str(raw.trim()).ok())
        {
            drawdown.insert("global".to_string(), global);
        }
        Self {
            cap_venue: env_decimal_map("RISK_CAP_VENUE"),
            cap_symbol: env_decimal_map("RISK_CAP_SYMBOL"),
            cap_strategy: env_decimal_map("RISK_CAP_STRATEGY"),
            daily_loss_cap_usd: daily_loss,
            intraday_drawdown_cap_usd: drawdown,
            pnl_caps_cooloff_min: env_f64("PNL_CAPS_COOLOFF_MIN", defaults.pnl_caps_cooloff_min),
            pnl_tz: env_string("PNL_TZ").unwrap_or(defaults.pnl_tz),
            budgets: env_json("RISK_BUDGETS_JSON"),
            budgets_ttl_sec: env_u64("RISK_BUDGETS_TTL_SEC", defaults.budgets_ttl_sec),
            budgets_max_reservations: env_usize(
                "RISK_BUDGETS_MAX_RESERVATIONS",
                defaults.budgets_max_reservations,
            ),
        }
    }
}
