//! Feature flags gating optional kernel behaviour.

use serde::{Deserialize, Serialize};

use super::{env_flag, env_flag_default};

/// Feature flags, sourced from `FF_*` environment variables.
///
/// Everything defaults off except ledger callbacks; a deployment opts
/// into each behaviour explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Strict pre-trade validation against symbol metadata.
    pub pretrade_strict: bool,
    /// Per-venue/symbol/strategy notional caps.
    pub risk_limits: bool,
    /// Market-data staleness gate.
    pub md_watchdog: bool,
    /// Ack/fill timeout scheduler.
    pub order_timeouts: bool,
    /// Reasoned cooldown registry.
    pub router_cooldown: bool,
    /// Durable idempotency outbox.
    pub idempotency_outbox: bool,
    /// Daily-loss and drawdown caps.
    pub daily_loss_cap: bool,
    /// Per-strategy risk budgets.
    pub risk_budgets: bool,
    /// Venue scoring on submit.
    pub smart_router: bool,
    /// Smart-order-router v1 surface (inter-venue arbitrage).
    pub sor_v1: bool,
    /// Readiness-aggregator guard.
    pub readiness_agg_guard: bool,
    /// Ledger callbacks.
    pub ledger: bool,
    /// Funding-aware arbitrage edges.
    pub funding_router: bool,
    /// Runaway-order breaker (host-side; carried for config parity).
    pub runaway_guard_v2: bool,
    /// Leader lock for multi-instance deployments (host-side).
    pub leader_lock: bool,
    /// Universe enforcement guard.
    pub enforce_universe: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            pretrade_strict: false,
            risk_limits: false,
            md_watchdog: false,
            order_timeouts: false,
            router_cooldown: false,
            idempotency_outbox: false,
            daily_loss_cap: false,
            risk_budgets: false,
            smart_router: false,
            sor_v1: false,
            readiness_agg_guard: false,
            ledger: true,
            funding_router: false,
            runaway_guard_v2: false,
            leader_lock: false,
            enforce_universe: false,
        }
    }
}

impl FeatureFlags {
    /// Read every flag from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            pretrade_strict: env_flag("FF_PRETRADE_STRICT"),
            risk_limits: env_flag("FF_RISK_LIMITS"),
            md_watchdog: env_flag("FF_MD_WATCHDOG"),
            order_timeouts: env_flag("FF_ORDER_TIMEOUTS"),
            router_cooldown: env_flag("FF_ROUTER_COOLDOWN"),
            idempotency_outbox: env_flag("FF_IDEMPOTENCY_OUTBOX"),
            daily_loss_cap: env_flag("FF_DAILY_LOSS_CAP"),
            risk_budgets: env_flag("FF_RISK_BUDGETS"),
            smart_router: env_flag("FF_SMART_ROUTER"),
            sor_v1: env_flag("FF_SOR_V1"),
            readiness_agg_guard: env_flag("FF_READINESS_AGG_GUARD"),
            ledger: env_flag_default("FF_LEDGER", true),
            funding_router: env_flag("FF_FUNDING_ROUTER"),
            runaway_guard_v2: env_flag("FEATURE_RUNAWAY_GUARD_V2"),
            leader_lock: env_flag("FEATURE_LEADER_LOCK"),
            enforce_universe: env_flag("ENFORCE_UNIVERSE"),
        }
    }
}
