//! Pre-trade guard pipeline.
//!
//! Guards are ordered predicates evaluated by the facade on every submit;
//! the first rejecting guard wins and its reason code is the externally
//! observable result. The canonical order is:
//!
//! 1. safe-mode
//! 2. live profile gate
//! 3. universe enforcement
//! 4. readiness aggregator
//! 5. market-data freshness
//! 6. strict pre-trade validation
//! 7. notional risk caps
//! 8. PnL caps
//! 9. risk budgets
//! 10. cooldown
//! 11. intent dedup
//! 12. idempotency outbox

pub mod marketdata;
pub mod pretrade;
pub mod readiness;
pub mod universe;

use serde::Serialize;

pub use marketdata::MarketDataWatchdog;
pub use pretrade::{PretradeViolation, check_pretrade};
pub use readiness::ReadinessAggregator;
pub use universe::UniverseGate;

use crate::config::ProfileConfig;

/// Which notional cap scope rejected a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapScope {
    /// Per-venue cap.
    Venue,
    /// Per-symbol cap.
    Symbol,
    /// Per-strategy cap.
    Strategy,
}

impl CapScope {
    /// Detail token reported with the block.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::Venue => "venue_cap",
            Self::Symbol => "symbol_cap",
            Self::Strategy => "strategy_cap",
        }
    }
}

/// Reason codes emitted by the guard pipeline.
///
/// The `Display` rendering is part of the public contract: hosts and tests
/// match on the exact strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    /// HOLD or KILL is engaged.
    SafeMode,
    /// Live profile without the operator confirmation token.
    LiveConfirmMissing,
    /// Live profile without the readiness attestation.
    LiveReadinessNotOk,
    /// Pair outside the tradeable universe.
    Universe,
    /// Required readiness signals missing, stale or unhealthy.
    ReadinessAgg,
    /// Market data stale per tick TTL or rolling p95.
    MarketdataStale,
    /// Strict pre-trade validation failed.
    PretradeRejected,
    /// A notional cap was hit.
    RiskBlocked(CapScope),
    /// Daily-loss or drawdown cap active.
    PnlCap,
    /// Strategy risk budget exhausted.
    RiskBudget,
    /// Cooldown on the (venue, symbol, strategy) triple.
    Cooldown,
    /// Duplicate intent fingerprint inside the dedup window.
    DupeIntent,
    /// A pending outbox entry exists for the intent key.
    OutboxInflight,
    /// Arbitrage edge below the configured minimum.
    EdgeTooSmall,
}

impl BlockReason {
    /// The stable reason string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafeMode => "safe-mode",
            Self::LiveConfirmMissing => "live-confirm-missing",
            Self::LiveReadinessNotOk => "live-readiness-not-ok",
            Self::Universe => "universe",
            Self::ReadinessAgg => "readiness-agg",
            Self::MarketdataStale => "marketdata_stale",
            Self::PretradeRejected => "pretrade_rejected",
            Self::RiskBlocked(CapScope::Venue) => "risk-blocked:venue_cap",
            Self::RiskBlocked(CapScope::Symbol) => "risk-blocked:symbol_cap",
            Self::RiskBlocked(CapScope::Strategy) => "risk-blocked:strategy_cap",
            Self::PnlCap => "pnl-cap",
            Self::RiskBudget => "risk-budget",
            Self::Cooldown => "cooldown",
            Self::DupeIntent => "dupe-intent",
            Self::OutboxInflight => "outbox-inflight",
            Self::EdgeTooSmall => "sor-block:edge-too-small",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// The guard passed.
    Allow,
    /// The guard rejected the submit.
    Block {
        /// Reason code.
        reason: BlockReason,
        /// Optional machine-readable detail.
        detail: Option<String>,
    },
}

impl GuardDecision {
    /// Build a block without detail.
    #[must_use]
    pub const fn block(reason: BlockReason) -> Self {
        Self::Block { reason, detail: None }
    }

    /// Build a block with a detail token.
    #[must_use]
    pub fn block_with(reason: BlockReason, detail: impl Into<String>) -> Self {
        Self::Block { reason, detail: Some(detail.into()) }
    }

    /// Whether the guard passed.
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Live-profile gate: live trading requires the operator confirmation
/// token and a positive readiness attestation. Paper/testnet pass.
#[must_use]
pub fn check_profile(profile: &ProfileConfig) -> GuardDecision {
    if !profile.profile.is_live() {
        return GuardDecision::Allow;
    }
    if !profile.live_confirmed() {
        return GuardDecision::block(BlockReason::LiveConfirmMissing);
    }
    if !profile.readiness_ok {
        return GuardDecision::block(BlockReason::LiveReadinessNotOk);
    }
    GuardDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecProfile;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(BlockReason::SafeMode.as_str(), "safe-mode");
        assert_eq!(
            BlockReason::RiskBlocked(CapScope::Symbol).as_str(),
            "risk-blocked:symbol_cap"
        );
        assert_eq!(BlockReason::EdgeTooSmall.as_str(), "sor-block:edge-too-small");
        assert_eq!(BlockReason::MarketdataStale.as_str(), "marketdata_stale");
    }

    #[test]
    fn live_gate_requires_token_then_readiness() {
        let mut profile = ProfileConfig {
            profile: ExecProfile::Live,
            ..ProfileConfig::default()
        };
        assert_eq!(
            check_profile(&profile),
            GuardDecision::block(BlockReason::LiveConfirmMissing)
        );
        profile.live_confirm = Some("I_UNDERSTAND".to_string());
        assert_eq!(
            check_profile(&profile),
            GuardDecision::block(BlockReason::LiveReadinessNotOk)
        );
        profile.readiness_ok = true;
        assert!(check_profile(&profile).is_allow());
    }

    #[test]
    fn paper_profile_skips_the_gate() {
        let profile = ProfileConfig::default();
        assert!(check_profile(&profile).is_allow());
    }
}
