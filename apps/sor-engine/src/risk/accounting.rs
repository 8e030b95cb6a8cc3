//! Per-strategy intent/fill accounting.
//!
//! Simulated flows are tracked in their own columns and never touch the
//! live counters, so paper trading cannot consume live caps or skew live
//! telemetry.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde::Serialize;

/// Counter block kept per strategy (and once globally).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowCounters {
    /// Accepted intents.
    pub intents: u64,
    /// Notional across accepted intents.
    pub intent_notional_usd: Decimal,
    /// Fill events applied.
    pub fills: u64,
    /// Notional across fills.
    pub fill_notional_usd: Decimal,
    /// Realized PnL accumulated through fills.
    pub realized_pnl_usd: Decimal,
    /// Simulated intents.
    pub sim_intents: u64,
    /// Simulated fill events.
    pub sim_fills: u64,
    /// Notional across simulated flows.
    pub sim_notional_usd: Decimal,
}

/// Strategy-scoped accounting registry.
#[derive(Debug, Default)]
pub struct StrategyAccounting {
    global: RwLock<FlowCounters>,
    per_strategy: RwLock<HashMap<String, FlowCounters>>,
}

impl StrategyAccounting {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted intent.
    pub fn record_intent(&self, strategy: &str, notional_usd: Decimal, simulated: bool) {
        self.update(strategy, |counters| {
            if simulated {
                counters.sim_intents += 1;
                counters.sim_notional_usd += notional_usd;
            } else {
                counters.intents += 1;
                counters.intent_notional_usd += notional_usd;
            }
        });
    }

    /// Record a fill event with its notional and realized PnL delta.
    pub fn record_fill(
        &self,
        strategy: &str,
        notional_usd: Decimal,
        pnl_delta_usd: Decimal,
        simulated: bool,
    ) {
        self.update(strategy, |counters| {
            if simulated {
                counters.sim_fills += 1;
                counters.sim_notional_usd += notional_usd;
            } else {
                counters.fills += 1;
                counters.fill_notional_usd += notional_usd;
                counters.realized_pnl_usd += pnl_delta_usd;
            }
        });
    }

    /// Global counters.
    #[must_use]
    pub fn global(&self) -> FlowCounters {
        self.global.read().map(|counters| *counters).unwrap_or_default()
    }

    /// Counters for one strategy.
    #[must_use]
    pub fn strategy(&self, strategy: &str) -> FlowCounters {
        self.per_strategy
            .read()
            .ok()
            .and_then(|map| map.get(strategy).copied())
            .unwrap_or_default()
    }

    /// Copy of every per-strategy counter block.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, FlowCounters> {
        self.per_strategy
            .read()
            .map(|map| map.clone())
            .unwrap_or_default()
    }

    fn update(&self, strategy: &str, apply: impl Fn(&mut FlowCounters)) {
        if let Ok(mut global) = self.global.write() {
            apply(&mut global);
        }
        if let Ok(mut map) = self.per_strategy.write() {
            apply(map.entry(strategy.to_string()).or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn live_and_simulated_flows_are_separate() {
        let accounting = StrategyAccounting::new();
        accounting.record_intent("alpha", dec!(100), false);
        accounting.record_intent("alpha", dec!(999), true);
        accounting.record_fill("alpha", dec!(100), dec!(-3), false);

        let counters = accounting.strategy("alpha");
        assert_eq!(counters.intents, 1);
        assert_eq!(counters.intent_notional_usd, dec!(100));
        assert_eq!(counters.sim_intents, 1);
        assert_eq!(counters.sim_notional_usd, dec!(999));
        assert_eq!(counters.realized_pnl_usd, dec!(-3));

        let global = accounting.global();
        assert_eq!(global.intents, 1);
        assert_eq!(global.fills, 1);
    }

    #[test]
    fn unknown_strategy_reads_default() {
        let accounting = StrategyAccounting::new();
        assert_eq!(accounting.strategy("ghost"), FlowCounters::default());
    }
}
