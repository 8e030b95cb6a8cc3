//! Per-strategy risk budgets with TTL-evicted reservations.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::StrategyBudget;
use crate::guards::{BlockReason, GuardDecision};

/// A live notional reservation held against a strategy budget.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    /// Reserving order id.
    pub order_id: String,
    /// Strategy charged.
    pub strategy: String,
    /// Symbol charged.
    pub symbol: String,
    /// Reserved notional in USD.
    pub notional_usd: Decimal,
    /// Reservation time, Unix seconds.
    pub ts: f64,
}

/// Aggregated view of the registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BudgetSnapshot {
    /// Total reserved notional per strategy.
    pub total_by_strategy: HashMap<String, Decimal>,
    /// Count of distinct symbols with reservations per strategy.
    pub symbols_by_strategy: HashMap<String, usize>,
    /// Reserved notional per (strategy, symbol).
    pub per_symbol_by_strategy: HashMap<(String, String), Decimal>,
}

/// Registry of open budget reservations.
#[derive(Debug)]
pub struct BudgetRegistry {
    ttl_seconds: u64,
    max_reservations: usize,
    reservations: RwLock<HashMap<String, Reservation>>,
}

impl BudgetRegistry {
    /// Create a registry with TTL and size bounds.
    #[must_use]
    pub fn new(ttl_seconds: u64, max_reservations: usize) -> Self {
        Self {
            ttl_seconds,
            max_reservations,
            reservations: RwLock::new(HashMap::new()),
        }
    }

    /// Reserve notional for an order.
    pub fn reserve(
        &self,
        order_id: &str,
        strategy: &str,
        symbol: &str,
        notional_usd: Decimal,
        now: f64,
    ) {
        if let Ok(mut reservations) = self.reservations.write() {
            reservations.insert(
                order_id.to_string(),
                Reservation {
                    order_id: order_id.to_string(),
                    strategy: strategy.to_string(),
                    symbol: symbol.to_string(),
                    notional_usd,
                    ts: now,
                },
            );
        }
    }

    /// Release an order's reservation, if any.
    pub fn release(&self, order_id: &str) {
        if let Ok(mut reservations) = self.reservations.write() {
            reservations.remove(order_id);
        }
    }

    /// Drop expired reservations, then enforce the size cap oldest-first.
    pub fn cleanup(&self, now: f64) -> usize {
        let Ok(mut reservations) = self.reservations.write() else {
            return 0;
        };
        let mut removed = 0;
        if self.ttl_seconds > 0 {
            let cutoff = now - self.ttl_seconds as f64;
            let expired: Vec<String> = reservations
                .iter()
                .filter(|(_, entry)| entry.ts < cutoff)
                .map(|(order_id, _)| order_id.clone())
                .collect();
            removed += expired.len();
            for order_id in expired {
                reservations.remove(&order_id);
            }
        }
        if self.max_reservations > 0 && reservations.len() > self.max_reservations {
            let overflow = reservations.len() - self.max_reservations;
            let mut by_age: Vec<(String, f64)> = reservations
                .iter()
                .map(|(order_id, entry)| (order_id.clone(), entry.ts))
                .collect();
            by_age.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            for (order_id, _) in by_age.into_iter().take(overflow) {
                reservations.remove(&order_id);
                removed += 1;
            }
        }
        removed
    }

    /// Aggregate the live reservations.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let Ok(reservations) = self.reservations.read() else {
            return BudgetSnapshot::default();
        };
        let mut snapshot = BudgetSnapshot::default();
        let mut symbols: HashMap<String, HashSet<String>> = HashMap::new();
        for entry in reservations.values() {
            *snapshot
                .total_by_strategy
                .entry(entry.strategy.clone())
                .or_default() += entry.notional_usd;
            symbols
                .entry(entry.strategy.clone())
                .or_default()
                .insert(entry.symbol.clone());
            *snapshot
                .per_symbol_by_strategy
                .entry((entry.strategy.clone(), entry.symbol.clone()))
                .or_default() += entry.notional_usd;
        }
        snapshot.symbols_by_strategy = symbols
            .into_iter()
            .map(|(strategy, set)| (strategy, set.len()))
            .collect();
        snapshot
    }

    /// Number of live reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reservations.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Budget policies plus the reservation registry.
#[derive(Debug)]
pub struct RiskBudgets {
    policies: HashMap<String, StrategyBudget>,
    registry: BudgetRegistry,
}

impl RiskBudgets {
    /// Create the budget checker from parsed policies.
    #[must_use]
    pub fn new(
        policies: HashMap<String, StrategyBudget>,
        ttl_seconds: u64,
        max_reservations: usize,
    ) -> Self {
        Self {
            policies,
            registry: BudgetRegistry::new(ttl_seconds, max_reservations),
        }
    }

    /// The reservation registry.
    #[must_use]
    pub fn registry(&self) -> &BudgetRegistry {
        &self.registry
    }

    /// Whether a new reservation fits the strategy budget.
    ///
    /// Returns `(true, "no-policy")` for strategies without a policy and
    /// `(true, "ok")` when the reservation fits; otherwise `(false,
    /// reason)` with one of `max_notional_exceeded`,
    /// `per_symbol_max_notional_exceeded`, `max_positions_exceeded`.
    #[must_use]
    pub fn can_accept(
        &self,
        strategy: &str,
        symbol: &str,
        add_notional_usd: Decimal,
        now: f64,
    ) -> (bool, &'static str) {
        self.registry.cleanup(now);
        let Some(policy) = self.policies.get(strategy) else {
            return (true, "no-policy");
        };
        let snapshot = self.registry.snapshot();
        let current_total = snapshot
            .total_by_strategy
            .get(strategy)
            .copied()
            .unwrap_or_default();
        if policy.max_notional_usd > Decimal::ZERO
            && current_total + add_notional_usd > policy.max_notional_usd
        {
            return (false, "max_notional_exceeded");
        }
        let current_symbol_total = snapshot
            .per_symbol_by_strategy
            .get(&(strategy.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or_default();
        if let Some(symbol_limit) = policy.per_symbol_max_notional_usd.get(symbol) {
            if current_symbol_total + add_notional_usd > *symbol_limit {
                return (false, "per_symbol_max_notional_exceeded");
            }
        }
        let open_positions = snapshot
            .symbols_by_strategy
            .get(strategy)
            .copied()
            .unwrap_or(0);
        if policy.max_positions > 0
            && current_symbol_total.is_zero()
            && open_positions + 1 > policy.max_positions as usize
        {
            return (false, "max_positions_exceeded");
        }
        (true, "ok")
    }

    /// Guard wrapper around [`Self::can_accept`].
    #[must_use]
    pub fn check(
        &self,
        strategy: &str,
        symbol: &str,
        add_notional_usd: Decimal,
        now: f64,
    ) -> GuardDecision {
        let (ok, reason) = self.can_accept(strategy, symbol, add_notional_usd, now);
        if ok {
            GuardDecision::Allow
        } else {
            GuardDecision::block_with(BlockReason::RiskBudget, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn budgets() -> RiskBudgets {
        let mut per_symbol = HashMap::new();
        per_symbol.insert("BTCUSDT".to_string(), dec!(600));
        let mut policies = HashMap::new();
        policies.insert(
            "xarb-perp".to_string(),
            StrategyBudget {
                max_notional_usd: dec!(1000),
                max_positions: 4,
                per_symbol_max_notional_usd: per_symbol,
            },
        );
        RiskBudgets::new(policies, 600, 50_000)
    }

    #[test]
    fn no_policy_passes() {
        let budgets = budgets();
        let (ok, reason) = budgets.can_accept("unknown", "BTCUSDT", dec!(1_000_000), 0.0);
        assert!(ok);
        assert_eq!(reason, "no-policy");
    }

    #[test]
    fn per_symbol_cap_blocks_second_reservation() {
        let budgets = budgets();
        budgets
            .registry()
            .reserve("o1", "xarb-perp", "BTCUSDT", dec!(400), 0.0);
        let (ok, reason) = budgets.can_accept("xarb-perp", "BTCUSDT", dec!(400), 1.0);
        assert!(!ok);
        assert_eq!(reason, "per_symbol_max_notional_exceeded");
    }

    #[test]
    fn release_restores_headroom() {
        let budgets = budgets();
        budgets
            .registry()
            .reserve("o1", "xarb-perp", "BTCUSDT", dec!(400), 0.0);
        budgets.registry().release("o1");
        let (ok, reason) = budgets.can_accept("xarb-perp", "BTCUSDT", dec!(400), 1.0);
        assert!(ok);
        assert_eq!(reason, "ok");
        assert_eq!(
            budgets
                .registry()
                .snapshot()
                .total_by_strategy
                .get("xarb-perp"),
            None
        );
    }

    #[test]
    fn total_cap_and_position_count() {
        let budgets = budgets();
        budgets
            .registry()
            .reserve("o1", "xarb-perp", "ETHUSDT", dec!(900), 0.0);
        let (ok, reason) = budgets.can_accept("xarb-perp", "SOLUSDT", dec!(200), 1.0);
        assert!(!ok);
        assert_eq!(reason, "max_notional_exceeded");

        let strict = {
            let mut policies = HashMap::new();
            policies.insert(
                "s".to_string(),
                StrategyBudget {
                    max_notional_usd: Decimal::ZERO,
                    max_positions: 1,
                    per_symbol_max_notional_usd: HashMap::new(),
                },
            );
            RiskBudgets::new(policies, 600, 100)
        };
        strict.registry().reserve("o1", "s", "ETHUSDT", dec!(10), 0.0);
        let (ok, reason) = strict.can_accept("s", "SOLUSDT", dec!(10), 1.0);
        assert!(!ok);
        assert_eq!(reason, "max_positions_exceeded");
        // Adding to an already-open symbol does not count a new position.
        let (ok, _) = strict.can_accept("s", "ETHUSDT", dec!(10), 1.0);
        assert!(ok);
    }

    #[test]
    fn ttl_cleanup_drops_stale_reservations() {
        let registry = BudgetRegistry::new(10, 100);
        registry.reserve("o1", "s", "BTCUSDT", dec!(100), 0.0);
        assert_eq!(registry.cleanup(5.0), 0);
        assert_eq!(registry.cleanup(20.0), 1);
        assert!(registry.is_empty());
    }
}
