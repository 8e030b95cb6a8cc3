//! Hard notional caps per venue, symbol and strategy.
//!
//! The exposure book mirrors live (non-terminal) order notionals; the
//! guard compares book totals plus the incoming intent against the
//! configured cap maps. First breached scope wins, in venue → symbol →
//! strategy order.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;

use crate::guards::{BlockReason, CapScope, GuardDecision};

#[derive(Debug, Clone)]
struct Exposure {
    venue: String,
    symbol: String,
    strategy: String,
    notional: Decimal,
}

#[derive(Debug, Default)]
struct BookInner {
    entries: HashMap<String, Exposure>,
    by_venue: HashMap<String, Decimal>,
    by_symbol: HashMap<String, Decimal>,
    by_strategy: HashMap<String, Decimal>,
}

impl BookInner {
    fn add(&mut self, order_id: &str, exposure: Exposure) {
        *self.by_venue.entry(exposure.venue.clone()).or_default() += exposure.notional;
        *self.by_symbol.entry(exposure.symbol.clone()).or_default() += exposure.notional;
        *self.by_strategy.entry(exposure.strategy.clone()).or_default() += exposure.notional;
        self.entries.insert(order_id.to_string(), exposure);
    }

    fn remove(&mut self, order_id: &str) {
        let Some(exposure) = self.entries.remove(order_id) else {
            return;
        };
        if let Some(total) = self.by_venue.get_mut(&exposure.venue) {
            *total -= exposure.notional;
        }
        if let Some(total) = self.by_symbol.get_mut(&exposure.symbol) {
            *total -= exposure.notional;
        }
        if let Some(total) = self.by_strategy.get_mut(&exposure.strategy) {
            *total -= exposure.notional;
        }
    }
}

/// Notional cap tables plus the live exposure book.
#[derive(Debug)]
pub struct NotionalCaps {
    cap_venue: HashMap<String, Decimal>,
    cap_symbol: HashMap<String, Decimal>,
    cap_strategy: HashMap<String, Decimal>,
    book: RwLock<BookInner>,
}

impl NotionalCaps {
    /// Create the cap checker from parsed cap maps.
    #[must_use]
    pub fn new(
        cap_venue: HashMap<String, Decimal>,
        cap_symbol: HashMap<String, Decimal>,
        cap_strategy: HashMap<String, Decimal>,
    ) -> Self {
        Self {
            cap_venue,
            cap_symbol,
            cap_strategy,
            book: RwLock::new(BookInner::default()),
        }
    }

    /// Whether any cap is configured at all.
    #[must_use]
    pub fn has_caps(&self) -> bool {
        !self.cap_venue.is_empty() || !self.cap_symbol.is_empty() || !self.cap_strategy.is_empty()
    }

    /// Record an accepted order's notional against its scopes.
    pub fn reserve(
        &self,
        order_id: &str,
        venue: &str,
        symbol: &str,
        strategy: &str,
        notional: Decimal,
    ) {
        if notional <= Decimal::ZERO {
            return;
        }
        if let Ok(mut book) = self.book.write() {
            book.add(
                order_id,
                Exposure {
                    venue: venue.to_string(),
                    symbol: symbol.to_string(),
                    strategy: strategy.to_string(),
                    notional,
                },
            );
        }
    }

    /// Release an order's recorded notional.
    pub fn release(&self, order_id: &str) {
        if let Ok(mut book) = self.book.write() {
            book.remove(order_id);
        }
    }

    /// Check an incoming intent notional against every configured cap.
    #[must_use]
    pub fn check(
        &self,
        venue: &str,
        symbol: &str,
        strategy: &str,
        add_notional: Decimal,
    ) -> GuardDecision {
        let Ok(book) = self.book.read() else {
            return GuardDecision::Allow;
        };
        let breaches = [
            (CapScope::Venue, self.cap_venue.get(venue), book.by_venue.get(venue)),
            (CapScope::Symbol, self.cap_symbol.get(symbol), book.by_symbol.get(symbol)),
            (
                CapScope::Strategy,
                self.cap_strategy.get(strategy),
                book.by_strategy.get(strategy),
            ),
        ];
        for (scope, cap, current) in breaches {
            let Some(cap) = cap else { continue };
            if *cap <= Decimal::ZERO {
                continue;
            }
            let current = current.copied().unwrap_or_default();
            if current + add_notional > *cap {
                return GuardDecision::block_with(
                    BlockReason::RiskBlocked(scope),
                    scope.detail(),
                );
            }
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn caps() -> NotionalCaps {
        let mut venue = HashMap::new();
        venue.insert("binance-um".to_string(), dec!(1000));
        let mut symbol = HashMap::new();
        symbol.insert("BTCUSDT".to_string(), dec!(500));
        let mut strategy = HashMap::new();
        strategy.insert("alpha".to_string(), dec!(300));
        NotionalCaps::new(venue, symbol, strategy)
    }

    #[test]
    fn venue_scope_wins_over_symbol_scope() {
        let caps = caps();
        caps.reserve("o1", "binance-um", "ETHUSDT", "beta", dec!(900));
        let decision = caps.check("binance-um", "BTCUSDT", "alpha", dec!(200));
        assert_eq!(
            decision,
            GuardDecision::block_with(
                BlockReason::RiskBlocked(CapScope::Venue),
                "venue_cap"
            )
        );
    }

    #[test]
    fn symbol_and_strategy_caps_bind() {
        let caps = caps();
        caps.reserve("o1", "okx-perp", "BTCUSDT", "beta", dec!(400));
        assert_eq!(
            caps.check("okx-perp", "BTCUSDT", "beta", dec!(200)),
            GuardDecision::block_with(
                BlockReason::RiskBlocked(CapScope::Symbol),
                "symbol_cap"
            )
        );
        assert_eq!(
            caps.check("okx-perp", "ETHUSDT", "alpha", dec!(400)),
            GuardDecision::block_with(
                BlockReason::RiskBlocked(CapScope::Strategy),
                "strategy_cap"
            )
        );
    }

    #[test]
    fn release_restores_headroom() {
        let caps = caps();
        caps.reserve("o1", "binance-um", "BTCUSDT", "alpha", dec!(300));
        assert!(!caps.check("binance-um", "BTCUSDT", "alpha", dec!(300)).is_allow());
        caps.release("o1");
        assert!(caps.check("binance-um", "BTCUSDT", "alpha", dec!(300)).is_allow());
    }

    #[test]
    fn unconfigured_scopes_pass() {
        let caps = NotionalCaps::new(HashMap::new(), HashMap::new(), HashMap::new());
        assert!(!caps.has_caps());
        assert!(caps.check("x", "Y", "z", dec!(1_000_000_000)).is_allow());
    }
}
