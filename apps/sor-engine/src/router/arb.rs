//! Inter-venue arbitrage planning.
//!
//! For a symbol quoted on several venues, find the ordered pair with the
//! best net edge: buy at the cheaper ask, sell into the dearer bid, net
//! of taker fees on both legs, a slippage allowance, and (when enabled)
//! the funding drag of holding the pair.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;

use crate::config::{ArbConfig, FeesConfig};
use crate::ports::TopOfBook;

/// A planned two-leg arbitrage submission.
#[derive(Debug, Clone, Serialize)]
pub struct ArbPlan {
    /// Symbol traded on both legs.
    pub symbol: String,
    /// Venue bought (long leg).
    pub long_venue: String,
    /// Venue sold (short leg).
    pub short_venue: String,
    /// Ask paid on the long leg.
    pub buy_price: f64,
    /// Bid hit on the short leg.
    pub sell_price: f64,
    /// Midpoint used for bps conversion.
    pub mid: f64,
    /// Gross edge in bps before costs.
    pub gross_edge_bps: f64,
    /// Taker fees across both legs in bps.
    pub fees_bps: f64,
    /// Funding drag in bps (zero when the funding router is off).
    pub funding_bps: f64,
    /// Net edge in bps after fees, slippage allowance and funding.
    pub net_edge_bps: f64,
    /// Per-leg base quantity.
    pub qty: Decimal,
    /// Target notional per leg in quote currency.
    pub notional_usdt: Decimal,
}

/// Build the best-edge plan across the candidate venues.
///
/// `quotes` maps venue → top of book; venues missing a usable bid/ask are
/// skipped. `funding` maps venue → current funding rate (fraction per
/// funding interval) and only matters when `funding_enabled`. Returns
/// `None` when fewer than two venues produce usable quotes.
#[must_use]
pub fn compute_arb_plan(
    symbol: &str,
    notional_usdt: Decimal,
    quotes: &HashMap<String, TopOfBook>,
    fees: &FeesConfig,
    funding: &HashMap<String, f64>,
    funding_enabled: bool,
    config: &ArbConfig,
) -> Option<ArbPlan> {
    let mut best: Option<ArbPlan> = None;
    for long_venue in &config.venues {
        let Some(long_quote) = quotes.get(long_venue) else {
            continue;
        };
        if long_quote.ask <= 0.0 {
            continue;
        }
        for short_venue in &config.venues {
            if short_venue == long_venue {
                continue;
            }
            let Some(short_quote) = quotes.get(short_venue) else {
                continue;
            };
            if short_quote.bid <= 0.0 {
                continue;
            }
            let buy_price = long_quote.ask;
            let sell_price = short_quote.bid;
            let mid = (buy_price + sell_price) / 2.0;
            if mid <= 0.0 {
                continue;
            }
            let gross_edge_bps = (sell_price - buy_price) / mid * 10_000.0;
            let fees_bps =
                fees.resolve(long_venue).taker_bps + fees.resolve(short_venue).taker_bps;
            let funding_bps = if funding_enabled {
                let long_rate = funding.get(long_venue).copied().unwrap_or(0.0);
                let short_rate = funding.get(short_venue).copied().unwrap_or(0.0);
                // Long pays positive funding, short receives it.
                (long_rate - short_rate) * 10_000.0
            } else {
                0.0
            };
            let net_edge_bps =
                gross_edge_bps - fees_bps - config.max_leg_slippage_bps - funding_bps;
            let qty = Decimal::from_f64(buy_price)
                .filter(|price| !price.is_zero())
                .map(|price| (notional_usdt / price).round_dp(8))
                .unwrap_or_default();
            let plan = ArbPlan {
                symbol: symbol.to_string(),
                long_venue: long_venue.clone(),
                short_venue: short_venue.clone(),
                buy_price,
                sell_price,
                mid,
                gross_edge_bps,
                fees_bps,
                funding_bps,
                net_edge_bps,
                qty,
                notional_usdt,
            };
            let better = best
                .as_ref()
                .is_none_or(|current| plan.net_edge_bps > current.net_edge_bps);
            if better {
                best = Some(plan);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quotes(a_bid: f64, a_ask: f64, b_bid: f64, b_ask: f64) -> HashMap<String, TopOfBook> {
        let mut map = HashMap::new();
        map.insert("venue-a".to_string(), TopOfBook { bid: a_bid, ask: a_ask, ts: 0.0 });
        map.insert("venue-b".to_string(), TopOfBook { bid: b_bid, ask: b_ask, ts: 0.0 });
        map
    }

    fn config() -> ArbConfig {
        ArbConfig {
            venues: vec!["venue-a".to_string(), "venue-b".to_string()],
            min_edge_bps: 1.0,
            max_leg_slippage_bps: 0.0,
        }
    }

    fn fees(taker_bps: f64) -> FeesConfig {
        FeesConfig {
            manual: HashMap::new(),
            default_taker_bps: taker_bps,
        }
    }

    #[test]
    fn crossed_books_produce_a_positive_edge() {
        // A asks 100.0, B bids 100.5: buy A, sell B.
        let plan = compute_arb_plan(
            "BTCUSDT",
            dec!(1000),
            &quotes(99.9, 100.0, 100.5, 100.2),
            &fees(2.0),
            &HashMap::new(),
            false,
            &config(),
        )
        .unwrap();
        assert_eq!(plan.long_venue, "venue-a");
        assert_eq!(plan.short_venue, "venue-b");
        assert!(plan.gross_edge_bps > 0.0);
        assert!(plan.net_edge_bps > 0.0);
        assert!(plan.qty > Decimal::ZERO);
    }

    #[test]
    fn flat_books_net_out_negative() {
        let plan = compute_arb_plan(
            "BTCUSDT",
            dec!(1000),
            &quotes(99.9, 100.0, 99.9, 100.0),
            &fees(2.0),
            &HashMap::new(),
            false,
            &config(),
        )
        .unwrap();
        assert!(plan.net_edge_bps < 0.0);
    }

    #[test]
    fn funding_drag_reduces_the_edge() {
        let mut funding = HashMap::new();
        funding.insert("venue-a".to_string(), 0.0002);
        funding.insert("venue-b".to_string(), -0.0001);
        let baseline = compute_arb_plan(
            "BTCUSDT",
            dec!(1000),
            &quotes(99.9, 100.0, 100.5, 100.2),
            &fees(0.0),
            &funding,
            false,
            &config(),
        )
        .unwrap();
        let with_funding = compute_arb_plan(
            "BTCUSDT",
            dec!(1000),
            &quotes(99.9, 100.0, 100.5, 100.2),
            &fees(0.0),
            &funding,
            true,
            &config(),
        )
        .unwrap();
        assert!(with_funding.net_edge_bps < baseline.net_edge_bps);
        assert!((with_funding.funding_bps - 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_quotes_yield_no_plan() {
        let plan = compute_arb_plan(
            "BTCUSDT",
            dec!(1000),
            &HashMap::new(),
            &fees(2.0),
            &HashMap::new(),
            false,
            &config(),
        );
        assert!(plan.is_none());
    }
}
