//! Venue scoring by total expected execution cost.
//!
//! `cost = base_effective_cost + impact_penalty + latency_penalty`, all in
//! quote currency (USDT). Base cost applies the resolved fee schedule to
//! the notional; the impact penalty grows with the notional/liquidity
//! ratio; the latency penalty converts excess REST/WS latency into bps.
//! Selection is min-cost with a lexicographic tie-break on the venue name.
//!
//! Costs are floats by design: they rank venues and feed telemetry, they
//! never settle money.

use serde::Serialize;

use crate::config::ScorerConfig;
use crate::orders::intent::Side;

/// Inputs for scoring one venue.
#[derive(Debug, Clone)]
pub struct VenueQuote {
    /// Venue identifier.
    pub venue: String,
    /// Side-aware reference price (ask for buys, bid for sells).
    pub price: f64,
    /// Top-of-book liquidity in quote currency, when known.
    pub book_liquidity_usdt: Option<f64>,
    /// REST round-trip latency in milliseconds.
    pub rest_latency_ms: f64,
    /// Websocket staleness/latency in milliseconds.
    pub ws_latency_ms: f64,
}

/// Detailed score for one venue.
#[derive(Debug, Clone, Serialize)]
pub struct VenueScore {
    /// Venue identifier.
    pub venue: String,
    /// Total expected cost in USDT; infeasible venues score infinity.
    pub cost_usdt: f64,
    /// Quote-currency notional of the scored order.
    pub notional_usdt: f64,
    /// Fee component of the cost.
    pub base_cost_usdt: f64,
    /// Impact penalty component.
    pub impact_penalty_usdt: f64,
    /// Latency penalty component.
    pub latency_penalty_usdt: f64,
    /// Latency penalty expressed in bps.
    pub latency_bps: f64,
    /// Set when the venue could not be scored.
    pub error: Option<&'static str>,
}

impl VenueScore {
    fn infeasible(venue: String, error: &'static str) -> Self {
        Self {
            venue,
            cost_usdt: f64::INFINITY,
            notional_usdt: 0.0,
            base_cost_usdt: 0.0,
            impact_penalty_usdt: 0.0,
            latency_penalty_usdt: 0.0,
            latency_bps: 0.0,
            error: Some(error),
        }
    }
}

/// Deterministic venue ranking by expected cost.
#[derive(Debug, Clone)]
pub struct VenueScorer {
    config: ScorerConfig,
}

impl VenueScorer {
    /// Create a scorer from configuration.
    #[must_use]
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score a single venue for the given side/qty.
    #[must_use]
    pub fn score(&self, quote: &VenueQuote, _side: Side, qty: f64) -> VenueScore {
        if quote.price <= 0.0 || qty <= 0.0 {
            return VenueScore::infeasible(quote.venue.clone(), "price_or_qty_invalid");
        }
        let notional = quote.price * qty;
        let liquidity = match quote.book_liquidity_usdt {
            Some(value) if value > 0.0 => value,
            // Unknown depth: assume the book can absorb twice the order.
            _ => (notional * 2.0).max(f64::MIN_POSITIVE),
        };
        if liquidity <= 0.0 {
            return VenueScore::infeasible(quote.venue.clone(), "no_liquidity");
        }

        let fees = self.config.fees.resolve(&quote.venue);
        let fee_bps = if self.config.prefer_maker {
            fees.maker_bps
        } else {
            fees.taker_bps
        } - fees.vip_rebate_bps;
        let base_cost = notional * fee_bps / 10_000.0;

        let impact_bps = self.config.impact_k * (notional / liquidity) * 10_000.0;
        let impact_penalty = (notional * impact_bps / 10_000.0).max(0.0);

        let over_rest = (quote.rest_latency_ms.max(0.0) - self.config.latency_target_ms).max(0.0);
        let over_ws = (quote.ws_latency_ms.max(0.0) - self.config.latency_target_ms).max(0.0);
        let latency_bps = self.config.latency_bps_per_ms * (over_rest + over_ws);
        let latency_penalty = (notional * latency_bps / 10_000.0).max(0.0);

        VenueScore {
            venue: quote.venue.clone(),
            cost_usdt: base_cost + impact_penalty + latency_penalty,
            notional_usdt: notional,
            base_cost_usdt: base_cost,
            impact_penalty_usdt: impact_penalty,
            latency_penalty_usdt: latency_penalty,
            latency_bps,
            error: None,
        }
    }

    /// Score every candidate and return the winner with the full table.
    ///
    /// Ties inside a 1e-9 tolerance resolve to the lexicographically
    /// smaller venue name so routing stays deterministic across runs.
    #[must_use]
    pub fn choose(
        &self,
        quotes: &[VenueQuote],
        side: Side,
        qty: f64,
    ) -> (Option<String>, Vec<VenueScore>) {
        let mut scores = Vec::with_capacity(quotes.len());
        let mut best: Option<(String, f64)> = None;
        for quote in quotes {
            let score = self.score(quote, side, qty);
            let candidate = (score.venue.clone(), score.cost_usdt);
            best = match best {
                None => Some(candidate),
                Some((best_venue, best_cost)) => {
                    let close = approx_equal(candidate.1, best_cost);
                    if (candidate.1 < best_cost && !close)
                        || (close && candidate.0 < best_venue)
                    {
                        Some(candidate)
                    } else {
                        Some((best_venue, best_cost))
                    }
                }
            };
            scores.push(score);
        }
        let winner = best
            .filter(|(_, cost)| cost.is_finite())
            .map(|(venue, _)| venue);
        (winner, scores)
    }
}

fn approx_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= 1e-9_f64.max(scale * 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeesConfig, VenueFees};
    use std::collections::HashMap;

    fn scorer(latency_weight: f64, fees: HashMap<String, VenueFees>) -> VenueScorer {
        VenueScorer::new(ScorerConfig {
            latency_bps_per_ms: latency_weight,
            latency_target_ms: 200.0,
            impact_k: 0.0,
            prefer_maker: false,
            fees: FeesConfig {
                manual: fees,
                default_taker_bps: 2.0,
            },
        })
    }

    fn quote(venue: &str, price: f64, liq: f64, rest: f64, ws: f64) -> VenueQuote {
        VenueQuote {
            venue: venue.to_string(),
            price,
            book_liquidity_usdt: Some(liq),
            rest_latency_ms: rest,
            ws_latency_ms: ws,
        }
    }

    #[test]
    fn prefers_low_latency_at_equal_fees() {
        let scorer = scorer(0.01, HashMap::new());
        let quotes = vec![
            quote("binance-um", 101.0, 5_000_000.0, 12.0, 5.0),
            quote("okx-perp", 101.1, 25_000.0, 220.0, 260.0),
        ];
        let (best, scores) = scorer.choose(&quotes, Side::Buy, 1.0);
        assert_eq!(best.as_deref(), Some("binance-um"));
        assert!(scores[0].cost_usdt < scores[1].cost_usdt);
    }

    #[test]
    fn latency_penalty_can_outweigh_a_rebate() {
        let mut fees = HashMap::new();
        fees.insert(
            "binance-um".to_string(),
            VenueFees { maker_bps: 0.5, taker_bps: 2.5, vip_rebate_bps: 0.0 },
        );
        fees.insert(
            "okx-perp".to_string(),
            VenueFees { maker_bps: 0.0, taker_bps: -2.0, vip_rebate_bps: 0.5 },
        );
        let scorer = scorer(0.05, fees);
        let quotes = vec![
            quote("binance-um", 100.0, 2_000_000.0, 30.0, 20.0),
            quote("okx-perp", 100.0, 2_000_000.0, 950.0, 980.0),
        ];
        let (best, scores) = scorer.choose(&quotes, Side::Sell, 1.5);
        assert_eq!(best.as_deref(), Some("binance-um"));
        assert!(scores[1].cost_usdt > scores[0].cost_usdt);
    }

    #[test]
    fn exact_ties_break_lexicographically() {
        let scorer = scorer(0.0, HashMap::new());
        let quotes = vec![
            quote("okx-perp", 100.0, 1_000_000.0, 100.0, 100.0),
            quote("binance-um", 100.0, 1_000_000.0, 100.0, 100.0),
        ];
        let (best, _) = scorer.choose(&quotes, Side::Buy, 1.0);
        assert_eq!(best.as_deref(), Some("binance-um"));
    }

    #[test]
    fn infeasible_quotes_score_infinity() {
        let scorer = scorer(0.01, HashMap::new());
        let score = scorer.score(&quote("binance-um", 0.0, 1_000.0, 0.0, 0.0), Side::Buy, 1.0);
        assert!(score.cost_usdt.is_infinite());
        assert_eq!(score.error, Some("price_or_qty_invalid"));
        let (best, _) = scorer.choose(
            &[quote("binance-um", 0.0, 1_000.0, 0.0, 0.0)],
            Side::Buy,
            1.0,
        );
        assert!(best.is_none());
    }

    #[test]
    fn liquidity_falls_back_to_twice_notional() {
        let mut config = ScorerConfig::default();
        config.impact_k = 1.0;
        config.fees.default_taker_bps = 0.0;
        let scorer = VenueScorer::new(config);
        let quote = VenueQuote {
            venue: "binance-um".to_string(),
            price: 100.0,
            book_liquidity_usdt: None,
            rest_latency_ms: 0.0,
            ws_latency_ms: 0.0,
        };
        let score = scorer.score(&quote, Side::Buy, 1.0);
        // notional/liquidity = 0.5 with the fallback, k=1 → 5000 bps on 100.
        assert!((score.impact_penalty_usdt - 50.0).abs() < 1e-9);
    }
}
