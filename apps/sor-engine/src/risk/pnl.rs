//! Realized PnL aggregation and daily loss / drawdown caps.
//!
//! The aggregator buckets realized PnL by calendar day in the configured
//! timezone, per scope (`global` plus one scope per strategy). The guard
//! blocks submissions when a scope breaches its daily-loss or intraday
//! drawdown cap and holds the block through a scope-local cooloff.
//!
//! Caps use decimal arithmetic end to end; only exported gauges downcast.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::guards::{BlockReason, GuardDecision};
use crate::observability::metrics as obs;
use crate::orders::intent::Side;

/// Scope key for the process-wide bucket.
pub const GLOBAL_SCOPE: &str = "global";

/// A realized-PnL observation attributed to a strategy.
#[derive(Debug, Clone, Serialize)]
pub struct FillEvent {
    /// Wall-clock time of the fill, Unix seconds.
    pub ts: f64,
    /// Strategy that owns the order.
    pub strategy: String,
    /// Symbol traded.
    pub symbol: String,
    /// Realized PnL in USD attributed to this fill.
    pub realized_pnl_usd: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScopePnl {
    realized: Decimal,
    peak: Decimal,
}

#[derive(Debug, Default)]
struct AggregatorInner {
    day: Option<NaiveDate>,
    scopes: HashMap<String, ScopePnl>,
}

/// Per-day, per-scope realized PnL aggregation.
#[derive(Debug)]
pub struct PnlAggregator {
    tz: Tz,
    inner: RwLock<AggregatorInner>,
}

impl PnlAggregator {
    /// Create an aggregator anchored to the named timezone.
    ///
    /// Unknown names fall back to UTC with a warning.
    #[must_use]
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(tz = tz_name, "unknown PNL_TZ, falling back to UTC");
            chrono_tz::UTC
        });
        Self {
            tz,
            inner: RwLock::new(AggregatorInner::default()),
        }
    }

    fn date_of(&self, ts: f64) -> Option<NaiveDate> {
        DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.with_timezone(&self.tz).date_naive())
    }

    /// Roll the day bucket forward if `ts` falls on a new calendar day.
    pub fn roll_to(&self, ts: f64) {
        let Some(date) = self.date_of(ts) else {
            return;
        };
        if let Ok(mut inner) = self.inner.write() {
            if inner.day != Some(date) {
                inner.day = Some(date);
                inner.scopes.clear();
            }
        }
    }

    /// Record a fill into the global and per-strategy scopes.
    pub fn on_fill(&self, event: &FillEvent) {
        self.roll_to(event.ts);
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        for scope in [GLOBAL_SCOPE, event.strategy.as_str()] {
            let bucket = inner.scopes.entry(scope.to_string()).or_default();
            bucket.realized += event.realized_pnl_usd;
            if bucket.realized > bucket.peak {
                bucket.peak = bucket.realized;
            }
        }
        let global_loss = inner
            .scopes
            .get(GLOBAL_SCOPE)
            .map(|bucket| (-bucket.realized).max(Decimal::ZERO))
            .unwrap_or_default();
        drop(inner);
        obs::set_daily_loss(GLOBAL_SCOPE, global_loss.to_f64().unwrap_or(0.0));
    }

    /// Realized PnL for the scope today (signed).
    #[must_use]
    pub fn daily_realized(&self, scope: &str) -> Decimal {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.scopes.get(scope).map(|bucket| bucket.realized))
            .unwrap_or_default()
    }

    /// Realized loss for the scope today, floored at zero.
    #[must_use]
    pub fn daily_loss(&self, scope: &str) -> Decimal {
        (-self.daily_realized(scope)).max(Decimal::ZERO)
    }

    /// Drawdown from the intraday realized peak, floored at zero.
    #[must_use]
    pub fn intraday_drawdown(&self, scope: &str) -> Decimal {
        self.inner
            .read()
            .ok()
            .and_then(|inner| {
                inner
                    .scopes
                    .get(scope)
                    .map(|bucket| (bucket.peak - bucket.realized).max(Decimal::ZERO))
            })
            .unwrap_or_default()
    }
}

/// Daily-loss and drawdown caps with scope-local cooloff.
#[derive(Debug)]
pub struct PnlCapsGuard {
    daily_caps: HashMap<String, Decimal>,
    drawdown_caps: HashMap<String, Decimal>,
    cooloff_seconds: f64,
    cooloffs: RwLock<HashMap<String, (f64, String)>>,
}

impl PnlCapsGuard {
    /// Create the guard from scoped cap maps and a cooloff in minutes.
    #[must_use]
    pub fn new(
        daily_caps: HashMap<String, Decimal>,
        drawdown_caps: HashMap<String, Decimal>,
        cooloff_minutes: f64,
    ) -> Self {
        Self {
            daily_caps,
            drawdown_caps,
            cooloff_seconds: cooloff_minutes * 60.0,
            cooloffs: RwLock::new(HashMap::new()),
        }
    }

    fn cap_for(map: &HashMap<String, Decimal>, scope: &str) -> Option<Decimal> {
        map.get(scope).copied().filter(|cap| *cap > Decimal::ZERO)
    }

    fn breach_detail(
        &self,
        aggregator: &PnlAggregator,
        scope: &str,
    ) -> Option<String> {
        if let Some(cap) = Self::cap_for(&self.daily_caps, scope) {
            if aggregator.daily_loss(scope) > cap {
                return Some(format!("daily-loss-cap-{scope}"));
            }
        }
        if let Some(cap) = Self::cap_for(&self.drawdown_caps, scope) {
            if aggregator.intraday_drawdown(scope) > cap {
                return Some(format!("intraday-drawdown-{scope}"));
            }
        }
        None
    }

    /// Check the global scope and the strategy scope.
    ///
    /// A breach engages the scope's cooloff; an unexpired cooloff blocks
    /// even after the underlying number recovers.
    #[must_use]
    pub fn check(&self, aggregator: &PnlAggregator, strategy: &str, now: f64) -> GuardDecision {
        aggregator.roll_to(now);
        for scope in [GLOBAL_SCOPE, strategy] {
            if let Some(detail) = self.breach_detail(aggregator, scope) {
                if let Ok(mut cooloffs) = self.cooloffs.write() {
                    cooloffs.insert(
                        scope.to_string(),
                        (now + self.cooloff_seconds, detail.clone()),
                    );
                }
                obs::record_pnl_cap_block(&detail, strategy);
                tracing::warn!(scope, strategy, detail = %detail, "pnl cap engaged");
                return GuardDecision::block_with(BlockReason::PnlCap, detail);
            }
            let active = self
                .cooloffs
                .read()
                .ok()
                .and_then(|cooloffs| cooloffs.get(scope).cloned())
                .filter(|(until, _)| now < *until);
            if let Some((_, detail)) = active {
                obs::record_pnl_cap_block(&detail, strategy);
                return GuardDecision::block_with(BlockReason::PnlCap, detail);
            }
        }
        GuardDecision::Allow
    }
}

// ---------------------------------------------------------------------------
// Realized / unrealized PnL folding over raw fills
// ---------------------------------------------------------------------------

/// A raw fill for average-cost PnL folding.
#[derive(Debug, Clone)]
pub struct Fill {
    /// Symbol traded.
    pub symbol: String,
    /// Fill quantity (positive).
    pub qty: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Direction.
    pub side: Side,
    /// Fee charged, deducted from realized PnL.
    pub fee: Decimal,
    /// Fill time, Unix seconds; unknown times sort last.
    pub ts: Option<f64>,
}

/// An open position for mark-to-market valuation.
#[derive(Debug, Clone)]
pub struct Position {
    /// Symbol held.
    pub symbol: String,
    /// Signed position quantity.
    pub qty: Decimal,
    /// Average entry price.
    pub avg_entry: Decimal,
}

/// Fold fills into realized PnL using average-cost accounting.
///
/// Fills sort by timestamp (unknown timestamps last); crossing fills
/// realize against the average entry, same-direction fills re-average.
#[must_use]
pub fn compute_realized_pnl(fills: &[Fill]) -> Decimal {
    #[derive(Default, Clone, Copy)]
    struct SymbolState {
        qty: Decimal,
        avg: Decimal,
    }

    let mut ordered: Vec<&Fill> = fills.iter().collect();
    ordered.sort_by(|a, b| match (a.ts, b.ts) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut state: HashMap<String, SymbolState> = HashMap::new();
    let mut realized = Decimal::ZERO;
    for fill in ordered {
        if fill.symbol.is_empty() || fill.qty <= Decimal::ZERO {
            realized -= fill.fee;
            continue;
        }
        let entry = state.entry(fill.symbol.to_ascii_uppercase()).or_default();
        let signed_qty = match fill.side {
            Side::Buy => fill.qty,
            Side::Sell => -fill.qty,
        };
        let position_qty = entry.qty;
        if position_qty.is_zero() || position_qty * signed_qty > Decimal::ZERO {
            let new_qty = position_qty + signed_qty;
            if new_qty.is_zero() {
                *entry = SymbolState::default();
            } else {
                let total_cost = entry.avg * position_qty + fill.price * signed_qty;
                entry.qty = new_qty;
                entry.avg = total_cost / new_qty;
            }
        } else {
            let close_qty = position_qty.abs().min(signed_qty.abs());
            let direction = if position_qty > Decimal::ZERO {
                Decimal::ONE
            } else {
                -Decimal::ONE
            };
            realized += (fill.price - entry.avg) * close_qty * direction;
            let new_qty = position_qty + signed_qty;
            if new_qty.is_zero() {
                *entry = SymbolState::default();
            } else if position_qty * new_qty > Decimal::ZERO {
                entry.qty = new_qty;
            } else {
                entry.qty = new_qty;
                entry.avg = fill.price;
            }
        }
        realized -= fill.fee;
    }
    realized
}

/// Mark open positions against the provided marks.
#[must_use]
pub fn compute_unrealized_pnl(
    positions: &[Position],
    marks: &HashMap<String, Decimal>,
) -> Decimal {
    let mut unrealized = Decimal::ZERO;
    for position in positions {
        if position.qty.is_zero() {
            continue;
        }
        let Some(mark) = marks.get(&position.symbol) else {
            continue;
        };
        unrealized += (*mark - position.avg_entry) * position.qty;
    }
    unrealized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill_event(ts: f64, strategy: &str, pnl: Decimal) -> FillEvent {
        FillEvent {
            ts,
            strategy: strategy.to_string(),
            symbol: "BTCUSDT".to_string(),
            realized_pnl_usd: pnl,
        }
    }

    #[test]
    fn losses_accumulate_per_scope() {
        let agg = PnlAggregator::new("UTC");
        agg.on_fill(&fill_event(1_704_067_200.0, "alpha", dec!(-30)));
        agg.on_fill(&fill_event(1_704_067_210.0, "beta", dec!(-25)));
        assert_eq!(agg.daily_loss(GLOBAL_SCOPE), dec!(55));
        assert_eq!(agg.daily_loss("alpha"), dec!(30));
        assert_eq!(agg.daily_loss("beta"), dec!(25));
    }

    #[test]
    fn day_boundary_resets_buckets() {
        let agg = PnlAggregator::new("UTC");
        agg.on_fill(&fill_event(1_704_067_200.0, "alpha", dec!(-30)));
        // Next day in UTC.
        agg.on_fill(&fill_event(1_704_067_200.0 + 86_400.0, "alpha", dec!(-5)));
        assert_eq!(agg.daily_loss(GLOBAL_SCOPE), dec!(5));
    }

    #[test]
    fn drawdown_tracks_the_peak() {
        let agg = PnlAggregator::new("UTC");
        agg.on_fill(&fill_event(1_704_067_200.0, "alpha", dec!(40)));
        agg.on_fill(&fill_event(1_704_067_201.0, "alpha", dec!(-70)));
        assert_eq!(agg.intraday_drawdown(GLOBAL_SCOPE), dec!(70));
        assert_eq!(agg.daily_loss(GLOBAL_SCOPE), dec!(30));
    }

    #[test]
    fn cap_trip_engages_cooloff_until_recovery() {
        let agg = PnlAggregator::new("UTC");
        let mut daily = HashMap::new();
        daily.insert(GLOBAL_SCOPE.to_string(), dec!(50));
        let guard = PnlCapsGuard::new(daily, HashMap::new(), 1.0);
        let start = 1_704_067_200.0;

        agg.on_fill(&fill_event(start, "auto_hedge", dec!(-55)));
        let decision = guard.check(&agg, "auto_hedge", start + 1.0);
        assert_eq!(
            decision,
            GuardDecision::block_with(BlockReason::PnlCap, "daily-loss-cap-global")
        );

        // Cooloff expired but the loss is still above the cap: re-blocked.
        let decision = guard.check(&agg, "auto_hedge", start + 62.0);
        assert!(!decision.is_allow());

        // Recovery trading below the cap after cooloff expiry passes.
        agg.on_fill(&fill_event(start + 63.0, "auto_hedge", dec!(15)));
        let decision = guard.check(&agg, "auto_hedge", start + 125.0);
        assert!(decision.is_allow());
    }

    #[test]
    fn realized_pnl_folding_matches_average_cost() {
        let fills = vec![
            Fill {
                symbol: "BTCUSDT".into(),
                qty: dec!(1),
                price: dec!(100),
                side: Side::Buy,
                fee: dec!(0),
                ts: Some(1.0),
            },
            Fill {
                symbol: "BTCUSDT".into(),
                qty: dec!(1),
                price: dec!(110),
                side: Side::Buy,
                fee: dec!(0),
                ts: Some(2.0),
            },
            Fill {
                symbol: "BTCUSDT".into(),
                qty: dec!(2),
                price: dec!(120),
                side: Side::Sell,
                fee: dec!(1),
                ts: Some(3.0),
            },
        ];
        // Average entry 105, close 2 @ 120 → +30, minus 1 fee.
        assert_eq!(compute_realized_pnl(&fills), dec!(29));
    }

    #[test]
    fn short_positions_realize_on_buybacks() {
        let fills = vec![
            Fill {
                symbol: "ETHUSDT".into(),
                qty: dec!(2),
                price: dec!(100),
                side: Side::Sell,
                fee: dec!(0),
                ts: Some(1.0),
            },
            Fill {
                symbol: "ETHUSDT".into(),
                qty: dec!(2),
                price: dec!(90),
                side: Side::Buy,
                fee: dec!(0),
                ts: Some(2.0),
            },
        ];
        assert_eq!(compute_realized_pnl(&fills), dec!(20));
    }

    #[test]
    fn unrealized_marks_open_positions() {
        let positions = vec![Position {
            symbol: "BTCUSDT".into(),
            qty: dec!(2),
            avg_entry: dec!(100),
        }];
        let mut marks = HashMap::new();
        marks.insert("BTCUSDT".to_string(), dec!(110));
        assert_eq!(compute_unrealized_pnl(&positions, &marks), dec!(20));
    }
}
