//! Strict pre-trade validation against symbol metadata.

use rust_decimal::Decimal;
use serde::Serialize;

use super::{BlockReason, GuardDecision};
use crate::metadata::SymbolMeta;
use crate::orders::intent::{OrderIntent, OrderType};

/// Pre-trade rejection details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PretradeViolation {
    /// Quantity missing or non-positive.
    QtyInvalid,
    /// Price missing or non-positive on a priced order.
    PriceInvalid,
    /// Quantity not a multiple of the step size.
    QtyStep,
    /// Price not a multiple of the tick size.
    PriceTick,
    /// Quantity below the venue minimum.
    MinQty,
    /// Notional below the venue minimum.
    MinNotional,
    /// No metadata available for the pair.
    NoMeta,
}

impl PretradeViolation {
    /// Detail token reported with the block.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QtyInvalid => "qty_invalid",
            Self::PriceInvalid => "price_invalid",
            Self::QtyStep => "qty_step",
            Self::PriceTick => "price_tick",
            Self::MinQty => "min_qty",
            Self::MinNotional => "min_notional",
            Self::NoMeta => "no_meta",
        }
    }
}

fn is_multiple_of(value: Decimal, quantum: Decimal) -> bool {
    if quantum <= Decimal::ZERO {
        return true;
    }
    (value % quantum).is_zero()
}

/// Validate an intent against venue metadata.
///
/// # Errors
///
/// Returns the first [`PretradeViolation`] in check order: quantity,
/// price, step, tick, minimum quantity, minimum notional.
pub fn validate_pretrade(
    meta: Option<&SymbolMeta>,
    intent: &OrderIntent,
) -> Result<(), PretradeViolation> {
    let Some(meta) = meta else {
        return Err(PretradeViolation::NoMeta);
    };
    if intent.qty <= Decimal::ZERO {
        return Err(PretradeViolation::QtyInvalid);
    }
    let price_required = intent.order_type == OrderType::Limit;
    match intent.price {
        Some(price) if price <= Decimal::ZERO => return Err(PretradeViolation::PriceInvalid),
        None if price_required => return Err(PretradeViolation::PriceInvalid),
        _ => {}
    }
    if !is_multiple_of(intent.qty, meta.step_size) {
        return Err(PretradeViolation::QtyStep);
    }
    if let Some(price) = intent.price {
        if !is_multiple_of(price, meta.tick_size) {
            return Err(PretradeViolation::PriceTick);
        }
    }
    if let Some(min_qty) = meta.min_qty {
        if intent.qty < min_qty {
            return Err(PretradeViolation::MinQty);
        }
    }
    if let (Some(min_notional), Some(notional)) = (meta.min_notional, intent.notional()) {
        if notional < min_notional {
            return Err(PretradeViolation::MinNotional);
        }
    }
    Ok(())
}

/// Guard wrapper around [`validate_pretrade`].
#[must_use]
pub fn check_pretrade(meta: Option<&SymbolMeta>, intent: &OrderIntent) -> GuardDecision {
    match validate_pretrade(meta, intent) {
        Ok(()) => GuardDecision::Allow,
        Err(violation) => {
            GuardDecision::block_with(BlockReason::PretradeRejected, violation.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::intent::Side;
    use rust_decimal_macros::dec;

    fn meta() -> SymbolMeta {
        SymbolMeta {
            tick_size: dec!(0.1),
            step_size: dec!(0.001),
            min_notional: Some(dec!(10)),
            min_qty: Some(dec!(0.001)),
        }
    }

    fn intent(qty: Decimal, price: Option<Decimal>) -> OrderIntent {
        OrderIntent::new("alpha", "binance-um", "BTCUSDT", Side::Buy, qty, price, 1, 1)
    }

    #[test]
    fn valid_order_passes() {
        let order = intent(dec!(2), Some(dec!(25000.0)));
        assert!(validate_pretrade(Some(&meta()), &order).is_ok());
    }

    #[test]
    fn missing_meta_rejects() {
        let order = intent(dec!(2), Some(dec!(25000.0)));
        assert_eq!(
            validate_pretrade(None, &order),
            Err(PretradeViolation::NoMeta)
        );
    }

    #[test]
    fn qty_and_price_sanity() {
        assert_eq!(
            validate_pretrade(Some(&meta()), &intent(dec!(0), Some(dec!(100)))),
            Err(PretradeViolation::QtyInvalid)
        );
        assert_eq!(
            validate_pretrade(Some(&meta()), &intent(dec!(1), Some(dec!(-1)))),
            Err(PretradeViolation::PriceInvalid)
        );
        let mut market = intent(dec!(1), None);
        market.order_type = OrderType::Limit;
        assert_eq!(
            validate_pretrade(Some(&meta()), &market),
            Err(PretradeViolation::PriceInvalid)
        );
    }

    #[test]
    fn step_and_tick_multiples() {
        assert_eq!(
            validate_pretrade(Some(&meta()), &intent(dec!(0.0015), Some(dec!(100)))),
            Err(PretradeViolation::QtyStep)
        );
        assert_eq!(
            validate_pretrade(Some(&meta()), &intent(dec!(1), Some(dec!(100.05)))),
            Err(PretradeViolation::PriceTick)
        );
    }

    #[test]
    fn venue_minimums() {
        let mut tight = meta();
        tight.min_qty = Some(dec!(1));
        assert_eq!(
            validate_pretrade(Some(&tight), &intent(dec!(0.5), Some(dec!(100)))),
            Err(PretradeViolation::MinQty)
        );
        assert_eq!(
            validate_pretrade(Some(&meta()), &intent(dec!(0.001), Some(dec!(100)))),
            Err(PretradeViolation::MinNotional)
        );
    }

    #[test]
    fn market_orders_skip_price_checks() {
        let order = intent(dec!(1), None);
        assert!(validate_pretrade(Some(&meta()), &order).is_ok());
    }
}
