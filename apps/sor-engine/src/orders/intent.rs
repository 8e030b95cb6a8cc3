//! Trade intents as submitted by strategies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

impl Side {
    /// Lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Parse a case-insensitive side; `long`/`short` are accepted aliases.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::MissingField`] on anything else.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Self::Buy),
            "sell" | "short" => Ok(Self::Sell),
            _ => Err(DomainError::MissingField { field: "side" }),
        }
    }

    /// The opposing side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order pricing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Priced order.
    #[default]
    Limit,
    /// Marketable order; the reference price comes from the book.
    Market,
}

/// An immutable trade intent.
///
/// Intents are the input to [`crate::router::SmartOrderRouter::register_order`].
/// `ts_ns` and `nonce` feed the deterministic client order id; the remaining
/// fields feed the intent fingerprint used for dedup and outbox keying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Owning strategy identifier.
    pub strategy: String,
    /// Target venue identifier.
    pub venue: String,
    /// Trading symbol, venue-native.
    pub symbol: String,
    /// Direction.
    pub side: Side,
    /// Base quantity. Must be non-negative.
    pub qty: Decimal,
    /// Limit price; `None` for market orders.
    pub price: Option<Decimal>,
    /// Pricing type.
    #[serde(default)]
    pub order_type: OrderType,
    /// Maker-only submission.
    #[serde(default)]
    pub post_only: bool,
    /// Position-reducing submission.
    #[serde(default)]
    pub reduce_only: bool,
    /// Intent creation time in Unix nanoseconds.
    pub ts_ns: i64,
    /// Strategy-scoped nonce disambiguating repeated submissions.
    pub nonce: u64,
    /// Free-form tag carried through to the ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tag: Option<String>,
    /// Link to a parent order (arb legs share one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl OrderIntent {
    /// Minimal intent with the required fields; optional fields default off.
    #[must_use]
    pub fn new(
        strategy: impl Into<String>,
        venue: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        qty: Decimal,
        price: Option<Decimal>,
        ts_ns: i64,
        nonce: u64,
    ) -> Self {
        let order_type = if price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        Self {
            strategy: strategy.into(),
            venue: venue.into(),
            symbol: symbol.into(),
            side,
            qty,
            price,
            order_type,
            post_only: false,
            reduce_only: false,
            ts_ns,
            nonce,
            client_tag: None,
            parent_id: None,
        }
    }

    /// Quote-currency notional when a price is present.
    #[must_use]
    pub fn notional(&self) -> Option<Decimal> {
        self.price.map(|price| price * self.qty)
    }

    /// Validate the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] when strategy/venue/symbol are blank or the
    /// quantity is negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.strategy.trim().is_empty() {
            return Err(DomainError::MissingField { field: "strategy" });
        }
        if self.venue.trim().is_empty() {
            return Err(DomainError::MissingField { field: "venue" });
        }
        if self.symbol.trim().is_empty() {
            return Err(DomainError::MissingField { field: "symbol" });
        }
        if self.qty < Decimal::ZERO {
            return Err(DomainError::InvalidNumber { field: "qty" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_parsing_accepts_aliases() {
        assert_eq!(Side::parse("BUY").unwrap(), Side::Buy);
        assert_eq!(Side::parse("short").unwrap(), Side::Sell);
        assert!(Side::parse("hold").is_err());
    }

    #[test]
    fn notional_requires_price() {
        let mut intent = OrderIntent::new(
            "alpha",
            "binance-um",
            "BTCUSDT",
            Side::Buy,
            dec!(2),
            Some(dec!(25000)),
            1,
            1,
        );
        assert_eq!(intent.notional(), Some(dec!(50000)));
        intent.price = None;
        assert_eq!(intent.notional(), None);
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let intent = OrderIntent::new("", "binance-um", "BTCUSDT", Side::Buy, dec!(1), None, 1, 1);
        assert!(intent.validate().is_err());
    }
}
