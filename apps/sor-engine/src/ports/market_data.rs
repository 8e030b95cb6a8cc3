//! Market data lookup contract.

use thiserror::Error;

/// Best bid/offer for a (venue, symbol) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopOfBook {
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Wall-clock timestamp of the quote in Unix seconds.
    pub ts: f64,
}

impl TopOfBook {
    /// Midpoint price, 0 when either side is missing.
    #[must_use]
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            0.0
        }
    }
}

/// Errors from market data lookups.
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// The aggregator has never seen the (venue, symbol) pair.
    #[error("unknown market {venue}:{symbol}")]
    UnknownMarket {
        /// Venue identifier.
        venue: String,
        /// Trading symbol.
        symbol: String,
    },
}

/// Read-only market data source supplied by the host aggregator.
pub trait MarketDataSource: Send + Sync {
    /// Best bid/offer for the pair.
    ///
    /// # Errors
    ///
    /// Must fail with [`MarketDataError::UnknownMarket`] for unknown pairs
    /// rather than fabricating a quote.
    fn top_of_book(&self, venue: &str, symbol: &str) -> Result<TopOfBook, MarketDataError>;
}
