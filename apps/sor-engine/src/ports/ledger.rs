//! Ledger sink contract and the default no-op implementation.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::orders::intent::Side;
use crate::orders::state::OrderState;

/// Order row handed to the ledger on acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    /// Client order id.
    pub coid: String,
    /// Owning strategy.
    pub strategy: String,
    /// Venue identifier.
    pub venue: String,
    /// Trading symbol.
    pub symbol: String,
    /// Direction.
    pub side: Side,
    /// Requested quantity.
    pub qty: Decimal,
    /// Limit price, when present.
    pub price: Option<Decimal>,
    /// Submission time, Unix nanoseconds.
    pub ts_ns: i64,
}

/// Fill row handed to the ledger on (partial) fills.
#[derive(Debug, Clone, Serialize)]
pub struct FillRecord {
    /// Client order id.
    pub coid: String,
    /// Fill quantity for this event.
    pub qty: Decimal,
    /// Realized PnL attributed to the fill, when the host reports it.
    pub realized_pnl_usd: Option<Decimal>,
    /// Event time, Unix nanoseconds.
    pub ts_ns: i64,
}

/// Callback surface for the host's persistent ledger.
///
/// Implementations must be cheap and non-blocking: the facade invokes
/// these while it is between lock scopes but still on the caller's thread.
pub trait LedgerSink: Send + Sync {
    /// A submission passed every guard and was registered.
    fn record_order(&self, order: &OrderRecord);

    /// A fill event was applied.
    fn record_fill(&self, fill: &FillRecord);

    /// An order changed state.
    fn update_order_status(&self, coid: &str, state: OrderState);

    /// A structured audit event (guard blocks, safety transitions, expiry).
    fn record_event(&self, level: &str, code: &str, payload: Value);
}

/// Ledger sink that drops everything; the default for tests and
/// ledger-disabled deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLedger;

impl LedgerSink for NoOpLedger {
    fn record_order(&self, _order: &OrderRecord) {}

    fn record_fill(&self, _fill: &FillRecord) {}

    fn update_order_status(&self, _coid: &str, _state: OrderState) {}

    fn record_event(&self, _level: &str, _code: &str, _payload: Value) {}
}
