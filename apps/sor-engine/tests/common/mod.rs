//! Shared fixtures for the integration suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sor_engine::config::RouterConfig;
use sor_engine::metadata::{MetadataProvider, SymbolMeta};
use sor_engine::orders::{OrderIntent, OrderState, Side};
use sor_engine::ports::{
    FillRecord, LedgerSink, MarketDataError, MarketDataSource, OrderRecord, TopOfBook,
};
use sor_engine::router::{RouterDeps, SmartOrderRouter};
use sor_engine::ManualClock;

/// Epoch anchor for the manual clock (2023-11-14T22:13:20Z).
pub const T0: f64 = 1_700_000_000.0;

/// Mutable in-memory market data stub.
#[derive(Debug, Default)]
pub struct StubMarketData {
    books: RwLock<HashMap<(String, String), TopOfBook>>,
}

impl StubMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, venue: &str, symbol: &str, bid: f64, ask: f64, ts: f64) {
        if let Ok(mut books) = self.books.write() {
            books.insert(
                (venue.to_ascii_lowercase(), symbol.to_ascii_uppercase()),
                TopOfBook { bid, ask, ts },
            );
        }
    }
}

impl MarketDataSource for StubMarketData {
    fn top_of_book(&self, venue: &str, symbol: &str) -> Result<TopOfBook, MarketDataError> {
        self.books
            .read()
            .ok()
            .and_then(|books| {
                books
                    .get(&(venue.to_ascii_lowercase(), symbol.to_ascii_uppercase()))
                    .copied()
            })
            .ok_or_else(|| MarketDataError::UnknownMarket {
                venue: venue.to_string(),
                symbol: symbol.to_string(),
            })
    }
}

/// Ledger sink that records what the kernel reports.
#[derive(Debug, Default)]
pub struct RecordingLedger {
    pub orders: Mutex<Vec<OrderRecord>>,
    pub fills: Mutex<Vec<FillRecord>>,
    pub statuses: Mutex<Vec<(String, OrderState)>>,
}

impl LedgerSink for RecordingLedger {
    fn record_order(&self, order: &OrderRecord) {
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(order.clone());
        }
    }

    fn record_fill(&self, fill: &FillRecord) {
        if let Ok(mut fills) = self.fills.lock() {
            fills.push(fill.clone());
        }
    }

    fn update_order_status(&self, coid: &str, state: OrderState) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push((coid.to_string(), state));
        }
    }

    fn record_event(&self, _level: &str, _code: &str, _payload: serde_json::Value) {}
}

/// Everything a test needs to drive the kernel.
pub struct World {
    pub clock: Arc<ManualClock>,
    pub market: Arc<StubMarketData>,
    pub meta: Arc<MetadataProvider>,
    pub ledger: Arc<RecordingLedger>,
    pub router: SmartOrderRouter,
}

/// Build a router over fresh stubs with a manual clock at [`T0`].
///
/// Seeds a BTCUSDT book on `binance-um` and metadata (tick 0.1,
/// step 0.001).
pub fn build_world(config: RouterConfig) -> World {
    let clock = Arc::new(ManualClock::new(T0));
    let market = Arc::new(StubMarketData::new());
    market.set("binance-um", "BTCUSDT", 24_999.9, 25_000.0, T0);
    let meta = Arc::new(MetadataProvider::new());
    meta.put(
        "binance-um",
        "BTCUSDT",
        SymbolMeta {
            tick_size: dec!(0.1),
            step_size: dec!(0.001),
            min_notional: Some(dec!(10)),
            min_qty: Some(dec!(0.001)),
        },
    );
    let ledger = Arc::new(RecordingLedger::default());
    let deps = RouterDeps::new(market.clone(), ledger.clone(), meta.clone())
        .with_clock(clock.clone());
    let router = SmartOrderRouter::new(config, deps).expect("router construction");
    World { clock, market, meta, ledger, router }
}

/// A plain BTCUSDT buy intent on `binance-um`.
pub fn buy_intent(qty: Decimal, price: Decimal, nonce: u64) -> OrderIntent {
    OrderIntent::new(
        "alpha",
        "binance-um",
        "BTCUSDT",
        Side::Buy,
        qty,
        Some(price),
        1_700_000_000_000_000_000 + nonce as i64,
        nonce,
    )
}
