//! Collaborator contracts consumed by the kernel.
//!
//! The kernel never talks to a broker, a database or a websocket itself:
//! the host supplies implementations of these capability traits at
//! construction time.

mod ledger;
mod market_data;
mod symbol_meta;

pub use ledger::{FillRecord, LedgerSink, NoOpLedger, OrderRecord};
pub use market_data::{MarketDataError, MarketDataSource, TopOfBook};
pub use symbol_meta::SymbolMetaSource;
