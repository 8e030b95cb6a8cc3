// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! SOR Engine - Rust Core Library
//!
//! Smart order router and order lifecycle kernel for the Tern trading
//! system.
//!
//! # Architecture
//!
//! The kernel accepts trade intents, walks them through a deterministic
//! chain of pre-trade guards, assigns a stable client order id, tracks
//! each order through a strict lifecycle state machine, and guarantees
//! at-most-once sends via a durable idempotency outbox.
//!
//! ## Modules
//!
//! - `orders`: COIDs, intents, lifecycle states, tracker, dedup window
//! - `guards`: the ordered pre-trade guard pipeline
//! - `risk`: notional caps, budgets, PnL caps, accounting
//! - `outbox`: durable at-most-once send journal
//! - `router`: the facade, venue scorer, cooldowns, arbitrage, timeouts
//! - `safety`: NORMAL/HOLD/KILL safe-mode controller
//! - `ports`: collaborator contracts supplied by the host
//! - `config`: env-style configuration surface
//! - `observability`: metrics exporter and tracing bootstrap
//!
//! The kernel never talks to brokers: the host performs sends and feeds
//! lifecycle events back through the facade.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod error;
pub mod guards;
pub mod metadata;
pub mod observability;
pub mod orders;
pub mod outbox;
pub mod ports;
pub mod risk;
pub mod router;
pub mod safety;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RouterConfig;
pub use error::DomainError;
pub use guards::{BlockReason, GuardDecision};
pub use metadata::{MetadataProvider, SymbolMeta};
pub use orders::{OrderIntent, OrderState, OrderTracker, Side, make_coid};
pub use ports::{LedgerSink, MarketDataSource, NoOpLedger, SymbolMetaSource, TopOfBook};
pub use router::{
    ArbStatus, ArbSubmission, RouterDeps, SmartOrderRouter, SubmitResult, run_timeout_scheduler,
};
pub use safety::{SafeMode, SafeModeController};
