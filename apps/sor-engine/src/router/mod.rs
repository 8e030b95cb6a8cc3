//! Smart order routing: facade, cooldowns, scoring, arbitrage, timeouts.

pub mod arb;
pub mod cooldown;
pub mod facade;
pub mod scorer;
pub mod timeout;

pub use arb::{ArbPlan, compute_arb_plan};
pub use cooldown::{CooldownHit, CooldownRegistry};
pub use facade::{ArbStatus, ArbSubmission, RouterDeps, SmartOrderRouter, SubmitResult};
pub use scorer::{VenueQuote, VenueScore, VenueScorer};
pub use timeout::{TimeoutExpiry, TimeoutKind, run_timeout_scheduler};
