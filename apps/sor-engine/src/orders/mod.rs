//! Order identity, lifecycle state and tracking.
//!
//! - `coid`: deterministic client order ids and intent fingerprints
//! - `intent`: the immutable trade-intent input type
//! - `state`: lifecycle states and transition validation
//! - `tracker`: the bounded in-memory registry of live orders
//! - `window`: short-TTL dedup over intent fingerprints

pub mod coid;
pub mod intent;
pub mod state;
pub mod tracker;
pub mod window;

pub use coid::{intent_key, make_coid};
pub use intent::{OrderIntent, OrderType, Side};
pub use state::{LifecycleEvent, OrderError, OrderState, next_state, validate_transition};
pub use tracker::{
    AppliedEvent, AuditSnapshot, OrderContext, OrderTracker, TrackedOrder, TrackerStats,
};
pub use window::{IntentWindow, WindowStats};
