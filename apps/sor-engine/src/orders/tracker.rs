//! Order lifecycle tracking with bounded memory usage.
//!
//! The tracker exclusively owns the live-order map. Registration is
//! idempotent, event application consults the state machine and clamps
//! fill accumulation, and garbage collection bounds memory by TTL and
//! entry count. Everything suspicious lands in an audit counter instead
//! of mutating state.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::clock::NANOS_IN_SECOND;
use crate::error::DomainError;
use crate::observability::metrics as obs;
use crate::orders::intent::Side;
use crate::orders::state::{LifecycleEvent, OrderError, OrderState, next_state};

/// Default TTL for tracked entries in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 3_600;

/// Default size cap for the tracked map.
pub const DEFAULT_MAX_ITEMS: usize = 20_000;

/// Default cap on concurrently active orders.
pub const DEFAULT_MAX_ACTIVE: usize = 5_000;

/// A tracked order owned by the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedOrder {
    /// Client order id.
    pub coid: String,
    /// Outbox / dedup fingerprint key.
    pub intent_key: String,
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
    /// Cumulative filled quantity, `0 ≤ filled ≤ qty`.
    pub filled: Decimal,
    /// Current lifecycle state.
    pub state: OrderState,
    /// Registration time, Unix nanoseconds.
    pub created_ns: i64,
    /// Last update time, Unix nanoseconds.
    pub updated_ns: i64,
}

/// Context captured at registration time.
#[derive(Debug, Clone)]
pub struct OrderContext {
    /// Outbox / dedup fingerprint key.
    pub intent_key: String,
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
    /// Registration time, Unix nanoseconds.
    pub now_ns: i64,
}

/// Result of applying one lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedEvent {
    /// State before the event.
    pub previous: OrderState,
    /// State after the event (unchanged when dropped).
    pub state: OrderState,
    /// Whether the event mutated the order.
    pub applied: bool,
}

/// Audit counters for anomalous event flow.
///
/// The counters only ever grow; snapshots are cheap reads.
#[derive(Debug, Default)]
pub struct AuditCounters {
    duplicate_registration: AtomicU64,
    duplicate_event: AtomicU64,
    out_of_order: AtomicU64,
    fill_without_ack: AtomicU64,
    ack_missing_register: AtomicU64,
    invalid_event: AtomicU64,
}

/// Point-in-time view of [`AuditCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditSnapshot {
    /// Repeated registrations of a live COID.
    pub duplicate_registration: u64,
    /// Idempotent event re-deliveries that were dropped.
    pub duplicate_event: u64,
    /// Events that arrived out of lifecycle order, including any event
    /// against a terminal state.
    pub out_of_order: u64,
    /// Fill notifications before the venue acknowledgement.
    pub fill_without_ack: u64,
    /// Acknowledgements for orders the tracker never registered.
    pub ack_missing_register: u64,
    /// Unknown or empty event names.
    pub invalid_event: u64,
}

impl AuditCounters {
    /// Record an unknown/empty event name.
    pub fn note_invalid_event(&self) {
        self.invalid_event.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acknowledgement without a registration.
    pub fn note_ack_missing_register(&self) {
        self.ack_missing_register.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            duplicate_registration: self.duplicate_registration.load(Ordering::Relaxed),
            duplicate_event: self.duplicate_event.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            fill_without_ack: self.fill_without_ack.load(Ordering::Relaxed),
            ack_missing_register: self.ack_missing_register.load(Ordering::Relaxed),
            invalid_event: self.invalid_event.load(Ordering::Relaxed),
        }
    }
}

/// Housekeeping counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    /// Orders registered.
    pub added: u64,
    /// Events applied.
    pub updates: u64,
    /// Orders finalized out of the map.
    pub removed_terminal: u64,
    /// Orders swept by TTL.
    pub removed_ttl: u64,
    /// Orders evicted by the size cap.
    pub removed_size: u64,
    /// Currently tracked orders.
    pub tracked: usize,
}

/// Maintain a compact mapping of order states.
#[derive(Debug)]
pub struct OrderTracker {
    orders: RwLock<HashMap<String, TrackedOrder>>,
    max_active: usize,
    ttl_seconds: u64,
    max_items: usize,
    audit: AuditCounters,
    added: AtomicU64,
    updates: AtomicU64,
    removed_terminal: AtomicU64,
    removed_ttl: AtomicU64,
    removed_size: AtomicU64,
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE, DEFAULT_TTL_SECONDS, DEFAULT_MAX_ITEMS)
    }
}

impl OrderTracker {
    /// Create a tracker with explicit capacity and TTL bounds.
    #[must_use]
    pub fn new(max_active: usize, ttl_seconds: u64, max_items: usize) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            max_active: if max_active == 0 { DEFAULT_MAX_ACTIVE } else { max_active },
            ttl_seconds,
            max_items,
            audit: AuditCounters::default(),
            added: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            removed_terminal: AtomicU64::new(0),
            removed_ttl: AtomicU64::new(0),
            removed_size: AtomicU64::new(0),
        }
    }

    /// Audit counter handle shared with the facade.
    #[must_use]
    pub fn audit(&self) -> &AuditCounters {
        &self.audit
    }

    /// Number of tracked orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().map(|orders| orders.len()).unwrap_or(0)
    }

    /// Whether the tracker holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch a copy of a tracked order.
    #[must_use]
    pub fn get(&self, coid: &str) -> Option<TrackedOrder> {
        self.orders
            .read()
            .ok()
            .and_then(|orders| orders.get(coid).cloned())
    }

    /// Register a new order for lifecycle tracking.
    ///
    /// Duplicate registrations are ignored to guarantee idempotency;
    /// the duplicate is logged and counted. Returns `true` when the order
    /// was newly registered.
    pub fn register(&self, coid: &str, ctx: OrderContext) -> bool {
        let Ok(mut orders) = self.orders.write() else {
            return false;
        };
        if orders.contains_key(coid) {
            self.audit
                .duplicate_registration
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(coid, venue = %ctx.venue, symbol = %ctx.symbol, "duplicate order registration ignored");
            return false;
        }
        let qty = if ctx.qty < Decimal::ZERO { Decimal::ZERO } else { ctx.qty };
        orders.insert(
            coid.to_string(),
            TrackedOrder {
                coid: coid.to_string(),
                intent_key: ctx.intent_key,
                strategy: ctx.strategy,
                venue: ctx.venue,
                symbol: ctx.symbol,
                side: ctx.side,
                qty,
                filled: Decimal::ZERO,
                state: OrderState::New,
                created_ns: ctx.now_ns,
                updated_ns: ctx.now_ns,
            },
        );
        self.added.fetch_add(1, Ordering::Relaxed);
        Self::enforce_active_capacity(
            &mut orders,
            self.max_active,
            &self.removed_terminal,
        );
        obs::set_tracked_orders(orders.len());
        true
    }

    /// Apply one lifecycle event.
    ///
    /// Fill quantities accumulate monotonically and clamp at the order
    /// quantity; a `filled` event with no quantity fills the remainder.
    /// Illegal transitions never mutate the order: they are dropped and
    /// counted, and the current state is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownOrder`] when the COID is not tracked.
    pub fn apply_event(
        &self,
        coid: &str,
        event: LifecycleEvent,
        qty: Option<Decimal>,
        now_ns: i64,
    ) -> Result<AppliedEvent, DomainError> {
        let Ok(mut orders) = self.orders.write() else {
            return Err(DomainError::UnknownOrder { coid: coid.to_string() });
        };
        let Some(tracked) = orders.get_mut(coid) else {
            tracing::error!(coid, event = %event, "event for unknown order");
            return Err(DomainError::UnknownOrder { coid: coid.to_string() });
        };
        let previous = tracked.state;
        let new_state = match next_state(previous, event) {
            Ok(state) => state,
            Err(OrderError::DisallowedEvent { .. }) => {
                self.count_dropped(previous, event);
                return Ok(AppliedEvent { previous, state: previous, applied: false });
            }
            // next_state only raises DisallowedEvent; anything else would
            // be a state machine bug worth surfacing loudly.
            Err(other) => {
                tracing::error!(coid, error = %other, "unexpected state machine failure");
                return Ok(AppliedEvent { previous, state: previous, applied: false });
            }
        };
        if matches!(event, LifecycleEvent::PartialFill | LifecycleEvent::Filled) {
            let mut increment = qty.unwrap_or(Decimal::ZERO);
            if increment <= Decimal::ZERO && event == LifecycleEvent::Filled {
                increment = tracked.qty - tracked.filled;
            }
            if increment < Decimal::ZERO {
                increment = Decimal::ZERO;
            }
            tracked.filled = (tracked.filled + increment).min(tracked.qty);
        }
        if new_state == OrderState::Filled {
            tracked.filled = tracked.qty;
        }
        tracked.state = new_state;
        tracked.updated_ns = now_ns;
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(AppliedEvent { previous, state: new_state, applied: true })
    }

    fn count_dropped(&self, state: OrderState, event: LifecycleEvent) {
        if state.is_terminal() {
            let repeat = matches!(
                (state, event),
                (OrderState::Filled, LifecycleEvent::Filled)
                    | (OrderState::Canceled, LifecycleEvent::Canceled)
                    | (OrderState::Rejected, LifecycleEvent::Reject)
                    | (OrderState::Expired, LifecycleEvent::Expire)
            );
            if repeat {
                self.audit.duplicate_event.fetch_add(1, Ordering::Relaxed);
            } else {
                self.audit.out_of_order.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }
        match (state, event) {
            (OrderState::New | OrderState::Pending, LifecycleEvent::PartialFill | LifecycleEvent::Filled) => {
                self.audit.fill_without_ack.fetch_add(1, Ordering::Relaxed);
            }
            (OrderState::Ack, LifecycleEvent::Ack)
            | (OrderState::Pending, LifecycleEvent::Submit) => {
                self.audit.duplicate_event.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.audit.out_of_order.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove a finalized order and emit telemetry.
    ///
    /// The order's own state wins when it is already terminal; otherwise
    /// the caller-provided `state` labels the removal. Returns `true` when
    /// the order was tracked and removed.
    pub fn finalize(&self, coid: &str, state: OrderState) -> bool {
        let Ok(mut orders) = self.orders.write() else {
            return false;
        };
        let Some(tracked) = orders.remove(coid) else {
            return false;
        };
        let final_state = if tracked.state.is_terminal() { tracked.state } else { state };
        tracing::debug!(coid, state = %final_state, "order finalized");
        self.removed_terminal.fetch_add(1, Ordering::Relaxed);
        obs::record_finalized(final_state);
        obs::set_tracked_orders(orders.len());
        true
    }

    /// Drop every terminal order.
    pub fn prune_terminal(&self) -> usize {
        let Ok(mut orders) = self.orders.write() else {
            return 0;
        };
        let terminal: Vec<(String, OrderState)> = orders
            .iter()
            .filter(|(_, tracked)| tracked.state.is_terminal())
            .map(|(coid, tracked)| (coid.clone(), tracked.state))
            .collect();
        for (coid, state) in &terminal {
            orders.remove(coid);
            obs::record_finalized(*state);
        }
        let removed = terminal.len();
        if removed > 0 {
            self.removed_terminal.fetch_add(removed as u64, Ordering::Relaxed);
            obs::set_tracked_orders(orders.len());
        }
        removed
    }

    /// Drop orders idle for longer than `ttl_sec`, regardless of state.
    pub fn prune_aged(&self, now_ns: i64, ttl_sec: u64) -> usize {
        if ttl_sec == 0 {
            return 0;
        }
        let Ok(mut orders) = self.orders.write() else {
            return 0;
        };
        let ttl_ns = ttl_sec as i64 * NANOS_IN_SECOND;
        let aged: Vec<String> = orders
            .iter()
            .filter(|(_, tracked)| now_ns - tracked.updated_ns > ttl_ns)
            .map(|(coid, _)| coid.clone())
            .collect();
        for coid in &aged {
            orders.remove(coid);
        }
        let removed = aged.len();
        if removed > 0 {
            self.removed_ttl.fetch_add(removed as u64, Ordering::Relaxed);
            obs::set_tracked_orders(orders.len());
        }
        removed
    }

    /// TTL sweep followed by size-cap eviction (oldest update first).
    ///
    /// Overrides fall back to the configured TTL/size when `None`. Returns
    /// the removed `(coid, state)` pairs per sweep.
    pub fn cleanup(
        &self,
        now_seconds: f64,
        ttl_seconds: Option<u64>,
        max_items: Option<usize>,
    ) -> (Vec<(String, OrderState)>, Vec<(String, OrderState)>) {
        let ttl = ttl_seconds.unwrap_or(self.ttl_seconds);
        let cap = max_items.unwrap_or(self.max_items);
        let Ok(mut orders) = self.orders.write() else {
            return (Vec::new(), Vec::new());
        };

        let mut removed_ttl = Vec::new();
        if ttl > 0 {
            let cutoff_ns = ((now_seconds - ttl as f64) * NANOS_IN_SECOND as f64) as i64;
            let expired: Vec<String> = orders
                .iter()
                .filter(|(_, tracked)| tracked.updated_ns <= cutoff_ns)
                .map(|(coid, _)| coid.clone())
                .collect();
            for coid in expired {
                if let Some(tracked) = orders.remove(&coid) {
                    removed_ttl.push((coid, tracked.state));
                }
            }
        }

        let mut removed_size = Vec::new();
        if orders.len() > cap {
            let mut by_age: Vec<(String, i64)> = orders
                .iter()
                .map(|(coid, tracked)| (coid.clone(), tracked.updated_ns))
                .collect();
            by_age.sort_by_key(|(_, updated_ns)| *updated_ns);
            let excess = orders.len() - cap;
            for (coid, _) in by_age.into_iter().take(excess) {
                if let Some(tracked) = orders.remove(&coid) {
                    removed_size.push((coid, tracked.state));
                }
            }
        }

        if !removed_ttl.is_empty() {
            self.removed_ttl.fetch_add(removed_ttl.len() as u64, Ordering::Relaxed);
        }
        if !removed_size.is_empty() {
            self.removed_size.fetch_add(removed_size.len() as u64, Ordering::Relaxed);
        }
        if !removed_ttl.is_empty() || !removed_size.is_empty() {
            tracing::info!(
                ttl = removed_ttl.len(),
                size = removed_size.len(),
                "tracker cleanup"
            );
            obs::set_tracked_orders(orders.len());
        }
        (removed_ttl, removed_size)
    }

    /// Read-only snapshot of every tracked order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TrackedOrder> {
        self.orders
            .read()
            .map(|orders| orders.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Housekeeping counters plus the live entry count.
    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            added: self.added.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removed_terminal: self.removed_terminal.load(Ordering::Relaxed),
            removed_ttl: self.removed_ttl.load(Ordering::Relaxed),
            removed_size: self.removed_size.load(Ordering::Relaxed),
            tracked: self.len(),
        }
    }

    fn enforce_active_capacity(
        orders: &mut HashMap<String, TrackedOrder>,
        max_active: usize,
        removed_terminal: &AtomicU64,
    ) {
        if orders.len() <= max_active {
            return;
        }
        let mut terminal: Vec<(String, i64, OrderState)> = orders
            .iter()
            .filter(|(_, tracked)| tracked.state.is_terminal())
            .map(|(coid, tracked)| (coid.clone(), tracked.updated_ns, tracked.state))
            .collect();
        terminal.sort_by_key(|(_, updated_ns, _)| *updated_ns);
        for (coid, _, state) in terminal {
            if orders.len() <= max_active {
                break;
            }
            orders.remove(&coid);
            removed_terminal.fetch_add(1, Ordering::Relaxed);
            obs::record_finalized(state);
        }
        if orders.len() > max_active {
            tracing::warn!(
                max_active,
                current_active = orders.len(),
                "order tracker over active capacity"
            );
        }
    }
}
