//! The router facade: submit orchestration and event ingress.
//!
//! `register_order` walks the guard pipeline in canonical order, assigns
//! the deterministic COID, registers the tracker entry, reserves budgets
//! and marks the outbox pending, all before the host performs the
//! external send. `process_order_event` applies venue events, settles the
//! outbox, releases reservations and feeds PnL accounting.
//!
//! Lock discipline: every registry guards itself; the facade never holds
//! one registry's lock while calling into another, and never holds any
//! lock across ledger callbacks or host I/O. If a send fails after the
//! reservations, the host unwinds with a `reject` event.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use serde_json::json;

use crate::clock::{Clock, SystemClock, ns_to_seconds};
use crate::config::RouterConfig;
use crate::error::DomainError;
use crate::guards::{
    BlockReason, GuardDecision, MarketDataWatchdog, ReadinessAggregator, UniverseGate,
    check_pretrade, check_profile,
};
use crate::observability::metrics as obs;
use crate::orders::coid::{intent_key, make_coid};
use crate::orders::intent::{OrderIntent, Side};
use crate::orders::state::{LifecycleEvent, OrderError, OrderState};
use crate::orders::tracker::{
    AuditSnapshot, OrderContext, OrderTracker, TrackedOrder, TrackerStats,
};
use crate::orders::window::IntentWindow;
use crate::outbox::{OutboxEntry, OutboxJournal, OutboxState};
use crate::ports::{FillRecord, LedgerSink, MarketDataSource, OrderRecord, SymbolMetaSource};
use crate::risk::{
    FillEvent, NotionalCaps, PnlAggregator, PnlCapsGuard, RiskBudgets, StrategyAccounting,
};
use crate::router::arb::{ArbPlan, compute_arb_plan};
use crate::router::cooldown::CooldownRegistry;
use crate::router::scorer::{VenueQuote, VenueScorer};
use crate::router::timeout::{TimeoutExpiry, TimeoutKind};
use crate::safety::SafeModeController;

/// External collaborators injected at construction.
#[derive(Clone)]
pub struct RouterDeps {
    /// Time source shared by every TTL in the kernel.
    pub clock: Arc<dyn Clock>,
    /// Market data lookups.
    pub market_data: Arc<dyn MarketDataSource>,
    /// Persistent ledger callbacks.
    pub ledger: Arc<dyn LedgerSink>,
    /// Symbol metadata lookups.
    pub symbol_meta: Arc<dyn SymbolMetaSource>,
}

impl RouterDeps {
    /// Deps with the system clock.
    #[must_use]
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        ledger: Arc<dyn LedgerSink>,
        symbol_meta: Arc<dyn SymbolMetaSource>,
    ) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            market_data,
            ledger,
            symbol_meta,
        }
    }

    /// Replace the clock (tests drive a manual clock).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Outcome of a submit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResult {
    /// Every guard passed; the order is registered and reserved.
    Accepted {
        /// Deterministic client order id.
        client_order_id: String,
        /// Post-registration state (always `PENDING`).
        state: OrderState,
        /// Venue the order routes to.
        venue: String,
        /// Scored expected cost, when the smart router is on.
        cost: Option<f64>,
    },
    /// A guard rejected the submit.
    Blocked {
        /// First failing guard's reason code.
        reason: BlockReason,
        /// Machine-readable detail, when the guard provides one.
        detail: Option<String>,
        /// Scored expected cost, when available at block time.
        cost: Option<f64>,
        /// Seconds left on the cooldown for `cooldown` blocks.
        cooldown_remaining: Option<f64>,
    },
}

impl SubmitResult {
    /// Whether the submit was accepted.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Client order id for accepted submits.
    #[must_use]
    pub fn client_order_id(&self) -> Option<&str> {
        match self {
            Self::Accepted { client_order_id, .. } => Some(client_order_id),
            Self::Blocked { .. } => None,
        }
    }

    /// Reason string for blocked submits.
    #[must_use]
    pub fn reason(&self) -> Option<&BlockReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Blocked { reason, .. } => Some(reason),
        }
    }

    /// Detail token for blocked submits.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Accepted { .. } => None,
            Self::Blocked { detail, .. } => detail.as_deref(),
        }
    }
}

/// Status of an inter-venue arbitrage submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbStatus {
    /// Both legs registered.
    Ok,
    /// Nothing registered.
    Blocked,
    /// The long leg registered but the short leg was blocked; the host
    /// must unwind the long leg.
    Partial,
}

/// Result of [`SmartOrderRouter::submit_intervenue_arb`].
#[derive(Debug, Clone, Serialize)]
pub struct ArbSubmission {
    /// Overall status.
    pub status: ArbStatus,
    /// The evaluated plan, when quotes allowed one.
    pub plan: Option<ArbPlan>,
    /// Block reason (`sor-disabled`, `sor-block:edge-too-small`,
    /// `no-quotes`, or the first failing guard reason).
    pub reason: Option<String>,
    /// Shared parent id linking the legs.
    pub parent_id: Option<String>,
    /// Per-leg submit results, long leg first.
    pub legs: Vec<SubmitResult>,
}

/// Smart order router and order lifecycle kernel.
pub struct SmartOrderRouter {
    config: RouterConfig,
    clock: Arc<dyn Clock>,
    market_data: Arc<dyn MarketDataSource>,
    ledger: Arc<dyn LedgerSink>,
    symbol_meta: Arc<dyn SymbolMetaSource>,
    safe_mode: SafeModeController,
    universe: UniverseGate,
    readiness: ReadinessAggregator,
    watchdog: MarketDataWatchdog,
    caps: NotionalCaps,
    pnl_aggregator: Arc<PnlAggregator>,
    pnl_guard: PnlCapsGuard,
    budgets: RiskBudgets,
    cooldowns: CooldownRegistry,
    window: IntentWindow,
    outbox: Option<OutboxJournal>,
    tracker: OrderTracker,
    scorer: VenueScorer,
    accounting: StrategyAccounting,
    funding: RwLock<HashMap<String, f64>>,
    orders_submitted: AtomicU64,
}

impl SmartOrderRouter {
    /// Build the kernel from configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`crate::outbox::OutboxError`] when the idempotency outbox
    /// is enabled and its journal cannot be opened.
    pub fn new(
        config: RouterConfig,
        deps: RouterDeps,
    ) -> Result<Self, crate::outbox::OutboxError> {
        let now = deps.clock.wall_seconds();
        let outbox = if config.features.idempotency_outbox {
            Some(OutboxJournal::open(config.outbox.clone(), now)?)
        } else {
            None
        };
        let safe_mode = if config.profile.safe_mode {
            SafeModeController::starting_in_hold("safe-mode-env")
        } else {
            SafeModeController::new()
        };
        let watchdog = MarketDataWatchdog::new(
            config.limits.md_ttl_sec,
            config.limits.stale_p95_limit_ms,
            config.limits.stale_gate_cooldown_s,
        );
        let readiness = ReadinessAggregator::new(
            config.limits.readiness_required.clone(),
            config.limits.readiness_ttl_sec,
        );
        let universe = UniverseGate::new(config.features.enforce_universe);
        let caps = NotionalCaps::new(
            config.risk.cap_venue.clone(),
            config.risk.cap_symbol.clone(),
            config.risk.cap_strategy.clone(),
        );
        let pnl_aggregator = Arc::new(PnlAggregator::new(&config.risk.pnl_tz));
        let pnl_guard = PnlCapsGuard::new(
            config.risk.daily_loss_cap_usd.clone(),
            config.risk.intraday_drawdown_cap_usd.clone(),
            config.risk.pnl_caps_cooloff_min,
        );
        let budgets = RiskBudgets::new(
            config.risk.budgets.clone(),
            config.risk.budgets_ttl_sec,
            config.risk.budgets_max_reservations,
        );
        let cooldowns = CooldownRegistry::new(&config.cooldown, config.features.router_cooldown);
        let window = IntentWindow::new(
            config.limits.idempotency_window_sec,
            config.limits.idempotency_max_keys,
        );
        let tracker = OrderTracker::new(
            config.limits.tracker_max_active,
            config.limits.tracker_ttl_seconds,
            config.limits.tracker_max_items,
        );
        let scorer = VenueScorer::new(config.scorer.clone());
        Ok(Self {
            clock: deps.clock,
            market_data: deps.market_data,
            ledger: deps.ledger,
            symbol_meta: deps.symbol_meta,
            safe_mode,
            universe,
            readiness,
            watchdog,
            caps,
            pnl_aggregator,
            pnl_guard,
            budgets,
            cooldowns,
            window,
            outbox,
            tracker,
            scorer,
            accounting: StrategyAccounting::new(),
            funding: RwLock::new(HashMap::new()),
            orders_submitted: AtomicU64::new(0),
            config,
        })
    }

    // -----------------------------------------------------------------
    // Submit path
    // -----------------------------------------------------------------

    /// Register a trade intent.
    ///
    /// Walks the guard pipeline in canonical order; the first failing
    /// guard's reason is returned. On acceptance the tracker holds the
    /// order in `PENDING`, budgets are reserved and the outbox entry is
    /// pending; the caller then performs the external send and feeds
    /// events back via [`Self::process_order_event`].
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for malformed intents (blank identity
    /// fields, negative quantity). Business blocks never error.
    pub fn register_order(&self, intent: OrderIntent) -> Result<SubmitResult, DomainError> {
        intent.validate()?;
        let now = self.clock.wall_seconds();
        let now_ns = self.clock.wall_ns();

        // 1. Safe-mode.
        if !self.safe_mode.is_opening_allowed() {
            return Ok(self.blocked(BlockReason::SafeMode, None, None, None));
        }
        // 2. Live profile gate.
        if let GuardDecision::Block { reason, detail } = check_profile(&self.config.profile) {
            return Ok(self.blocked(reason, detail, None, None));
        }
        // 3. Universe enforcement.
        if let GuardDecision::Block { reason, detail } = self.universe.check(&intent.symbol) {
            return Ok(self.blocked(reason, detail, None, None));
        }
        // 4. Readiness aggregator.
        if self.config.features.readiness_agg_guard {
            if let GuardDecision::Block { reason, detail } = self.readiness.check(now) {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }
        // 5. Market-data freshness.
        if self.config.features.md_watchdog {
            if let GuardDecision::Block { reason, detail } =
                self.watchdog.check(&intent.venue, &intent.symbol, now)
            {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }
        // 6. Strict pre-trade validation.
        if self.config.features.pretrade_strict {
            let meta = self.symbol_meta.get(&intent.venue, &intent.symbol);
            if let GuardDecision::Block { reason, detail } =
                check_pretrade(meta.as_ref(), &intent)
            {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }

        let notional = self.resolve_notional(&intent);

        // 7. Notional risk caps.
        if self.config.features.risk_limits {
            if let GuardDecision::Block { reason, detail } =
                self.caps
                    .check(&intent.venue, &intent.symbol, &intent.strategy, notional)
            {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }
        // 8. PnL caps.
        if self.config.features.daily_loss_cap {
            if let GuardDecision::Block { reason, detail } =
                self.pnl_guard.check(&self.pnl_aggregator, &intent.strategy, now)
            {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }
        // 9. Risk budgets.
        if self.config.features.risk_budgets {
            if let GuardDecision::Block { reason, detail } =
                self.budgets
                    .check(&intent.strategy, &intent.symbol, notional, now)
            {
                return Ok(self.blocked(reason, detail, None, None));
            }
        }
        // 10. Cooldown.
        if let Some(hit) =
            self.cooldowns
                .check(&intent.venue, &intent.symbol, &intent.strategy, now)
        {
            return Ok(self.blocked(
                BlockReason::Cooldown,
                Some(hit.reason),
                None,
                Some(hit.remaining),
            ));
        }
        // 11. Intent dedup.
        let key = intent_key(&intent);
        if self.window.is_duplicate(&key, now) {
            return Ok(self.blocked(BlockReason::DupeIntent, None, None, None));
        }
        // 12. Idempotency outbox.
        if let Some(outbox) = &self.outbox {
            if outbox.has_inflight(&key) {
                return Ok(self.blocked(BlockReason::OutboxInflight, None, None, None));
            }
        }

        let cost = self.score_submit(&intent, now);
        let coid = make_coid(
            &intent.strategy,
            &intent.venue,
            &intent.symbol,
            intent.side.as_str(),
            intent.ts_ns,
            intent.nonce,
        );

        self.tracker.register(
            &coid,
            OrderContext {
                intent_key: key.clone(),
                strategy: intent.strategy.clone(),
                venue: intent.venue.clone(),
                symbol: intent.symbol.clone(),
                side: intent.side,
                qty: intent.qty,
                now_ns,
            },
        );
        if let Some(outbox) = &self.outbox {
            match outbox.begin_pending(
                OutboxEntry {
                    intent_key: key.clone(),
                    coid: coid.clone(),
                    state: OutboxState::Pending,
                    created_ts: now,
                    updated_ts: now,
                    strategy: intent.strategy.clone(),
                    symbol: intent.symbol.clone(),
                    venue: intent.venue.clone(),
                    side: intent.side,
                    qty: intent.qty,
                    price: intent.price,
                },
                now,
            ) {
                Ok(true) => {}
                Ok(false) => {
                    // Lost the race to a concurrent submit with the same key.
                    return Ok(self.blocked(BlockReason::OutboxInflight, None, None, None));
                }
                Err(error) => {
                    tracing::error!(coid = %coid, %error, "outbox append failed, send proceeds unguarded");
                }
            }
        }

        if self.config.features.risk_budgets {
            self.budgets
                .registry()
                .reserve(&coid, &intent.strategy, &intent.symbol, notional, now);
        }
        if self.config.features.risk_limits {
            self.caps
                .reserve(&coid, &intent.venue, &intent.symbol, &intent.strategy, notional);
        }
        self.window.touch(&key, now);
        self.accounting
            .record_intent(&intent.strategy, notional, self.is_simulated());

        if let Err(error) = self.tracker.apply_event(&coid, LifecycleEvent::Submit, None, now_ns) {
            // The entry was inserted a moment ago; losing it here means the
            // tracker map is corrupt.
            tracing::error!(coid = %coid, %error, "tracker lost a fresh registration");
            return Err(error);
        }

        if self.config.features.ledger {
            self.ledger.record_order(&OrderRecord {
                coid: coid.clone(),
                strategy: intent.strategy.clone(),
                venue: intent.venue.clone(),
                symbol: intent.symbol.clone(),
                side: intent.side,
                qty: intent.qty,
                price: intent.price,
                ts_ns: intent.ts_ns,
            });
        }
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
        obs::record_order_submitted(&intent.venue);
        tracing::info!(
            coid = %coid,
            strategy = %intent.strategy,
            venue = %intent.venue,
            symbol = %intent.symbol,
            side = %intent.side,
            "order registered"
        );

        Ok(SubmitResult::Accepted {
            client_order_id: coid,
            state: OrderState::Pending,
            venue: intent.venue,
            cost,
        })
    }

    // -----------------------------------------------------------------
    // Event ingress
    // -----------------------------------------------------------------

    /// Apply a lifecycle event observed by the host.
    ///
    /// Applies the transition through the tracker, settles the outbox,
    /// releases reservations on terminal states and records PnL for
    /// fills. Illegal transitions are dropped (audit-counted) and the
    /// current state is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for empty/unknown event names and unknown
    /// client order ids.
    pub fn process_order_event(
        &self,
        coid: &str,
        event: &str,
        quantity: Option<Decimal>,
        realized_pnl_usd: Option<Decimal>,
        now_ns: Option<i64>,
    ) -> Result<OrderState, DomainError> {
        let event = LifecycleEvent::parse(event).map_err(|error| {
            self.tracker.audit().note_invalid_event();
            match error {
                OrderError::EmptyEvent => DomainError::EmptyEvent,
                OrderError::UnknownEvent { event } => DomainError::UnknownEvent { event },
                _ => DomainError::UnknownEvent { event: String::new() },
            }
        })?;
        let now_ns = now_ns.unwrap_or_else(|| self.clock.wall_ns());
        let now = ns_to_seconds(now_ns);

        let Some(before) = self.tracker.get(coid) else {
            if event == LifecycleEvent::Ack {
                self.tracker.audit().note_ack_missing_register();
            }
            return Err(DomainError::UnknownOrder { coid: coid.to_string() });
        };
        let applied = self.tracker.apply_event(coid, event, quantity, now_ns)?;
        obs::record_order_event(event.as_str());
        if !applied.applied {
            return Ok(applied.state);
        }

        match event {
            LifecycleEvent::Ack => {
                if let Some(outbox) = &self.outbox {
                    if let Err(error) = outbox.mark_acked(&before.intent_key, now) {
                        tracing::error!(coid, %error, "outbox ack append failed");
                    }
                }
            }
            LifecycleEvent::PartialFill | LifecycleEvent::Filled => {
                let after_fill = self
                    .tracker
                    .get(coid)
                    .map(|order| order.filled)
                    .unwrap_or(before.filled);
                let fill_delta = (after_fill - before.filled).max(Decimal::ZERO);
                let fill_notional = self.fill_notional(&before, fill_delta);
                if let Some(pnl) = realized_pnl_usd {
                    self.pnl_aggregator.on_fill(&FillEvent {
                        ts: now,
                        strategy: before.strategy.clone(),
                        symbol: before.symbol.clone(),
                        realized_pnl_usd: pnl,
                    });
                }
                self.accounting.record_fill(
                    &before.strategy,
                    fill_notional,
                    realized_pnl_usd.unwrap_or_default(),
                    self.is_simulated(),
                );
                if self.config.features.ledger {
                    self.ledger.record_fill(&FillRecord {
                        coid: coid.to_string(),
                        qty: fill_delta,
                        realized_pnl_usd,
                        ts_ns: now_ns,
                    });
                }
            }
            _ => {}
        }

        if applied.state.is_terminal() {
            self.budgets.registry().release(coid);
            self.caps.release(coid);
            if let Some(outbox) = &self.outbox {
                if let Err(error) = outbox.mark_terminal(&before.intent_key, now) {
                    tracing::error!(coid, %error, "outbox terminal append failed");
                }
            }
        }
        if self.config.features.ledger && applied.state != applied.previous {
            self.ledger.update_order_status(coid, applied.state);
        }
        Ok(applied.state)
    }

    /// Apply a reasoned cooldown to a routing triple.
    ///
    /// The host calls this after adverse broker events (rate limits,
    /// venue health trips); the TTL comes from the configured reason map.
    pub fn apply_cooldown(&self, venue: &str, symbol: &str, strategy: &str, reason: &str) {
        let now = self.clock.wall_seconds();
        self.cooldowns.hit(venue, symbol, strategy, reason, now);
    }

    // -----------------------------------------------------------------
    // Timeout scheduling
    // -----------------------------------------------------------------

    /// Whether the timeout scheduler should run.
    #[must_use]
    pub fn timeouts_enabled(&self) -> bool {
        self.config.features.order_timeouts
            && (self.config.limits.submit_ack_timeout_sec > 0
                || self.config.limits.fill_timeout_sec > 0)
    }

    /// One scheduler tick: expire orders past their ack/fill deadlines.
    ///
    /// Expiries settle through the regular event path so the outbox and
    /// reservations unwind exactly as for venue-delivered events.
    pub fn scan_timeouts(&self, now_ns: Option<i64>) -> Vec<TimeoutExpiry> {
        if !self.config.features.order_timeouts {
            return Vec::new();
        }
        let now_ns = now_ns.unwrap_or_else(|| self.clock.wall_ns());
        let ack_deadline_ns =
            i64::from(self.config.limits.submit_ack_timeout_sec as u32) * 1_000_000_000;
        let fill_deadline_ns =
            i64::from(self.config.limits.fill_timeout_sec as u32) * 1_000_000_000;
        let mut expired = Vec::new();
        for order in self.tracker.snapshot() {
            let kind = match order.state {
                OrderState::Pending
                    if ack_deadline_ns > 0 && now_ns - order.created_ns > ack_deadline_ns =>
                {
                    TimeoutKind::Ack
                }
                OrderState::Ack | OrderState::Partial
                    if fill_deadline_ns > 0 && now_ns - order.updated_ns > fill_deadline_ns =>
                {
                    TimeoutKind::Fill
                }
                _ => continue,
            };
            match self.process_order_event(&order.coid, "expire", None, None, Some(now_ns)) {
                Ok(OrderState::Expired) => {
                    obs::record_order_timeout(kind);
                    tracing::warn!(
                        coid = %order.coid,
                        venue = %order.venue,
                        symbol = %order.symbol,
                        kind = %kind,
                        "order expired by timeout scheduler"
                    );
                    if self.config.features.ledger {
                        self.ledger.record_event(
                            "warn",
                            "order_timeout",
                            json!({"coid": order.coid, "kind": kind.as_str()}),
                        );
                    }
                    expired.push(TimeoutExpiry { coid: order.coid, kind });
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(coid = %order.coid, %error, "timeout expiry failed");
                }
            }
        }
        expired
    }

    // -----------------------------------------------------------------
    // Inter-venue arbitrage
    // -----------------------------------------------------------------

    /// Record the current funding rate for a venue (fraction per funding
    /// interval). Used by the funding-aware arbitrage edge.
    pub fn update_funding_rate(&self, venue: &str, rate: f64) {
        if let Ok(mut funding) = self.funding.write() {
            funding.insert(venue.to_string(), rate);
        }
    }

    /// Submit a two-leg inter-venue arbitrage for `symbol`.
    ///
    /// Computes the best net edge across the configured venues; edges
    /// below `min_edge_bps` are blocked. Legs register through the full
    /// guard pipeline and share a parent id.
    #[must_use]
    pub fn submit_intervenue_arb(
        &self,
        strategy: &str,
        symbol: &str,
        notional_usdt: Decimal,
        ts_ns: i64,
        nonce: u64,
    ) -> ArbSubmission {
        if !self.config.features.sor_v1 {
            return ArbSubmission {
                status: ArbStatus::Blocked,
                plan: None,
                reason: Some("sor-disabled".to_string()),
                parent_id: None,
                legs: Vec::new(),
            };
        }
        let mut quotes = HashMap::new();
        for venue in &self.config.arb.venues {
            if let Ok(book) = self.market_data.top_of_book(venue, symbol) {
                quotes.insert(venue.clone(), book);
            }
        }
        let funding = self
            .funding
            .read()
            .map(|rates| rates.clone())
            .unwrap_or_default();
        let Some(plan) = compute_arb_plan(
            symbol,
            notional_usdt,
            &quotes,
            &self.config.scorer.fees,
            &funding,
            self.config.features.funding_router,
            &self.config.arb,
        ) else {
            return ArbSubmission {
                status: ArbStatus::Blocked,
                plan: None,
                reason: Some("no-quotes".to_string()),
                parent_id: None,
                legs: Vec::new(),
            };
        };
        if plan.net_edge_bps < self.config.arb.min_edge_bps {
            tracing::info!(
                symbol,
                net_edge_bps = plan.net_edge_bps,
                min_edge_bps = self.config.arb.min_edge_bps,
                "arb edge below threshold"
            );
            return ArbSubmission {
                status: ArbStatus::Blocked,
                reason: Some(BlockReason::EdgeTooSmall.as_str().to_string()),
                parent_id: None,
                legs: Vec::new(),
                plan: Some(plan),
            };
        }

        let parent_id = make_coid(strategy, "xarb", symbol, "pair", ts_ns, nonce);
        let long_qty = self.round_to_step(&plan.long_venue, symbol, plan.qty);
        let short_qty = self.round_to_step(&plan.short_venue, symbol, plan.qty);

        let mut long_leg = OrderIntent::new(
            strategy,
            plan.long_venue.clone(),
            symbol,
            Side::Buy,
            long_qty,
            Decimal::from_f64(plan.buy_price),
            ts_ns,
            nonce,
        );
        long_leg.client_tag = Some("arb-long".to_string());
        long_leg.parent_id = Some(parent_id.clone());
        let mut short_leg = OrderIntent::new(
            strategy,
            plan.short_venue.clone(),
            symbol,
            Side::Sell,
            short_qty,
            Decimal::from_f64(plan.sell_price),
            ts_ns,
            nonce,
        );
        short_leg.client_tag = Some("arb-short".to_string());
        short_leg.parent_id = Some(parent_id.clone());

        let long_result = match self.register_order(long_leg) {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, "arb long leg rejected as malformed");
                return ArbSubmission {
                    status: ArbStatus::Blocked,
                    plan: Some(plan),
                    reason: Some("invalid-leg".to_string()),
                    parent_id: Some(parent_id),
                    legs: Vec::new(),
                };
            }
        };
        if !long_result.is_ok() {
            let reason = long_result
                .reason()
                .map(|reason| reason.as_str().to_string());
            return ArbSubmission {
                status: ArbStatus::Blocked,
                plan: Some(plan),
                reason,
                parent_id: Some(parent_id),
                legs: vec![long_result],
            };
        }
        let short_result = match self.register_order(short_leg) {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, "arb short leg rejected as malformed");
                return ArbSubmission {
                    status: ArbStatus::Partial,
                    plan: Some(plan),
                    reason: Some("invalid-leg".to_string()),
                    parent_id: Some(parent_id),
                    legs: vec![long_result],
                };
            }
        };
        let status = if short_result.is_ok() {
            ArbStatus::Ok
        } else {
            // One-sided exposure: the host must unwind the long leg.
            tracing::warn!(symbol, parent_id = %parent_id, "arb short leg blocked after long leg registered");
            ArbStatus::Partial
        };
        let reason = short_result
            .reason()
            .map(|reason| reason.as_str().to_string());
        ArbSubmission {
            status,
            plan: Some(plan),
            reason,
            parent_id: Some(parent_id),
            legs: vec![long_result, short_result],
        }
    }

    // -----------------------------------------------------------------
    // Snapshots, stats and housekeeping
    // -----------------------------------------------------------------

    /// Read-only copy of one tracked order.
    #[must_use]
    pub fn get_order_snapshot(&self, coid: &str) -> Option<TrackedOrder> {
        self.tracker.get(coid)
    }

    /// Current audit counters.
    #[must_use]
    pub fn audit_counters_snapshot(&self) -> AuditSnapshot {
        self.tracker.audit().snapshot()
    }

    /// Tracker housekeeping counters.
    #[must_use]
    pub fn get_tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    /// Count of accepted submissions.
    #[must_use]
    pub fn orders_submitted(&self) -> u64 {
        self.orders_submitted.load(Ordering::Relaxed)
    }

    /// TTL sweep of the tracker; returns removed entries.
    pub fn cleanup_tracker_by_ttl(&self, now_seconds: Option<f64>) -> Vec<(String, OrderState)> {
        let now = now_seconds.unwrap_or_else(|| self.clock.wall_seconds());
        self.tracker.cleanup(now, None, Some(usize::MAX)).0
    }

    /// Size-cap sweep of the tracker; returns evicted entries.
    pub fn cleanup_tracker_by_size(&self) -> Vec<(String, OrderState)> {
        let now = self.clock.wall_seconds();
        self.tracker.cleanup(now, Some(0), None).1
    }

    /// Pending outbox entries ready for replay, oldest first.
    ///
    /// The host re-invokes its send path with the stored COID and context;
    /// idempotency on the broker side is keyed by that COID.
    #[must_use]
    pub fn outbox_replay_candidates(&self) -> Vec<OutboxEntry> {
        let Some(outbox) = &self.outbox else {
            return Vec::new();
        };
        let now = self.clock.wall_seconds();
        outbox.iter_replay_candidates(now, self.config.outbox.retry_sec)
    }

    // -----------------------------------------------------------------
    // Component handles
    // -----------------------------------------------------------------

    /// Safe-mode controller.
    #[must_use]
    pub fn safe_mode(&self) -> &SafeModeController {
        &self.safe_mode
    }

    /// Market-data watchdog.
    #[must_use]
    pub fn watchdog(&self) -> &MarketDataWatchdog {
        &self.watchdog
    }

    /// Readiness aggregator.
    #[must_use]
    pub fn readiness(&self) -> &ReadinessAggregator {
        &self.readiness
    }

    /// Universe gate.
    #[must_use]
    pub fn universe(&self) -> &UniverseGate {
        &self.universe
    }

    /// Risk budgets.
    #[must_use]
    pub fn budgets(&self) -> &RiskBudgets {
        &self.budgets
    }

    /// PnL aggregator.
    #[must_use]
    pub fn pnl(&self) -> &PnlAggregator {
        &self.pnl_aggregator
    }

    /// Strategy accounting.
    #[must_use]
    pub fn accounting(&self) -> &StrategyAccounting {
        &self.accounting
    }

    /// Durable outbox, when enabled.
    #[must_use]
    pub fn outbox(&self) -> Option<&OutboxJournal> {
        self.outbox.as_ref()
    }

    /// Cooldown registry.
    #[must_use]
    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn is_simulated(&self) -> bool {
        !self.config.profile.profile.is_live()
    }

    fn blocked(
        &self,
        reason: BlockReason,
        detail: Option<String>,
        cost: Option<f64>,
        cooldown_remaining: Option<f64>,
    ) -> SubmitResult {
        obs::record_guard_block(reason.as_str(), detail.as_deref());
        tracing::info!(reason = %reason, detail = detail.as_deref().unwrap_or(""), "submit blocked");
        SubmitResult::Blocked { reason, detail, cost, cooldown_remaining }
    }

    /// Quote-currency notional of the intent, resolving market orders
    /// against the book. Unknown prices yield zero (caps then pass; the
    /// pre-trade guard owns rejecting unpriceable orders).
    fn resolve_notional(&self, intent: &OrderIntent) -> Decimal {
        if let Some(notional) = intent.notional() {
            return notional;
        }
        let Ok(book) = self.market_data.top_of_book(&intent.venue, &intent.symbol) else {
            return Decimal::ZERO;
        };
        let price = match intent.side {
            Side::Buy => {
                if book.ask > 0.0 {
                    book.ask
                } else {
                    book.bid
                }
            }
            Side::Sell => {
                if book.bid > 0.0 {
                    book.bid
                } else {
                    book.ask
                }
            }
        };
        Decimal::from_f64(price)
            .filter(|price| *price > Decimal::ZERO)
            .map(|price| price * intent.qty)
            .unwrap_or_default()
    }

    /// Notional of a fill delta at the registered reference price.
    fn fill_notional(&self, order: &TrackedOrder, fill_delta: Decimal) -> Decimal {
        if fill_delta <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let price = self
            .outbox
            .as_ref()
            .and_then(|outbox| outbox.get(&order.intent_key))
            .and_then(|entry| entry.price);
        price.map(|price| price * fill_delta).unwrap_or_default()
    }

    fn score_submit(&self, intent: &OrderIntent, now: f64) -> Option<f64> {
        if !self.config.features.smart_router {
            return None;
        }
        let book = self.market_data.top_of_book(&intent.venue, &intent.symbol).ok()?;
        let price = match intent.side {
            Side::Buy => book.ask,
            Side::Sell => book.bid,
        };
        let ws_latency_ms = if book.ts > 0.0 { ((now - book.ts) * 1_000.0).max(0.0) } else { 0.0 };
        let quote = VenueQuote {
            venue: intent.venue.clone(),
            price,
            book_liquidity_usdt: None,
            rest_latency_ms: 0.0,
            ws_latency_ms,
        };
        let qty = intent.qty.to_f64().unwrap_or(0.0);
        let score = self.scorer.score(&quote, intent.side, qty);
        score.cost_usdt.is_finite().then_some(score.cost_usdt)
    }

    fn round_to_step(&self, venue: &str, symbol: &str, qty: Decimal) -> Decimal {
        let Some(meta) = self.symbol_meta.get(venue, symbol) else {
            return qty;
        };
        if meta.step_size <= Decimal::ZERO {
            return qty;
        }
        (qty / meta.step_size).floor() * meta.step_size
    }
}

impl std::fmt::Debug for SmartOrderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartOrderRouter")
            .field("tracked", &self.tracker.len())
            .field("safe_mode", &self.safe_mode.state())
            .field("outbox", &self.outbox.is_some())
            .finish_non_exhaustive()
    }
}
