//! Risk controls: notional caps, budgets, PnL caps and accounting.

pub mod accounting;
pub mod budgets;
pub mod caps;
pub mod pnl;

pub use accounting::{FlowCounters, StrategyAccounting};
pub use budgets::{BudgetRegistry, BudgetSnapshot, Reservation, RiskBudgets};
pub use caps::NotionalCaps;
pub use pnl::{
    Fill, FillEvent, GLOBAL_SCOPE, PnlAggregator, PnlCapsGuard, Position, compute_realized_pnl,
    compute_unrealized_pnl,
};
