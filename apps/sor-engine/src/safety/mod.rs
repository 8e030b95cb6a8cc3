//! Process-wide safe-mode coordination.
//!
//! # State Machine
//!
//! ```text
//! NORMAL → HOLD   (automatic or operator engage)
//! HOLD   → NORMAL (operator resume)
//! any    → KILL   (operator, latched)
//! ```
//!
//! HOLD blocks openings but permits cancels and closures. KILL blocks
//! everything except an explicit flatten. KILL is terminal for the trading
//! process; [`SafeModeController::reset`] exists for operational tooling
//! and tests and is not reachable from any trading path.

use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;

/// Safe-mode states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeMode {
    /// Trading unrestricted.
    Normal,
    /// Openings blocked, closures allowed.
    Hold,
    /// All trading blocked except explicit flatten.
    Kill,
}

impl SafeMode {
    /// Lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Hold => "hold",
            Self::Kill => "kill",
        }
    }
}

impl std::fmt::Display for SafeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded safe-mode transition.
#[derive(Debug, Clone, Serialize)]
pub struct SafeModeTransition {
    /// State before.
    pub from: SafeMode,
    /// State after.
    pub to: SafeMode,
    /// Why the transition happened.
    pub reason: String,
    /// Which component requested it.
    pub source: String,
    /// Optional context (profile, symbol, venue, notional...).
    pub context: Option<Value>,
    /// Wall-clock time, Unix seconds.
    pub ts: f64,
}

#[derive(Debug)]
struct ControllerInner {
    state: SafeMode,
    reason: Option<String>,
    history: Vec<SafeModeTransition>,
}

/// Safe-mode state machine handle.
///
/// One per process in production; tests build a fresh one each.
#[derive(Debug)]
pub struct SafeModeController {
    inner: RwLock<ControllerInner>,
}

impl Default for SafeModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeModeController {
    /// Create a controller in NORMAL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ControllerInner {
                state: SafeMode::Normal,
                reason: None,
                history: Vec::new(),
            }),
        }
    }

    /// Create a controller already in HOLD (boot-time `SAFE_MODE`).
    #[must_use]
    pub fn starting_in_hold(reason: &str) -> Self {
        let controller = Self::new();
        controller.enter_hold(reason, "boot", None);
        controller
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SafeMode {
        self.inner
            .read()
            .map(|inner| inner.state)
            .unwrap_or(SafeMode::Kill)
    }

    /// Reason attached to the current state, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.read().ok().and_then(|inner| inner.reason.clone())
    }

    /// Recorded transitions, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<SafeModeTransition> {
        self.inner
            .read()
            .map(|inner| inner.history.clone())
            .unwrap_or_default()
    }

    /// Engage HOLD. Repeated engagement with the same reason is a no-op.
    pub fn enter_hold(&self, reason: &str, source: &str, context: Option<Value>) -> SafeMode {
        self.transition(SafeMode::Hold, reason, source, context)
    }

    /// Engage KILL. Latched: later HOLD/NORMAL requests are ignored.
    pub fn enter_kill(&self, reason: &str, source: &str, context: Option<Value>) -> SafeMode {
        self.transition(SafeMode::Kill, reason, source, context)
    }

    /// Resume NORMAL from HOLD. Ignored in KILL.
    pub fn resume(&self, source: &str) -> SafeMode {
        self.transition(SafeMode::Normal, "resume", source, None)
    }

    /// Clear KILL back to NORMAL. Operational tooling only.
    pub fn reset(&self, source: &str) -> SafeMode {
        let Ok(mut inner) = self.inner.write() else {
            return SafeMode::Kill;
        };
        let previous = inner.state;
        inner.state = SafeMode::Normal;
        inner.reason = None;
        tracing::warn!(from = %previous, source, "safe-mode reset to normal");
        SafeMode::Normal
    }

    /// Whether new openings may be submitted.
    #[must_use]
    pub fn is_opening_allowed(&self) -> bool {
        self.state() == SafeMode::Normal
    }

    /// Whether closures/cancels may be submitted.
    #[must_use]
    pub fn is_closure_allowed(&self) -> bool {
        self.state() != SafeMode::Kill
    }

    /// Whether any trading is unrestricted.
    #[must_use]
    pub fn is_trading_allowed(&self) -> bool {
        self.state() == SafeMode::Normal
    }

    fn transition(
        &self,
        to: SafeMode,
        reason: &str,
        source: &str,
        context: Option<Value>,
    ) -> SafeMode {
        let Ok(mut inner) = self.inner.write() else {
            return SafeMode::Kill;
        };
        let from = inner.state;
        if from == SafeMode::Kill && to != SafeMode::Kill {
            return from;
        }
        if from == to && inner.reason.as_deref() == Some(reason) {
            return from;
        }
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        inner.state = to;
        inner.reason = Some(reason.to_string());
        inner.history.push(SafeModeTransition {
            from,
            to,
            reason: reason.to_string(),
            source: source.to_string(),
            context,
            ts,
        });
        tracing::warn!(
            mode = %to,
            previous_mode = %from,
            reason,
            source,
            "safe-mode transition"
        );
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_blocks_openings_but_not_closures() {
        let controller = SafeModeController::new();
        assert!(controller.is_opening_allowed());
        controller.enter_hold("drawdown", "risk_governor", None);
        assert!(!controller.is_opening_allowed());
        assert!(controller.is_closure_allowed());
        assert!(!controller.is_trading_allowed());
    }

    #[test]
    fn kill_is_latched() {
        let controller = SafeModeController::new();
        controller.enter_kill("operator", "telegram", None);
        assert_eq!(controller.state(), SafeMode::Kill);
        controller.enter_hold("later", "auto", None);
        assert_eq!(controller.state(), SafeMode::Kill);
        controller.resume("operator");
        assert_eq!(controller.state(), SafeMode::Kill);
        assert!(!controller.is_closure_allowed());
    }

    #[test]
    fn repeated_hold_with_same_reason_is_deduped() {
        let controller = SafeModeController::new();
        controller.enter_hold("x", "a", None);
        controller.enter_hold("x", "a", None);
        assert_eq!(controller.history().len(), 1);
        controller.enter_hold("y", "a", None);
        assert_eq!(controller.history().len(), 2);
    }

    #[test]
    fn resume_restores_normal_from_hold() {
        let controller = SafeModeController::starting_in_hold("boot");
        assert!(!controller.is_opening_allowed());
        controller.resume("operator");
        assert!(controller.is_opening_allowed());
    }

    #[test]
    fn reset_clears_kill() {
        let controller = SafeModeController::new();
        controller.enter_kill("incident", "ops", None);
        controller.reset("ops");
        assert_eq!(controller.state(), SafeMode::Normal);
    }
}
