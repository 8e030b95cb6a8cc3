//! Order lifecycle states and transition validation.
//!
//! Two views of the same lifecycle are exposed:
//!
//! - [`next_state`] implements the *tracker* table: permissive, allows
//!   idempotent repeats such as `partial_fill` on `PARTIAL`.
//! - [`validate_transition`] implements the *canonical* lifecycle used by
//!   external assertions: strict, state-to-state.
//!
//! Terminal states accept no transitions in either view.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Accepted by the kernel, not yet handed to a broker adapter.
    New,
    /// Submitted to the broker adapter, acknowledgement outstanding.
    Pending,
    /// Acknowledged by the venue.
    Ack,
    /// Partially filled.
    Partial,
    /// Fully filled. Terminal.
    Filled,
    /// Canceled. Terminal.
    Canceled,
    /// Rejected by a venue or unwound after a failed send. Terminal.
    Rejected,
    /// Expired by the timeout scheduler or the venue. Terminal.
    Expired,
}

impl OrderState {
    /// Whether the state accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::Ack => "ACK",
            Self::Partial => "PARTIAL",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Lower-case metric label.
    #[must_use]
    pub const fn metric_label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Ack => "ack",
            Self::Partial => "partial",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events accepted by [`next_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Hand-off to the broker adapter.
    Submit,
    /// Venue acknowledgement.
    Ack,
    /// Partial fill notification.
    PartialFill,
    /// Full fill notification.
    Filled,
    /// Cancel confirmation.
    Canceled,
    /// Venue rejection or host-side unwind.
    Reject,
    /// Ack/fill deadline expiry.
    Expire,
}

impl LifecycleEvent {
    /// Parse a case-insensitive event name.
    ///
    /// `expired` is accepted as an alias for `expire` since venues report
    /// both spellings.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::EmptyEvent`] for blank input and
    /// [`OrderError::UnknownEvent`] for names outside the table.
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let key = raw.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(OrderError::EmptyEvent);
        }
        match key.as_str() {
            "submit" => Ok(Self::Submit),
            "ack" => Ok(Self::Ack),
            "partial_fill" => Ok(Self::PartialFill),
            "filled" => Ok(Self::Filled),
            "canceled" => Ok(Self::Canceled),
            "reject" => Ok(Self::Reject),
            "expire" | "expired" => Ok(Self::Expire),
            _ => Err(OrderError::UnknownEvent { event: raw.to_string() }),
        }
    }

    /// Lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Ack => "ack",
            Self::PartialFill => "partial_fill",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
            Self::Reject => "reject",
            Self::Expire => "expire",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Blank event name.
    #[error("event must be a non-empty string")]
    EmptyEvent,

    /// Event name outside the lifecycle table.
    #[error("unknown lifecycle event '{event}'")]
    UnknownEvent {
        /// The rejected name.
        event: String,
    },

    /// The event is not allowed in the current state.
    #[error("transition from {from} with event '{event}' is not allowed")]
    DisallowedEvent {
        /// State the order was in.
        from: OrderState,
        /// The rejected event.
        event: LifecycleEvent,
    },

    /// Canonical lifecycle violation out of a terminal state.
    #[error("transition from final state {from} to {to} is not allowed")]
    FromTerminal {
        /// Terminal state the order was in.
        from: OrderState,
        /// Requested state.
        to: OrderState,
    },

    /// Canonical lifecycle violation between live states.
    #[error("transition from {from} to {to} is not allowed")]
    Disallowed {
        /// State the order was in.
        from: OrderState,
        /// Requested state.
        to: OrderState,
    },
}

/// Tracker transition table: next state for a lifecycle event.
///
/// # Errors
///
/// Returns [`OrderError::DisallowedEvent`] when the event is not legal in
/// the current state; the caller decides whether to drop or escalate.
pub fn next_state(current: OrderState, event: LifecycleEvent) -> Result<OrderState, OrderError> {
    use LifecycleEvent as E;
    use OrderState as S;
    let next = match (current, event) {
        (S::New, E::Submit) => S::Pending,
        (S::New, E::Canceled) => S::Canceled,
        (S::Pending, E::Ack) => S::Ack,
        (S::Pending, E::Canceled) => S::Canceled,
        (S::Pending, E::Reject) => S::Rejected,
        (S::Pending, E::Expire) => S::Expired,
        (S::Ack | S::Partial, E::PartialFill) => S::Partial,
        (S::Ack | S::Partial, E::Filled) => S::Filled,
        (S::Ack | S::Partial, E::Canceled) => S::Canceled,
        (S::Ack | S::Partial, E::Reject) => S::Rejected,
        (S::Ack | S::Partial, E::Expire) => S::Expired,
        _ => return Err(OrderError::DisallowedEvent { from: current, event }),
    };
    Ok(next)
}

/// Canonical lifecycle validation between two observed states.
///
/// Self-transitions are accepted (idempotent re-delivery); everything else
/// must follow the strict lifecycle expected by the routing layer.
///
/// # Errors
///
/// Returns [`OrderError::FromTerminal`] or [`OrderError::Disallowed`] when
/// the pair violates the canonical lifecycle.
pub fn validate_transition(previous: OrderState, new: OrderState) -> Result<(), OrderError> {
    use OrderState as S;
    if previous == new {
        return Ok(());
    }
    if previous.is_terminal() {
        return Err(OrderError::FromTerminal { from: previous, to: new });
    }
    let allowed = matches!(
        (previous, new),
        (S::New, S::Pending | S::Rejected | S::Canceled)
            | (S::Pending, S::Ack | S::Rejected | S::Expired | S::Canceled)
            | (S::Ack, S::Partial | S::Filled | S::Canceled | S::Expired | S::Rejected)
            | (S::Partial, S::Filled | S::Canceled | S::Expired | S::Rejected)
    );
    if allowed {
        Ok(())
    } else {
        Err(OrderError::Disallowed { from: previous, to: new })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OrderState::New, LifecycleEvent::Submit => OrderState::Pending)]
    #[test_case(OrderState::Pending, LifecycleEvent::Ack => OrderState::Ack)]
    #[test_case(OrderState::Ack, LifecycleEvent::PartialFill => OrderState::Partial)]
    #[test_case(OrderState::Partial, LifecycleEvent::PartialFill => OrderState::Partial)]
    #[test_case(OrderState::Partial, LifecycleEvent::Filled => OrderState::Filled)]
    #[test_case(OrderState::Pending, LifecycleEvent::Expire => OrderState::Expired)]
    #[test_case(OrderState::Ack, LifecycleEvent::Reject => OrderState::Rejected)]
    fn legal_transitions(state: OrderState, event: LifecycleEvent) -> OrderState {
        next_state(state, event).unwrap()
    }

    #[test]
    fn terminal_states_accept_no_events() {
        for state in [
            OrderState::Filled,
            OrderState::Canceled,
            OrderState::Rejected,
            OrderState::Expired,
        ] {
            for event in [
                LifecycleEvent::Submit,
                LifecycleEvent::Ack,
                LifecycleEvent::PartialFill,
                LifecycleEvent::Filled,
                LifecycleEvent::Canceled,
                LifecycleEvent::Reject,
                LifecycleEvent::Expire,
            ] {
                assert!(next_state(state, event).is_err(), "{state} accepted {event}");
            }
        }
    }

    #[test]
    fn fill_before_ack_is_rejected() {
        assert_eq!(
            next_state(OrderState::Pending, LifecycleEvent::Filled),
            Err(OrderError::DisallowedEvent {
                from: OrderState::Pending,
                event: LifecycleEvent::Filled,
            })
        );
    }

    #[test]
    fn parse_is_case_insensitive_and_aliases_expired() {
        assert_eq!(LifecycleEvent::parse("ACK").unwrap(), LifecycleEvent::Ack);
        assert_eq!(
            LifecycleEvent::parse("  Partial_Fill ").unwrap(),
            LifecycleEvent::PartialFill
        );
        assert_eq!(LifecycleEvent::parse("expired").unwrap(), LifecycleEvent::Expire);
        assert_eq!(LifecycleEvent::parse("").unwrap_err(), OrderError::EmptyEvent);
        assert!(matches!(
            LifecycleEvent::parse("nonsense"),
            Err(OrderError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn canonical_lifecycle_rejects_terminal_exits() {
        assert!(validate_transition(OrderState::Filled, OrderState::Canceled).is_err());
        assert!(validate_transition(OrderState::Pending, OrderState::Ack).is_ok());
        assert!(validate_transition(OrderState::Partial, OrderState::Partial).is_ok());
        assert!(validate_transition(OrderState::New, OrderState::Ack).is_err());
    }
}
