//! Domain errors raised across the routing kernel.
//!
//! Guard blocks are not errors: they are the `Blocked` variant of
//! [`crate::router::SubmitResult`]. The errors here represent bad input
//! from the host (unknown events, unknown orders, malformed context) and
//! are raised as typed values the host can match on.

use thiserror::Error;

/// Errors raised by the router facade and order registries for invalid
/// host input.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An event was delivered for a client order id the tracker has never
    /// seen (or has already evicted).
    #[error("unknown order: {coid}")]
    UnknownOrder {
        /// Client order id carried by the offending event.
        coid: String,
    },

    /// Lifecycle event names must be non-empty.
    #[error("event must be a non-empty string")]
    EmptyEvent,

    /// The event name does not map to any lifecycle transition.
    #[error("unknown lifecycle event '{event}'")]
    UnknownEvent {
        /// The rejected event name as received.
        event: String,
    },

    /// A required intent field was missing or empty.
    #[error("intent is missing required field '{field}'")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// A numeric intent field could not be interpreted.
    #[error("invalid numeric value for '{field}'")]
    InvalidNumber {
        /// Name of the offending field.
        field: &'static str,
    },
}
