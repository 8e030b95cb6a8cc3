//! Durable idempotency outbox.

pub mod journal;

pub use journal::{OutboxEntry, OutboxError, OutboxJournal, OutboxState, OutboxStats};
