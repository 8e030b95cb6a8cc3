//! Durable outbox configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{env_f64, env_string, env_u64, env_usize};

/// Configuration for the idempotency outbox journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Journal path (`OUTBOX_PATH`).
    pub path: PathBuf,
    /// How long terminal keys stay indexed to absorb restart duplicates
    /// (`OUTBOX_DUPE_WINDOW_SEC`).
    pub dupe_window_sec: f64,
    /// Minimum age before a pending entry becomes a replay candidate
    /// (`OUTBOX_RETRY_SEC`).
    pub retry_sec: f64,
    /// Rotate the journal file past this size (`OUTBOX_ROTATE_MB`).
    pub rotate_mb: u64,
    /// Flush the writer every N appends (`OUTBOX_FLUSH_EVERY`).
    pub flush_every: usize,
    /// In-memory index cap (`OUTBOX_MAX_INMEM`).
    pub max_inmem: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/outbox.jsonl"),
            dupe_window_sec: 60.0,
            retry_sec: 5.0,
            rotate_mb: 8,
            flush_every: 1,
            max_inmem: 10_000,
        }
    }
}

impl OutboxConfig {
    /// Read the outbox surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: env_string("OUTBOX_PATH").map_or(defaults.path.clone(), PathBuf::from),
            dupe_window_sec: env_f64("OUTBOX_DUPE_WINDOW_SEC", defaults.dupe_window_sec),
            retry_sec: env_f64("OUTBOX_RETRY_SEC", defaults.retry_sec),
            rotate_mb: env_u64("OUTBOX_ROTATE_MB", defaults.rotate_mb),
            flush_every: env_usize("OUTBOX_FLUSH_EVERY", defaults.flush_every),
            max_inmem: env_usize("OUTBOX_MAX_INMEM", defaults.max_inmem),
        }
    }
}
