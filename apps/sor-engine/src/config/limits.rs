//! Windows, TTLs and capacity limits.

use serde::{Deserialize, Serialize};

use super::{env_f64, env_u64, env_usize, env_string};
use crate::orders::tracker::{DEFAULT_MAX_ACTIVE, DEFAULT_MAX_ITEMS, DEFAULT_TTL_SECONDS};
use crate::orders::window::{DEFAULT_MAX_KEYS, DEFAULT_WINDOW_SECONDS};

/// Window and capacity limits for the kernel registries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Intent dedup window (`IDEMPOTENCY_WINDOW_SEC`).
    pub idempotency_window_sec: f64,
    /// Intent dedup capacity (`IDEMPOTENCY_MAX_KEYS`).
    pub idempotency_max_keys: usize,
    /// Ack deadline (`SUBMIT_ACK_TIMEOUT_SEC`); 0 disables.
    pub submit_ack_timeout_sec: u64,
    /// Fill deadline (`FILL_TIMEOUT_SEC`); 0 disables.
    pub fill_timeout_sec: u64,
    /// p95 staleness gate limit in ms (`STALE_P95_LIMIT_MS`); 0 disables.
    pub stale_p95_limit_ms: f64,
    /// Recovery cooldown after a staleness trip (`STALE_GATE_COOLDOWN_S`).
    pub stale_gate_cooldown_s: f64,
    /// Per-tick staleness TTL in seconds (`MD_TTL_SEC`).
    pub md_ttl_sec: f64,
    /// Tracker entry TTL (`TRACKER_TTL_SECONDS`).
    pub tracker_ttl_seconds: u64,
    /// Tracker size cap (`TRACKER_MAX_ITEMS`).
    pub tracker_max_items: usize,
    /// Active-order cap (`TRACKER_MAX_ACTIVE`).
    pub tracker_max_active: usize,
    /// Required readiness signals (`READINESS_REQUIRED`, csv).
    pub readiness_required: Vec<String>,
    /// Readiness signal freshness TTL (`READINESS_TTL_SEC`).
    pub readiness_ttl_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            idempotency_window_sec: DEFAULT_WINDOW_SECONDS,
            idempotency_max_keys: DEFAULT_MAX_KEYS,
            submit_ack_timeout_sec: 0,
            fill_timeout_sec: 0,
            stale_p95_limit_ms: 0.0,
            stale_gate_cooldown_s: 30.0,
            md_ttl_sec: 5.0,
            tracker_ttl_seconds: DEFAULT_TTL_SECONDS,
            tracker_max_items: DEFAULT_MAX_ITEMS,
            tracker_max_active: DEFAULT_MAX_ACTIVE,
            readiness_required: vec!["market".to_string(), "recon".to_string()],
            readiness_ttl_sec: 30.0,
        }
    }
}

impl LimitsConfig {
    /// Read every limit from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let readiness_required = env_string("READINESS_REQUIRED").map_or(
            defaults.readiness_required.clone(),
            |raw| {
                raw.split(',')
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            },
        );
        Self {
            idempotency_window_sec: env_f64(
                "IDEMPOTENCY_WINDOW_SEC",
                defaults.idempotency_window_sec,
            ),
            idempotency_max_keys: env_usize("IDEMPOTENCY_MAX_KEYS", defaults.idempotency_max_keys),
            submit_ack_timeout_sec: env_u64(
                "SUBMIT_ACK_TIMEOUT_SEC",
                defaults.submit_ack_timeout_sec,
            ),
            fill_timeout_sec: env_u64("FILL_TIMEOUT_SEC", defaults.fill_timeout_sec),
            stale_p95_limit_ms: env_f64("STALE_P95_LIMIT_MS", defaults.stale_p95_limit_ms),
            stale_gate_cooldown_s: env_f64(
                "STALE_GATE_COOLDOWN_S",
                defaults.stale_gate_cooldown_s,
            ),
            md_ttl_sec: env_f64("MD_TTL_SEC", defaults.md_ttl_sec),
            tracker_ttl_seconds: env_u64("TRACKER_TTL_SECONDS", defaults.tracker_ttl_seconds),
            tracker_max_items: env_usize("TRACKER_MAX_ITEMS", defaults.tracker_max_items),
            tracker_max_active: env_usize("TRACKER_MAX_ACTIVE", defaults.tracker_max_active),
            readiness_required,
            readiness_ttl_sec: env_f64("READINESS_TTL_SEC", defaults.readiness_ttl_sec),
        }
    }
}
