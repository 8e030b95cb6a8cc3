//! Durable at-most-once send registry.
//!
//! Append-only JSONL journal keyed by `intent_key`. Every state change
//! appends a full record; the newest record per key wins on replay, so a
//! crash between append and flush costs at most the unflushed tail and
//! never resurrects a terminal key inside the dupe window.
//!
//! Lifecycle per key: `pending → acked → terminal`. A non-terminal entry
//! blocks any new submission with the same key; pending entries older
//! than the retry interval are handed back to the send path as replay
//! candidates at startup and on periodic scans.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OutboxConfig;
use crate::observability::metrics as obs;
use crate::orders::intent::Side;

/// Outbox entry lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    /// Reserved for send; blocks duplicates.
    Pending,
    /// Venue acknowledged the order.
    Acked,
    /// Order reached a terminal state.
    Terminal,
}

/// One journal record; also the in-memory index value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Content-addressed intent identity.
    pub intent_key: String,
    /// Client order id reserved for the send.
    pub coid: String,
    /// Lifecycle state.
    pub state: OutboxState,
    /// First-seen wall time, Unix seconds.
    pub created_ts: f64,
    /// Last state-change wall time, Unix seconds.
    pub updated_ts: f64,
    /// Owning strategy.
    pub strategy: String,
    /// Trading symbol.
    pub symbol: String,
    /// Venue identifier.
    pub venue: String,
    /// Direction.
    pub side: Side,
    /// Requested quantity.
    pub qty: Decimal,
    /// Limit price, when present.
    pub price: Option<Decimal>,
}

/// Errors from journal IO.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Filesystem failure on the journal file.
    #[error("outbox journal io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed to serialize.
    #[error("outbox journal encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Counters describing journal activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    /// `begin_pending` attempts.
    pub seen: u64,
    /// Attempts refused because a non-terminal entry existed.
    pub skip_duplicate: u64,
    /// Acks recorded.
    pub acked: u64,
    /// Terminals recorded.
    pub terminal: u64,
    /// Replay candidates handed back to the send path.
    pub replayed: u64,
}

#[derive(Debug)]
struct JournalInner {
    index: HashMap<String, OutboxEntry>,
    writer: BufWriter<File>,
    bytes_written: u64,
    appends_since_flush: usize,
}

/// Durable idempotency outbox journal.
#[derive(Debug)]
pub struct OutboxJournal {
    config: OutboxConfig,
    inner: Mutex<JournalInner>,
    seen: AtomicU64,
    skip_duplicate: AtomicU64,
    acked: AtomicU64,
    terminal: AtomicU64,
    replayed: AtomicU64,
}

impl OutboxJournal {
    /// Open (or create) the journal and replay the on-disk state.
    ///
    /// Terminal keys older than the dupe window are not indexed; malformed
    /// journal lines are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Io`] when the journal directory or file
    /// cannot be created or read.
    pub fn open(config: OutboxConfig, now: f64) -> Result<Self, OutboxError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut index = HashMap::new();
        let rotated = Self::rotated_path(&config);
        for path in [&rotated, &config.path] {
            if !path.exists() {
                continue;
            }
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<OutboxEntry>(&line) {
                    Ok(entry) => {
                        index.insert(entry.intent_key.clone(), entry);
                    }
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "skipping malformed outbox record");
                    }
                }
            }
        }
        if config.dupe_window_sec > 0.0 {
            index.retain(|_, entry| {
                entry.state != OutboxState::Terminal
                    || now - entry.updated_ts <= config.dupe_window_sec
            });
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;
        let bytes_written = file.metadata().map(|meta| meta.len()).unwrap_or(0);
        tracing::info!(
            path = %config.path.display(),
            entries = index.len(),
            "outbox journal opened"
        );
        Ok(Self {
            config,
            inner: Mutex::new(JournalInner {
                index,
                writer: BufWriter::new(file),
                bytes_written,
                appends_since_flush: 0,
            }),
            seen: AtomicU64::new(0),
            skip_duplicate: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            terminal: AtomicU64::new(0),
            replayed: AtomicU64::new(0),
        })
    }

    fn rotated_path(config: &OutboxConfig) -> std::path::PathBuf {
        let mut rotated = config.path.as_os_str().to_owned();
        rotated.push(".1");
        std::path::PathBuf::from(rotated)
    }

    /// Register a send attempt.
    ///
    /// Returns `false` (leaving the journal untouched) when a non-terminal
    /// entry already holds the key; otherwise appends a pending record.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError`] on journal IO failure.
    pub fn begin_pending(&self, entry: OutboxEntry, now: f64) -> Result<bool, OutboxError> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(false);
        };
        if let Some(existing) = inner.index.get_mut(&entry.intent_key) {
            if existing.state != OutboxState::Terminal {
                existing.updated_ts = now;
                self.skip_duplicate.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        }
        let mut record = entry;
        record.state = OutboxState::Pending;
        record.created_ts = now;
        record.updated_ts = now;
        Self::append(&self.config, &mut inner, &record)?;
        inner.index.insert(record.intent_key.clone(), record);
        self.enforce_index_cap(&mut inner);
        Ok(true)
    }

    /// Whether a non-terminal entry holds the key.
    #[must_use]
    pub fn has_inflight(&self, intent_key: &str) -> bool {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| {
                inner
                    .index
                    .get(intent_key)
                    .map(|entry| entry.state != OutboxState::Terminal)
            })
            .unwrap_or(false)
    }

    /// Record the venue acknowledgement for the key.
    ///
    /// Unknown keys are recorded implicitly with a warning: an ack proves
    /// the venue saw the order even if the pending record was lost.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError`] on journal IO failure.
    pub fn mark_acked(&self, intent_key: &str, now: f64) -> Result<(), OutboxError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(());
        };
        let record = match inner.index.get(intent_key) {
            Some(entry) => {
                let mut updated = entry.clone();
                updated.state = OutboxState::Acked;
                updated.updated_ts = now;
                updated
            }
            None => {
                tracing::warn!(intent_key, "ack for unknown outbox key, registering implicitly");
                OutboxEntry {
                    intent_key: intent_key.to_string(),
                    coid: String::new(),
                    state: OutboxState::Acked,
                    created_ts: now,
                    updated_ts: now,
                    strategy: String::new(),
                    symbol: String::new(),
                    venue: String::new(),
                    side: Side::Buy,
                    qty: Decimal::ZERO,
                    price: None,
                }
            }
        };
        Self::append(&self.config, &mut inner, &record)?;
        inner.index.insert(intent_key.to_string(), record);
        self.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Record the terminal settlement for the key.
    ///
    /// Idempotent: settling an unknown or already-terminal key only bumps
    /// the counter.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError`] on journal IO failure.
    pub fn mark_terminal(&self, intent_key: &str, now: f64) -> Result<(), OutboxError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(());
        };
        self.terminal.fetch_add(1, Ordering::Relaxed);
        let Some(entry) = inner.index.get(intent_key) else {
            return Ok(());
        };
        if entry.state == OutboxState::Terminal {
            return Ok(());
        }
        let mut record = entry.clone();
        record.state = OutboxState::Terminal;
        record.updated_ts = now;
        Self::append(&self.config, &mut inner, &record)?;
        inner.index.insert(intent_key.to_string(), record);
        Ok(())
    }

    /// Pending entries older than `min_age_sec`, oldest first.
    ///
    /// The caller re-invokes its send path with the stored COID and
    /// context; the entries stay pending until acked or settled.
    #[must_use]
    pub fn iter_replay_candidates(&self, now: f64, min_age_sec: f64) -> Vec<OutboxEntry> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let mut candidates: Vec<OutboxEntry> = inner
            .index
            .values()
            .filter(|entry| {
                entry.state == OutboxState::Pending && now - entry.updated_ts >= min_age_sec
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.created_ts
                .partial_cmp(&b.created_ts)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if !candidates.is_empty() {
            self.replayed
                .fetch_add(candidates.len() as u64, Ordering::Relaxed);
            for _ in &candidates {
                obs::record_outbox_replay();
            }
        }
        candidates
    }

    /// Force a writer flush.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Io`] when the flush fails.
    pub fn flush(&self) -> Result<(), OutboxError> {
        if let Ok(mut inner) = self.inner.lock() {
            inner.writer.flush()?;
            inner.appends_since_flush = 0;
        }
        Ok(())
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.index.len()).unwrap_or(0)
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed entry for a key, if any.
    #[must_use]
    pub fn get(&self, intent_key: &str) -> Option<OutboxEntry> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.index.get(intent_key).cloned())
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> OutboxStats {
        OutboxStats {
            seen: self.seen.load(Ordering::Relaxed),
            skip_duplicate: self.skip_duplicate.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            terminal: self.terminal.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
        }
    }

    fn append(
        config: &OutboxConfig,
        inner: &mut JournalInner,
        record: &OutboxEntry,
    ) -> Result<(), OutboxError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        inner.writer.write_all(line.as_bytes())?;
        inner.bytes_written += line.len() as u64;
        inner.appends_since_flush += 1;
        if config.flush_every == 0 || inner.appends_since_flush >= config.flush_every {
            inner.writer.flush()?;
            inner.appends_since_flush = 0;
        }
        if config.rotate_mb > 0 && inner.bytes_written > config.rotate_mb * 1024 * 1024 {
            Self::rotate(config, inner)?;
        }
        Ok(())
    }

    fn rotate(config: &OutboxConfig, inner: &mut JournalInner) -> Result<(), OutboxError> {
        inner.writer.flush()?;
        let rotated = Self::rotated_path(config);
        let _ = std::fs::remove_file(&rotated);
        std::fs::rename(&config.path, &rotated)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;
        inner.writer = BufWriter::new(file);
        inner.bytes_written = 0;
        tracing::info!(
            path = %config.path.display(),
            rotated = %rotated.display(),
            "outbox journal rotated"
        );
        Ok(())
    }

    fn enforce_index_cap(&self, inner: &mut JournalInner) {
        if self.config.max_inmem == 0 || inner.index.len() <= self.config.max_inmem {
            return;
        }
        // Evict settled keys only; pending entries are load-bearing for
        // the at-most-once guarantee.
        let mut settled: Vec<(String, f64)> = inner
            .index
            .iter()
            .filter(|(_, entry)| entry.state != OutboxState::Pending)
            .map(|(key, entry)| (key.clone(), entry.updated_ts))
            .collect();
        settled.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut excess = inner.index.len() - self.config.max_inmem;
        for (key, _) in settled {
            if excess == 0 {
                break;
            }
            inner.index.remove(&key);
            excess -= 1;
        }
        if inner.index.len() > self.config.max_inmem {
            tracing::warn!(
                max_inmem = self.config.max_inmem,
                indexed = inner.index.len(),
                "outbox index over capacity with pending entries"
            );
        }
    }
}
