//! Short-TTL dedup cache over intent fingerprints.
//!
//! First line of defence against in-process retries: a fingerprint seen
//! again within the window is a duplicate and never reaches the broker.
//! Bounded by TTL and entry count; oldest entries are evicted first.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default dedup window in seconds.
pub const DEFAULT_WINDOW_SECONDS: f64 = 3.0;

/// Default maximum number of tracked fingerprints.
pub const DEFAULT_MAX_KEYS: usize = 100_000;

/// Counters describing window activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Fingerprints recorded.
    pub touched: u64,
    /// Duplicates detected inside the window.
    pub duplicates: u64,
    /// Entries removed by TTL sweep.
    pub removed_ttl: u64,
    /// Entries evicted by the size cap.
    pub removed_size: u64,
}

/// Track recent intent fingerprints to suppress duplicate submissions.
#[derive(Debug)]
pub struct IntentWindow {
    ttl_seconds: f64,
    max_keys: usize,
    entries: RwLock<HashMap<String, f64>>,
    touched: AtomicU64,
    duplicates: AtomicU64,
    removed_ttl: AtomicU64,
    removed_size: AtomicU64,
}

impl Default for IntentWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECONDS, DEFAULT_MAX_KEYS)
    }
}

impl IntentWindow {
    /// Create a window with the given TTL and capacity.
    #[must_use]
    pub fn new(ttl_seconds: f64, max_keys: usize) -> Self {
        Self {
            ttl_seconds,
            max_keys,
            entries: RwLock::new(HashMap::new()),
            touched: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            removed_ttl: AtomicU64::new(0),
            removed_size: AtomicU64::new(0),
        }
    }

    /// Whether the fingerprint was seen within the window.
    ///
    /// Expired entries are dropped on the way through so repeated probes
    /// stay cheap.
    pub fn is_duplicate(&self, key: &str, now: f64) -> bool {
        if self.ttl_seconds <= 0.0 {
            return false;
        }
        let last_seen = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).copied());
        let Some(last_seen) = last_seen else {
            return false;
        };
        if now - last_seen > self.ttl_seconds {
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(key);
            }
            return false;
        }
        self.duplicates.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Record the fingerprint at `now`, evicting oldest entries over cap.
    pub fn touch(&self, key: &str, now: f64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), now);
            self.touched.fetch_add(1, Ordering::Relaxed);
            let evicted = Self::evict_oldest(&mut entries, self.max_keys);
            if evicted > 0 {
                self.removed_size.fetch_add(evicted as u64, Ordering::Relaxed);
            }
        }
    }

    /// Drop the fingerprint, letting an unwound submission retry at once.
    pub fn forget(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Sweep expired entries and enforce the size cap.
    ///
    /// Returns `(removed_by_ttl, removed_by_size)`.
    pub fn cleanup(&self, now: f64) -> (usize, usize) {
        let Ok(mut entries) = self.entries.write() else {
            return (0, 0);
        };
        let mut removed_ttl = 0;
        if self.ttl_seconds > 0.0 {
            let cutoff = now - self.ttl_seconds;
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, ts)| **ts <= cutoff)
                .map(|(key, _)| key.clone())
                .collect();
            removed_ttl = expired.len();
            for key in expired {
                entries.remove(&key);
            }
        }
        let removed_size = Self::evict_oldest(&mut entries, self.max_keys);
        if removed_ttl > 0 {
            self.removed_ttl.fetch_add(removed_ttl as u64, Ordering::Relaxed);
        }
        if removed_size > 0 {
            self.removed_size.fetch_add(removed_size as u64, Ordering::Relaxed);
        }
        (removed_ttl, removed_size)
    }

    /// Number of live fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the window holds no fingerprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> WindowStats {
        WindowStats {
            touched: self.touched.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            removed_ttl: self.removed_ttl.load(Ordering::Relaxed),
            removed_size: self.removed_size.load(Ordering::Relaxed),
        }
    }

    fn evict_oldest(entries: &mut HashMap<String, f64>, max_keys: usize) -> usize {
        if max_keys == 0 || entries.len() <= max_keys {
            return 0;
        }
        let excess = entries.len() - max_keys;
        let mut by_age: Vec<(String, f64)> = entries
            .iter()
            .map(|(key, ts)| (key.clone(), *ts))
            .collect();
        by_age.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        for (key, _) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_inside_window_only() {
        let window = IntentWindow::new(3.0, 100);
        assert!(!window.is_duplicate("k", 10.0));
        window.touch("k", 10.0);
        assert!(window.is_duplicate("k", 11.0));
        assert!(window.is_duplicate("k", 13.0));
        assert!(!window.is_duplicate("k", 13.5));
        assert_eq!(window.stats().duplicates, 2);
    }

    #[test]
    fn expired_probe_drops_the_entry() {
        let window = IntentWindow::new(1.0, 100);
        window.touch("k", 10.0);
        assert!(!window.is_duplicate("k", 20.0));
        assert!(window.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let window = IntentWindow::new(60.0, 2);
        window.touch("a", 1.0);
        window.touch("b", 2.0);
        window.touch("c", 3.0);
        assert_eq!(window.len(), 2);
        assert!(!window.is_duplicate("a", 3.5));
        assert!(window.is_duplicate("b", 3.5));
        assert!(window.is_duplicate("c", 3.5));
        assert_eq!(window.stats().removed_size, 1);
    }

    #[test]
    fn cleanup_reports_both_sweeps() {
        let window = IntentWindow::new(5.0, 100);
        window.touch("old", 1.0);
        window.touch("fresh", 9.0);
        let (ttl, size) = window.cleanup(10.0);
        assert_eq!((ttl, size), (1, 0));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn zero_ttl_disables_dedup() {
        let window = IntentWindow::new(0.0, 100);
        window.touch("k", 10.0);
        assert!(!window.is_duplicate("k", 10.0));
    }
}
