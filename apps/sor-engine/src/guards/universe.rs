//! Tradeable-universe enforcement.

use std::collections::HashSet;
use std::sync::RwLock;

use super::{BlockReason, GuardDecision};

/// Guard trades against the configured universe snapshot.
///
/// Pairs are normalised to upper case. When enforcement is on, an empty
/// universe fails closed: nothing trades until the host publishes one.
#[derive(Debug, Default)]
pub struct UniverseGate {
    enforced: bool,
    pairs: RwLock<HashSet<String>>,
}

impl UniverseGate {
    /// Create a gate; `enforced` mirrors the universe feature flag.
    #[must_use]
    pub fn new(enforced: bool) -> Self {
        Self {
            enforced,
            pairs: RwLock::new(HashSet::new()),
        }
    }

    /// Whether pre-trade universe checks run.
    #[must_use]
    pub const fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Replace the universe snapshot.
    pub fn set_universe<I, S>(&self, pairs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Ok(mut current) = self.pairs.write() {
            *current = pairs
                .into_iter()
                .map(|pair| pair.as_ref().trim().to_ascii_uppercase())
                .filter(|pair| !pair.is_empty())
                .collect();
        }
    }

    /// Check a pair against the snapshot.
    #[must_use]
    pub fn check(&self, pair: &str) -> GuardDecision {
        if !self.enforced {
            return GuardDecision::Allow;
        }
        let normalised = pair.trim().to_ascii_uppercase();
        if normalised.is_empty() {
            return GuardDecision::block(BlockReason::Universe);
        }
        let allowed = self
            .pairs
            .read()
            .map(|pairs| !pairs.is_empty() && pairs.contains(&normalised))
            .unwrap_or(false);
        if allowed {
            GuardDecision::Allow
        } else {
            GuardDecision::block(BlockReason::Universe)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_allows_anything() {
        let gate = UniverseGate::new(false);
        assert!(gate.check("DOGEUSDT").is_allow());
    }

    #[test]
    fn empty_universe_fails_closed() {
        let gate = UniverseGate::new(true);
        assert_eq!(gate.check("BTCUSDT"), GuardDecision::block(BlockReason::Universe));
    }

    #[test]
    fn membership_is_case_insensitive() {
        let gate = UniverseGate::new(true);
        gate.set_universe(["btcusdt", "ETHUSDT"]);
        assert!(gate.check("BTCUSDT").is_allow());
        assert!(gate.check("ethusdt").is_allow());
        assert_eq!(gate.check("SOLUSDT"), GuardDecision::block(BlockReason::Universe));
    }
}
