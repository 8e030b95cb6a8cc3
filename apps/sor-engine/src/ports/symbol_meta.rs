//! Symbol metadata lookup contract.

use crate::metadata::SymbolMeta;

/// Read-only source of per-(venue, symbol) trading constraints.
pub trait SymbolMetaSource: Send + Sync {
    /// Normalised metadata for the pair, `None` when unknown.
    fn get(&self, venue: &str, symbol: &str) -> Option<SymbolMeta>;
}
