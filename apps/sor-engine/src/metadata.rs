//! Exchange symbol metadata normalisation and caching.
//!
//! Venue payloads describe tick/step/minimum constraints in wildly
//! different shapes; everything is normalised into [`SymbolMeta`] without
//! going through floats. The provider is a flat in-memory cache refreshed
//! out-of-band by the host.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ports::SymbolMetaSource;

/// Normalised per-(venue, symbol) trading constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Price increment.
    pub tick_size: Decimal,
    /// Quantity increment.
    pub step_size: Decimal,
    /// Minimum order notional, when the venue enforces one.
    pub min_notional: Option<Decimal>,
    /// Minimum order quantity, when the venue enforces one.
    pub min_qty: Option<Decimal>,
}

/// Errors from metadata normalisation.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A required field was absent from the payload.
    #[error("metadata payload missing '{field}'")]
    MissingField {
        /// Dotted path of the absent field.
        field: &'static str,
    },

    /// A numeric field could not be parsed as a decimal.
    #[error("invalid decimal value for '{field}': {value}")]
    InvalidDecimal {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The raw value as received.
        value: String,
    },
}

fn as_decimal(value: &Value, field: &'static str) -> Result<Decimal, MetadataError> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => {
            return Err(MetadataError::InvalidDecimal { field, value: value.to_string() });
        }
    };
    Decimal::from_str(text.trim())
        .map_err(|_| MetadataError::InvalidDecimal { field, value: text })
}

fn optional_decimal(value: Option<&Value>, field: &'static str) -> Result<Option<Decimal>, MetadataError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(inner) => as_decimal(inner, field).map(Some),
    }
}

/// Normalise a Binance futures `exchangeInfo` symbol payload.
///
/// # Errors
///
/// Returns [`MetadataError`] when the price or lot-size filters are absent
/// or carry unparsable values.
pub fn normalize_binance(raw: &Value) -> Result<SymbolMeta, MetadataError> {
    let filters = raw
        .get("filters")
        .and_then(Value::as_array)
        .ok_or(MetadataError::MissingField { field: "filters" })?;
    let mut tick_size = None;
    let mut step_size = None;
    let mut min_notional = None;
    let mut min_qty = None;
    for entry in filters {
        match entry.get("filterType").and_then(Value::as_str) {
            Some("PRICE_FILTER") => {
                let value = entry
                    .get("tickSize")
                    .ok_or(MetadataError::MissingField { field: "filters.PRICE_FILTER.tickSize" })?;
                tick_size = Some(as_decimal(value, "filters.PRICE_FILTER.tickSize")?);
            }
            Some("LOT_SIZE") => {
                let value = entry
                    .get("stepSize")
                    .ok_or(MetadataError::MissingField { field: "filters.LOT_SIZE.stepSize" })?;
                step_size = Some(as_decimal(value, "filters.LOT_SIZE.stepSize")?);
                min_qty = optional_decimal(entry.get("minQty"), "filters.LOT_SIZE.minQty")?;
            }
            Some("MIN_NOTIONAL") => {
                min_notional =
                    optional_decimal(entry.get("notional"), "filters.MIN_NOTIONAL.notional")?;
            }
            _ => {}
        }
    }
    Ok(SymbolMeta {
        tick_size: tick_size
            .ok_or(MetadataError::MissingField { field: "filters.PRICE_FILTER.tickSize" })?,
        step_size: step_size
            .ok_or(MetadataError::MissingField { field: "filters.LOT_SIZE.stepSize" })?,
        min_notional,
        min_qty,
    })
}

/// Normalise an OKX perpetual instrument payload.
///
/// Falls back to `ctVal · minSz` for the minimum notional when the venue
/// does not report one directly.
///
/// # Errors
///
/// Returns [`MetadataError`] on missing tick/lot sizes or unparsable values.
pub fn normalize_okx(raw: &Value) -> Result<SymbolMeta, MetadataError> {
    let tick_size = as_decimal(
        raw.get("tickSz").ok_or(MetadataError::MissingField { field: "tickSz" })?,
        "tickSz",
    )?;
    let step_size = as_decimal(
        raw.get("lotSz").ok_or(MetadataError::MissingField { field: "lotSz" })?,
        "lotSz",
    )?;
    let min_qty = optional_decimal(raw.get("minSz"), "minSz")?;
    let mut min_notional = optional_decimal(raw.get("minNotional"), "minNotional")?;
    if min_notional.is_none() {
        min_notional = optional_decimal(raw.get("minNotionalValue"), "minNotionalValue")?;
    }
    if min_notional.is_none() {
        if let (Some(ct_val), Some(min_size)) =
            (optional_decimal(raw.get("ctVal"), "ctVal")?, min_qty)
        {
            min_notional = Some(ct_val * min_size);
        }
    }
    Ok(SymbolMeta { tick_size, step_size, min_notional, min_qty })
}

/// Normalise a Bybit perpetual instrument payload.
///
/// # Errors
///
/// Returns [`MetadataError`] on missing filter blocks or unparsable values.
pub fn normalize_bybit(raw: &Value) -> Result<SymbolMeta, MetadataError> {
    let price_filter = raw
        .get("priceFilter")
        .filter(|value| value.is_object())
        .ok_or(MetadataError::MissingField { field: "priceFilter" })?;
    let lot_filter = raw
        .get("lotSizeFilter")
        .filter(|value| value.is_object())
        .ok_or(MetadataError::MissingField { field: "lotSizeFilter" })?;
    let tick_size = as_decimal(
        price_filter
            .get("tickSize")
            .ok_or(MetadataError::MissingField { field: "priceFilter.tickSize" })?,
        "priceFilter.tickSize",
    )?;
    let step_size = as_decimal(
        lot_filter
            .get("qtyStep")
            .ok_or(MetadataError::MissingField { field: "lotSizeFilter.qtyStep" })?,
        "lotSizeFilter.qtyStep",
    )?;
    let mut min_qty = optional_decimal(lot_filter.get("minQty"), "lotSizeFilter.minQty")?;
    if min_qty.is_none() {
        min_qty =
            optional_decimal(lot_filter.get("minTradingQty"), "lotSizeFilter.minTradingQty")?;
    }
    let mut min_notional = optional_decimal(raw.get("minNotional"), "minNotional")?;
    if min_notional.is_none() {
        min_notional = optional_decimal(raw.get("minTradingValue"), "minTradingValue")?;
    }
    Ok(SymbolMeta { tick_size, step_size, min_notional, min_qty })
}

/// In-memory cache for symbol metadata.
///
/// Keys are (venue lower-cased, symbol upper-cased).
#[derive(Debug, Default)]
pub struct MetadataProvider {
    cache: RwLock<HashMap<(String, String), SymbolMeta>>,
}

impl MetadataProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store metadata for a (venue, symbol) pair.
    pub fn put(&self, venue: &str, symbol: &str, meta: SymbolMeta) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                (venue.to_ascii_lowercase(), symbol.to_ascii_uppercase()),
                meta,
            );
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

impl SymbolMetaSource for MetadataProvider {
    fn get(&self, venue: &str, symbol: &str) -> Option<SymbolMeta> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| {
                cache
                    .get(&(venue.to_ascii_lowercase(), symbol.to_ascii_uppercase()))
                    .cloned()
            })
    }
}
