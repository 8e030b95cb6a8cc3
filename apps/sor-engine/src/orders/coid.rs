//! Deterministic client order identifiers and intent fingerprints.
//!
//! The client order id (COID) is the stable handle the kernel uses for an
//! order across retries and restarts: same normalized inputs, same COID.
//! The intent fingerprint is a content hash over the economically relevant
//! intent fields (nonce and timestamp excluded) and keys the short-window
//! dedup cache and the idempotency outbox.

use blake2::digest::consts::U10;
use blake2::{Blake2b, Digest};
use rust_decimal::{Decimal, RoundingStrategy};
use sha2::Sha256;

use crate::orders::intent::OrderIntent;

/// Identifier prefix marking kernel-issued COIDs.
const COID_PREFIX: &str = "SR";

/// Maximum identifier width accepted by every supported venue.
const COID_MAX_LEN: usize = 32;

type Blake2b80 = Blake2b<U10>;

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Derive the deterministic client order identifier for an intent tuple.
///
/// Inputs are trimmed and lower-cased before hashing; the digest is a
/// 10-byte Blake2b keyed over the joined tuple, rendered as unpadded
/// base32. The result is ASCII, fixed-width and at most 32 characters.
#[must_use]
pub fn make_coid(
    strategy: &str,
    venue: &str,
    symbol: &str,
    side: &str,
    ts_ns: i64,
    nonce: u64,
) -> String {
    let payload = [
        normalize(strategy),
        normalize(venue),
        normalize(symbol),
        normalize(side),
        ts_ns.to_string(),
        nonce.to_string(),
    ]
    .join("|");
    let mut hasher = Blake2b80::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    let token = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &digest);
    let mut coid = format!("{COID_PREFIX}{token}");
    coid.truncate(COID_MAX_LEN);
    coid
}

fn quantize(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(8, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(8);
    rounded.to_string()
}

fn optional_text(value: Option<&str>) -> String {
    value.map_or_else(String::new, |text| text.trim().to_string())
}

/// Compute the canonical fingerprint of an intent.
///
/// The fingerprint covers venue, symbol, side, price and quantity rounded
/// to 1e-8 (banker's rounding), strategy, client tag and parent id. It is
/// independent of nonce and timestamp so a retried intent hashes the same.
/// The hex SHA-256 digest doubles as the outbox `intent_key`.
#[must_use]
pub fn intent_key(intent: &OrderIntent) -> String {
    let fields = [
        intent.venue.trim().to_string(),
        intent.symbol.trim().to_string(),
        normalize(intent.side.as_str()),
        intent.price.map_or_else(String::new, quantize),
        quantize(intent.qty),
        normalize(&intent.strategy),
        optional_text(intent.client_tag.as_deref()),
        optional_text(intent.parent_id.as_deref()),
    ];
    let payload = fields.join("|");
    let digest = Sha256::digest(payload.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::intent::Side;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn intent() -> OrderIntent {
        OrderIntent::new(
            "alpha",
            "binance-um",
            "BTCUSDT",
            Side::Buy,
            dec!(1.5),
            Some(dec!(25000.1)),
            1_700_000_000_000_000_000,
            7,
        )
    }

    #[test]
    fn coid_is_deterministic_and_bounded() {
        let a = make_coid("alpha", "binance-um", "BTCUSDT", "buy", 123, 1);
        let b = make_coid(" Alpha ", "BINANCE-UM", "btcusdt", "BUY", 123, 1);
        assert_eq!(a, b);
        assert!(a.len() <= 32);
        assert!(a.starts_with("SR"));
        assert!(a.is_ascii());
    }

    #[test]
    fn coid_changes_with_any_field() {
        let base = make_coid("alpha", "binance-um", "BTCUSDT", "buy", 123, 1);
        assert_ne!(base, make_coid("alpha", "binance-um", "BTCUSDT", "buy", 123, 2));
        assert_ne!(base, make_coid("alpha", "binance-um", "BTCUSDT", "sell", 123, 1));
        assert_ne!(base, make_coid("alpha", "okx-perp", "BTCUSDT", "buy", 123, 1));
        assert_ne!(base, make_coid("alpha", "binance-um", "BTCUSDT", "buy", 124, 1));
    }

    #[test]
    fn fingerprint_ignores_nonce_and_timestamp() {
        let a = intent();
        let mut b = intent();
        b.nonce = 99;
        b.ts_ns = 42;
        assert_eq!(intent_key(&a), intent_key(&b));
    }

    #[test]
    fn fingerprint_tracks_price_at_1e8() {
        let a = intent();
        let mut b = intent();
        b.price = Some(dec!(25000.10000001));
        let mut c = intent();
        c.price = Some(dec!(25000.100000001));
        assert_ne!(intent_key(&a), intent_key(&b));
        // Below the quantum the price rounds back to the same fingerprint.
        assert_eq!(intent_key(&a), intent_key(&c));
    }

    proptest! {
        #[test]
        fn coid_width_holds_for_arbitrary_inputs(
            strategy in "[a-zA-Z0-9_-]{0,24}",
            venue in "[a-zA-Z0-9_-]{0,24}",
            ts_ns in 0i64..i64::MAX,
            nonce in 0u64..u64::MAX,
        ) {
            let coid = make_coid(&strategy, &venue, "BTCUSDT", "buy", ts_ns, nonce);
            prop_assert!(coid.len() <= 32);
            prop_assert!(coid.is_ascii());
            prop_assert_eq!(coid.clone(), make_coid(&strategy, &venue, "BTCUSDT", "buy", ts_ns, nonce));
        }
    }
}
