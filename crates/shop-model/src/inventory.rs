// Path: crates/shop-model/src/inventory.rs
//! Key derivation for the Inventory table, the one HAMT in the shop keyed by
//! a variable-length byte string rather than a fixed-width identifier.

use shop_types::primitives::ObjectId;

/// Builds the Inventory HAMT key for `listing_id` combined with a set of
/// variation ids: the listing id's 8-byte big-endian form, followed by the
/// variation ids sorted lexicographically and joined with `|`.
///
/// Sorting before joining makes the key independent of the order variation
/// ids were supplied in, so `["red", "xl"]` and `["xl", "red"]` address the
/// same inventory count.
pub fn inventory_key(listing_id: ObjectId, variation_ids: &[String]) -> Vec<u8> {
    let mut sorted: Vec<&str> = variation_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut key = listing_id.to_be_bytes().to_vec();
    key.extend_from_slice(sorted.join("|").as_bytes());
    key
}
