// Path: crates/shop-crypto/src/hash.rs
//! The two digest functions the protocol depends on: SHA-256 for HAMT and
//! shop content hashes, and Keccak-256 for MMR leaves and header signing.

use sha2::{Digest, Sha256};
use sha3::Keccak256 as Keccak256Digest;
use shop_types::primitives::Hash;

/// SHA-256, used for HAMT node hashes and the shop content hash.
pub fn sha256(message: &[u8]) -> Hash {
    let digest = Sha256::digest(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// Keccak-256, used for MMR leaf hashing and the patch-set header signature
/// preimage.
pub fn keccak256(message: &[u8]) -> Hash {
    let digest = Keccak256Digest::digest(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}
