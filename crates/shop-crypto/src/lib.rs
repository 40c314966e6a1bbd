// Path: crates/shop-crypto/src/lib.rs
//! # Shop Crypto Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
//! # Shop Cryptography
//!
//! The two primitives the shop integrity spine depends on: digests (SHA-256
//! for HAMT and content hashing, Keccak-256 for MMR leaves and header
//! signing) and ECDSA-on-secp256k1 signing/recovery over a KeyCard's key
//! pair.

/// SHA-256 and Keccak-256 digest functions.
pub mod hash;
/// ECDSA secp256k1 signing, recovery and verification.
pub mod sign;
