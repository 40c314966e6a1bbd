// Path: crates/shop-mmr/src/lib.rs
//! # Shop MMR Crate Lints
//!
//! `clippy::indexing_slicing` is dropped here for the same reason as in
//! `shop-hamt`: the peak-subtree recursion slices leaf ranges whose bounds
//! are derived from the peak decomposition itself, not from external input,
//! so the lint would add `get()` plumbing with no real safety benefit.
#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::unimplemented, clippy::todo)
)]

//! # Shop MMR
//!
//! An append-only Merkle Mountain Range used to authenticate an ordered
//! batch of patches: each patch becomes a leaf, the forest of perfect
//! binary peaks is bagged into a root, and any single leaf can later be
//! proven included against that root without needing the rest of the
//! batch's leaves.

pub mod mmr;
pub mod store;

pub use mmr::{first_mmr_size, verify, InclusionProof, Mmr};
pub use store::{InMemoryMmrStore, MmrStore};
