// Path: crates/shop-hamt/src/lib.rs
//! # Shop HAMT Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
//!
//! `clippy::indexing_slicing` is not included here, unlike the workspace's
//! other crates: the trie's slot arithmetic (`position_of`, `is_occupied`)
//! keeps every index bounds-derived from the occupancy bitmap itself, and
//! the lint would force `get()`/`get_mut()` plumbing with no matching
//! safety benefit over the invariant the bitmap already gives us.
#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]
//! # Shop HAMT
//!
//! A persistent Hash Array Mapped Trie mapping arbitrary byte keys to a
//! generic, canonically-encodable value. Used by the shop model to back its
//! five entity tables (Accounts, Listings, Tags, Orders, Inventory).
//!
//! Step width is fixed at 5 bits per level with a 32-bit occupancy bitmap;
//! key-hash exhaustion is handled by rehashing with an incrementing seed
//! rather than falling back to a linear scan (see `DESIGN.md`). Both
//! choices must match across any two parties comparing trie hashes.

mod hash_state;
mod node;
mod trie;

pub use hash_state::HashState;
pub use node::{Entry, Node};
pub use trie::Hamt;
