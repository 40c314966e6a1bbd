// Path: crates/shop-mmr/src/store.rs
//! Pluggable leaf storage for the MMR.
//!
//! The authenticator only ever needs an append-only log of leaf hashes;
//! swapping [`InMemoryMmrStore`] for a persisted table-backed store (one
//! `(tree_id, leaf_index) -> bytes` table per the layout external storage
//! would use) requires nothing more than a new `MmrStore` impl.

use parking_lot::Mutex;
use shop_types::error::ShopError;
use shop_types::primitives::Hash;

/// An append-only store of leaf hashes, addressed by position (0-indexed
/// insertion order).
pub trait MmrStore {
    /// Appends `leaf` and returns its position.
    fn append_leaf(&self, leaf: Hash) -> u64;

    /// Returns the leaf at `position`, if any.
    fn get_leaf(&self, position: u64) -> Option<Hash>;

    /// The number of leaves stored.
    fn leaf_count(&self) -> u64;

    /// Returns every leaf hash in insertion order. Used to rebuild peak
    /// subtrees for root computation and proof generation.
    fn all_leaves(&self) -> Vec<Hash>;
}

/// The default, process-local [`MmrStore`]: a single mutex-guarded vector.
#[derive(Debug, Default)]
pub struct InMemoryMmrStore {
    leaves: Mutex<Vec<Hash>>,
}

impl InMemoryMmrStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MmrStore for InMemoryMmrStore {
    fn append_leaf(&self, leaf: Hash) -> u64 {
        let mut leaves = self.leaves.lock();
        let position = leaves.len() as u64;
        leaves.push(leaf);
        position
    }

    fn get_leaf(&self, position: u64) -> Option<Hash> {
        self.leaves.lock().get(position as usize).copied()
    }

    fn leaf_count(&self) -> u64 {
        self.leaves.lock().len() as u64
    }

    fn all_leaves(&self) -> Vec<Hash> {
        self.leaves.lock().clone()
    }
}

/// Builds a `ShopError::NotFound` for an out-of-range leaf position, used by
/// both direct `get` and proof construction.
pub fn leaf_not_found(position: u64) -> ShopError {
    ShopError::not_found(format!("no MMR leaf at position {position}"))
}
