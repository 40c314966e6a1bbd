// Path: crates/shop-mmr/src/mmr.rs
//! An append-only Merkle Mountain Range: a forest of perfect binary trees,
//! one per set bit of the current leaf count, bagged into a single root.
//!
//! Appending a leaf never rewrites an existing node: the new leaf either
//! becomes its own one-leaf peak, or merges with the trailing run of
//! equal-height peaks exactly as a binary counter carries, which is why the
//! peak heights present at any time are precisely the set bits of
//! `leaf_count` in binary.

use shop_crypto::hash::keccak256;
use shop_types::primitives::Hash;

use crate::store::{leaf_not_found, InMemoryMmrStore, MmrStore};

/// Hashes two child node hashes into their parent, `H(left || right)`.
fn hash_pair(left: Hash, right: Hash) -> Hash {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&left.0);
    buf.extend_from_slice(&right.0);
    keccak256(&buf)
}

/// Hashes a leaf's raw bytes into its leaf-node hash.
fn hash_leaf(bytes: &[u8]) -> Hash {
    keccak256(bytes)
}

/// Bags an ordered list of peak hashes into a single root by hashing their
/// concatenation. The empty forest's root is the hash of the empty string.
fn bag_peaks(peaks: &[Hash]) -> Hash {
    let mut buf = Vec::with_capacity(peaks.len() * 32);
    for peak in peaks {
        buf.extend_from_slice(&peak.0);
    }
    keccak256(&buf)
}

/// Returns `(start, len)` leaf ranges for every peak of a forest holding
/// `leaf_count` leaves, ordered from the first (largest, earliest) peak to
/// the last (smallest, most recent) — the same order leaves were merged in.
fn peak_leaf_ranges(leaf_count: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut start = 0u64;
    for bit in (0..64).rev() {
        if leaf_count & (1 << bit) != 0 {
            let len = 1u64 << bit;
            ranges.push((start, len));
            start += len;
        }
    }
    ranges
}

/// Builds the perfect binary tree over `leaves` bottom-up and returns its
/// root alongside, for `target` (an index within `leaves`), the sibling
/// hash recorded at each level from the bottom up.
fn fold_tree(leaves: &[Hash], target: Option<usize>) -> (Hash, Vec<Hash>) {
    if leaves.len() == 1 {
        return (leaves[0], Vec::new());
    }
    let mid = leaves.len() / 2;
    let (left_leaves, right_leaves) = leaves.split_at(mid);
    let went_left = target.map(|t| t < mid);
    let (left_root, mut left_path) = fold_tree(left_leaves, target.filter(|_| went_left == Some(true)));
    let (right_root, mut right_path) =
        fold_tree(right_leaves, target.map(|t| t - mid).filter(|_| went_left == Some(false)));

    let mut siblings = Vec::new();
    match went_left {
        Some(true) => {
            siblings.append(&mut left_path);
            siblings.push(right_root);
        }
        Some(false) => {
            siblings.append(&mut right_path);
            siblings.push(left_root);
        }
        None => {}
    }
    (hash_pair(left_root, right_root), siblings)
}

/// An inclusion proof for one leaf against a specific MMR root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// The leaf's global position (insertion order).
    pub leaf_index: u64,
    /// The leaf's own node hash.
    pub leaf_hash: Hash,
    /// Sibling hashes from the leaf up to the root of its containing peak,
    /// bottom-up.
    pub siblings: Vec<Hash>,
    /// Which peak (0-indexed, first/largest peak first) the leaf belongs to.
    pub peak_index: usize,
    /// Every other peak's hash, in their final left-to-right order.
    pub other_peaks: Vec<Hash>,
}

/// The total node count (leaves plus internal nodes) an MMR will have
/// accumulated after `leaf_count` leaves have been appended. Each append
/// triggers exactly as many merges as trailing one-bits it completes, so
/// the running total of internal nodes created is `leaf_count -
/// leaf_count.count_ones()`.
pub fn first_mmr_size(leaf_count: u64) -> u64 {
    2 * leaf_count - leaf_count.count_ones() as u64
}

/// An append-only Merkle Mountain Range over an [`MmrStore`].
#[derive(Debug, Default)]
pub struct Mmr<S: MmrStore = InMemoryMmrStore> {
    store: S,
}

impl Mmr<InMemoryMmrStore> {
    /// Builds an empty, process-local MMR.
    pub fn new() -> Self {
        Mmr { store: InMemoryMmrStore::new() }
    }
}

impl<S: MmrStore> Mmr<S> {
    /// Wraps an existing store.
    pub fn with_store(store: S) -> Self {
        Mmr { store }
    }

    /// Appends a leaf's raw bytes, returning its position.
    pub fn append(&self, leaf_bytes: &[u8]) -> u64 {
        self.store.append_leaf(hash_leaf(leaf_bytes))
    }

    /// Returns the leaf hash stored at `position`.
    pub fn get(&self, position: u64) -> Option<Hash> {
        self.store.get_leaf(position)
    }

    /// The number of leaves appended so far.
    pub fn leaf_count(&self) -> u64 {
        self.store.leaf_count()
    }

    fn peaks(&self) -> Vec<Hash> {
        let leaves = self.store.all_leaves();
        peak_leaf_ranges(leaves.len() as u64)
            .into_iter()
            .map(|(start, len)| fold_tree(&leaves[start as usize..(start + len) as usize], None).0)
            .collect()
    }

    /// The bagged root over every current peak.
    pub fn root(&self) -> Hash {
        bag_peaks(&self.peaks())
    }

    /// Builds an inclusion proof for the leaf at `leaf_index`.
    pub fn inclusion_proof(&self, leaf_index: u64) -> Result<InclusionProof, shop_types::error::ShopError> {
        let leaves = self.store.all_leaves();
        if leaf_index >= leaves.len() as u64 {
            return Err(leaf_not_found(leaf_index));
        }
        let ranges = peak_leaf_ranges(leaves.len() as u64);
        let (peak_index, (start, len)) = ranges
            .iter()
            .enumerate()
            .find(|(_, (start, len))| leaf_index >= *start && leaf_index < start + len)
            .map(|(i, r)| (i, *r))
            .ok_or_else(|| leaf_not_found(leaf_index))?;

        let local_index = (leaf_index - start) as usize;
        let subtree = &leaves[start as usize..(start + len) as usize];
        let (_, siblings) = fold_tree(subtree, Some(local_index));

        let mut other_peaks = Vec::with_capacity(ranges.len().saturating_sub(1));
        for (i, (s, l)) in ranges.iter().enumerate() {
            if i == peak_index {
                continue;
            }
            other_peaks.push(fold_tree(&leaves[*s as usize..(*s + *l) as usize], None).0);
        }

        Ok(InclusionProof {
            leaf_index,
            leaf_hash: leaves[leaf_index as usize],
            siblings,
            peak_index,
            other_peaks,
        })
    }
}

/// Verifies `proof` reconstructs `expected_root`.
pub fn verify(proof: &InclusionProof, expected_root: Hash) -> bool {
    let current = fold_with_index(proof.leaf_index, &proof.siblings, proof.leaf_hash);

    let mut full_peaks = proof.other_peaks.clone();
    if proof.peak_index > full_peaks.len() {
        return false;
    }
    full_peaks.insert(proof.peak_index, current);
    bag_peaks(&full_peaks) == expected_root
}

/// Folds `leaf_hash` up through `siblings` using `global_leaf_index`'s low
/// bits to choose, at each level, whether the accumulator is the left or
/// right child.
///
/// `fold_tree` records siblings bottom-up (the leaf's immediate sibling
/// first, the peak subtree's top-level sibling last), splitting its leaf
/// range in half at every level. Because every peak's leaf range starts at
/// a multiple of the peak's own size, the local index within the peak
/// shares its low bits with the global leaf index, and the direction at
/// the `k`-th level from the bottom is exactly bit `k` of that index —
/// lowest bit first, matching `siblings`' bottom-up order directly.
fn fold_with_index(global_leaf_index: u64, siblings: &[Hash], leaf_hash: Hash) -> Hash {
    let mut current = leaf_hash;
    let mut idx = global_leaf_index;
    for sibling in siblings {
        current = if idx & 1 == 0 { hash_pair(current, *sibling) } else { hash_pair(*sibling, current) };
        idx >>= 1;
    }
    current
}
