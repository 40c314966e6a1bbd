// Path: crates/shop-hamt/src/node.rs
//! Trie node layout: a bitmap-addressed table of leaf and branch entries,
//! with a lazily computed, cached content hash.

use std::cell::Cell;

use shop_crypto::hash::sha256;
use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;

/// A 32-byte node content hash.
pub type NodeHash = [u8; 32];

/// One occupied slot in a [`Node`]'s entry table: either a leaf carrying a
/// key/value pair, or a branch carrying a child node.
#[derive(Debug, Clone)]
pub enum Entry<V> {
    /// A terminal key/value pair.
    Leaf {
        /// The full original key.
        key: Vec<u8>,
        /// The stored value.
        value: V,
    },
    /// A pointer to a child node one level deeper.
    Branch {
        /// The child node.
        node: Box<Node<V>>,
    },
}

impl<V> Entry<V> {
    /// Returns whether this slot is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Entry::Leaf { .. })
    }
}

/// An encoded `{Bitmap, Entries}` trie node. Occupancy of `bitmap`'s set
/// bits always matches `entries.len()`; entries are stored in ascending
/// slot-index order so serialization and hashing never depend on the order
/// keys arrived in.
#[derive(Debug, Clone)]
pub struct Node<V> {
    /// Occupancy mask; bit `i` set means slot `i` holds an entry.
    pub bitmap: u32,
    /// Occupied slots, sorted by ascending slot index.
    pub entries: Vec<Entry<V>>,
    cached_hash: Cell<Option<NodeHash>>,
}

impl<V> Node<V> {
    /// Builds an empty node.
    pub fn empty() -> Self {
        Node {
            bitmap: 0,
            entries: Vec::new(),
            cached_hash: Cell::new(None),
        }
    }

    /// The popcount-derived position an occupied `idx` slot would occupy in
    /// `entries`, i.e. the number of set bits below `idx`.
    pub fn position_of(&self, idx: u32) -> usize {
        (self.bitmap & ((1u32 << idx) - 1)).count_ones() as usize
    }

    /// Whether slot `idx` is occupied.
    pub fn is_occupied(&self, idx: u32) -> bool {
        self.bitmap & (1u32 << idx) != 0
    }

    /// Clears any cached content hash; must be called whenever this node's
    /// serialized content (bitmap or entries) changes.
    pub fn invalidate(&self) {
        self.cached_hash.set(None);
    }
}

impl<V: Canonical> Node<V> {
    /// Computes (and caches) this node's content hash per the 4.2.7 rule:
    /// leaves contribute their key bytes then the canonical encoding of
    /// their value; branches contribute their child's hash, recursively.
    pub fn hash(&self) -> NodeHash {
        if let Some(cached) = self.cached_hash.get() {
            return cached;
        }
        let mut preimage = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Leaf { key, value } => {
                    preimage.extend_from_slice(key);
                    let mut enc = Encoder::new();
                    value.encode(&mut enc);
                    preimage.extend_from_slice(&enc.into_bytes());
                }
                Entry::Branch { node } => {
                    preimage.extend_from_slice(&node.hash());
                }
            }
        }
        let digest = sha256(&preimage).0;
        self.cached_hash.set(Some(digest));
        digest
    }

    /// The total number of leaves reachable from this node, recomputed by
    /// traversal rather than tracked incrementally (serialization carries
    /// no size field, per the wire format).
    pub fn leaf_count(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e {
                Entry::Leaf { .. } => 1,
                Entry::Branch { node } => node.leaf_count(),
            })
            .sum()
    }

    /// Visits every leaf in stored (ascending slot-index) order.
    pub fn for_each_leaf<'a>(&'a self, f: &mut dyn FnMut(&'a [u8], &'a V)) {
        for entry in &self.entries {
            match entry {
                Entry::Leaf { key, value } => f(key, value),
                Entry::Branch { node } => node.for_each_leaf(f),
            }
        }
    }
}

impl<V: Canonical> Canonical for Node<V> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        enc.write_uint(self.bitmap as u64);
        if self.entries.is_empty() {
            enc.write_null();
        } else {
            enc.write_array_header(self.entries.len() as u64);
            for entry in &self.entries {
                encode_entry(entry, enc);
            }
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        let bitmap = dec.read_uint()?;
        if bitmap > u32::MAX as u64 {
            return Err(ShopError::DecodeMismatch("bitmap exceeds 32 bits".into()));
        }
        let bitmap = bitmap as u32;

        let entries = if dec.peek_is_null() {
            dec.read_null()?;
            Vec::new()
        } else {
            let len = dec.read_array_header()?;
            let mut out = Vec::with_capacity(len as usize);
            for _ in 0..len {
                out.push(decode_entry(dec)?);
            }
            out
        };

        if bitmap.count_ones() as usize != entries.len() {
            return Err(ShopError::DecodeMismatch(
                "bitmap popcount does not match entry count".into(),
            ));
        }

        Ok(Node {
            bitmap,
            entries,
            cached_hash: Cell::new(None),
        })
    }
}

fn encode_entry<V: Canonical>(entry: &Entry<V>, enc: &mut Encoder) {
    enc.write_array_header(3);
    match entry {
        Entry::Leaf { key, value } => {
            enc.write_bytes(key);
            value.encode(enc);
            enc.write_null();
        }
        Entry::Branch { node } => {
            enc.write_null();
            enc.write_null();
            node.encode(enc);
        }
    }
}

fn decode_entry<V: Canonical>(dec: &mut Decoder<'_>) -> Result<Entry<V>, ShopError> {
    dec.read_array_header_exact(3)?;
    let key = Option::<Vec<u8>>::decode(dec)?;
    match key {
        Some(key) => {
            let value = V::decode(dec)?;
            let node_slot: Option<()> = if dec.peek_is_null() {
                dec.read_null()?;
                None
            } else {
                return Err(ShopError::DecodeMismatch(
                    "leaf entry must carry a null node slot".into(),
                ));
            };
            let _ = node_slot;
            Ok(Entry::Leaf { key, value })
        }
        None => {
            if !dec.peek_is_null() {
                return Err(ShopError::DecodeMismatch(
                    "branch entry must carry a null value slot".into(),
                ));
            }
            dec.read_null()?;
            let node = Node::decode(dec)?;
            Ok(Entry::Branch { node: Box::new(node) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn empty_node_matches_spec_vector() {
        let node: Node<u64> = Node::empty();
        assert_eq!(to_bytes_canonical(&node), vec![0x82, 0x00, 0xF6]);
    }

    #[test]
    fn leaf_roundtrips() {
        let mut node: Node<u64> = Node::empty();
        node.bitmap = 0b1;
        node.entries.push(Entry::Leaf { key: vec![1, 2, 3], value: 42 });
        let bytes = to_bytes_canonical(&node);
        let back: Node<u64> = from_bytes_canonical(&bytes).unwrap();
        assert_eq!(back.bitmap, node.bitmap);
        assert_eq!(back.leaf_count(), 1);
    }

    #[test]
    fn branch_roundtrips_and_hashes_match() {
        let mut child: Node<u64> = Node::empty();
        child.bitmap = 0b1;
        child.entries.push(Entry::Leaf { key: vec![9], value: 7 });

        let mut parent: Node<u64> = Node::empty();
        parent.bitmap = 0b10;
        parent.entries.push(Entry::Branch { node: Box::new(child) });

        let bytes = to_bytes_canonical(&parent);
        let back: Node<u64> = from_bytes_canonical(&bytes).unwrap();
        assert_eq!(back.hash(), parent.hash());
        assert_eq!(back.leaf_count(), 1);
    }

    #[test]
    fn mismatched_bitmap_popcount_is_rejected() {
        let mut node: Node<u64> = Node::empty();
        node.bitmap = 0b11; // claims two entries
        node.entries.push(Entry::Leaf { key: vec![1], value: 1 }); // only one
        let bytes = to_bytes_canonical(&node);
        let err = from_bytes_canonical::<Node<u64>>(&bytes).unwrap_err();
        assert!(matches!(err, ShopError::DecodeMismatch(_)));
    }
}
