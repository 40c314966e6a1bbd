// Path: crates/shop-hamt/src/trie.rs
//! The public persistent trie: insert, find, delete, content hash, and
//! canonical round-trip serialization, built atop [`Node`] and
//! [`HashState`].

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::Hash;

use crate::hash_state::HashState;
use crate::node::{Entry, Node};

/// A persistent hash array mapped trie keyed by arbitrary byte strings.
#[derive(Debug, Clone)]
pub struct Hamt<V> {
    root: Node<V>,
}

impl<V> Default for Hamt<V> {
    fn default() -> Self {
        Hamt { root: Node::empty() }
    }
}

enum InsertOutcome {
    Inserted,
    Overwritten,
    NoOp,
}

enum DeleteOutcome {
    Removed,
    NotFound,
}

impl<V: Canonical + Clone + PartialEq> Hamt<V> {
    /// Builds an empty trie.
    pub fn new() -> Self {
        Hamt::default()
    }

    /// The number of key/value pairs in the trie, recomputed by leaf count.
    pub fn size(&self) -> u64 {
        self.root.leaf_count()
    }

    /// The trie's content hash (SHA-256 over its leaf/branch preimages, see
    /// [`Node::hash`]).
    pub fn hash(&self) -> Hash {
        Hash(self.root.hash())
    }

    /// Looks up `key`, returning its value if present.
    pub fn find(&self, key: &[u8]) -> Option<&V> {
        let mut hstate = HashState::new(key);
        Self::find_in(&self.root, &mut hstate, key)
    }

    /// Inserts `key → value`. Returns `true` if this created a new entry,
    /// `false` if it overwrote an existing one or was a no-op (the new
    /// value canonically equals the stored one).
    pub fn insert(&mut self, key: &[u8], value: V) -> bool {
        let mut hstate = HashState::new(key);
        matches!(
            Self::insert_into(&mut self.root, &mut hstate, key, value),
            InsertOutcome::Inserted
        )
    }

    /// Removes `key`. Returns `true` if an entry was removed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let mut hstate = HashState::new(key);
        matches!(
            Self::delete_from(&mut self.root, &mut hstate, key),
            DeleteOutcome::Removed
        )
    }

    /// Visits every key/value pair in the trie's stored (bit-prefix) order.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &V)) {
        self.root.for_each_leaf(&mut f);
    }

    fn find_in<'a>(node: &'a Node<V>, hstate: &mut HashState, key: &[u8]) -> Option<&'a V> {
        let idx = hstate.next();
        if !node.is_occupied(idx) {
            return None;
        }
        let pos = node.position_of(idx);
        match &node.entries[pos] {
            Entry::Leaf { key: ekey, value } => {
                if ekey.as_slice() == key {
                    Some(value)
                } else {
                    None
                }
            }
            Entry::Branch { node: child } => Self::find_in(child, hstate, key),
        }
    }

    fn insert_into(
        node: &mut Node<V>,
        hstate: &mut HashState,
        key: &[u8],
        value: V,
    ) -> InsertOutcome {
        let idx = hstate.next();
        if !node.is_occupied(idx) {
            let pos = node.position_of(idx);
            node.bitmap |= 1u32 << idx;
            node.entries.insert(pos, Entry::Leaf { key: key.to_vec(), value });
            node.invalidate();
            return InsertOutcome::Inserted;
        }

        let pos = node.position_of(idx);
        let existing = std::mem::replace(
            &mut node.entries[pos],
            Entry::Branch { node: Box::new(Node::empty()) },
        );

        match existing {
            Entry::Leaf { key: ekey, value: evalue } => {
                if ekey.as_slice() == key {
                    if evalue == value {
                        node.entries[pos] = Entry::Leaf { key: ekey, value: evalue };
                        InsertOutcome::NoOp
                    } else {
                        node.entries[pos] = Entry::Leaf { key: ekey, value };
                        node.invalidate();
                        InsertOutcome::Overwritten
                    }
                } else {
                    // Collision: split into a child node carrying both keys,
                    // each resuming from the same consumed-bits offset.
                    let mut child = Node::empty();
                    let mut existing_hstate = HashState::replay(&ekey, hstate.steps);
                    Self::insert_into(&mut child, &mut existing_hstate, &ekey, evalue);
                    Self::insert_into(&mut child, hstate, key, value);
                    node.entries[pos] = Entry::Branch { node: Box::new(child) };
                    node.invalidate();
                    InsertOutcome::Inserted
                }
            }
            Entry::Branch { node: mut child } => {
                let outcome = Self::insert_into(&mut child, hstate, key, value);
                node.entries[pos] = Entry::Branch { node: child };
                if !matches!(outcome, InsertOutcome::NoOp) {
                    node.invalidate();
                }
                outcome
            }
        }
    }

    fn delete_from(node: &mut Node<V>, hstate: &mut HashState, key: &[u8]) -> DeleteOutcome {
        let idx = hstate.next();
        if !node.is_occupied(idx) {
            return DeleteOutcome::NotFound;
        }
        let pos = node.position_of(idx);

        if node.entries[pos].is_leaf() {
            let matches_key = match &node.entries[pos] {
                Entry::Leaf { key: ekey, .. } => ekey.as_slice() == key,
                Entry::Branch { .. } => false,
            };
            if !matches_key {
                return DeleteOutcome::NotFound;
            }
            node.entries.remove(pos);
            node.bitmap &= !(1u32 << idx);
            node.invalidate();
            return DeleteOutcome::Removed;
        }

        let outcome = {
            let child = match &mut node.entries[pos] {
                Entry::Branch { node: child } => child,
                Entry::Leaf { .. } => return DeleteOutcome::NotFound,
            };
            Self::delete_from(child, hstate, key)
        };
        if matches!(outcome, DeleteOutcome::NotFound) {
            return DeleteOutcome::NotFound;
        }

        let collapse = match &node.entries[pos] {
            Entry::Branch { node: child } => {
                if child.bitmap == 0 {
                    Some(None)
                } else if child.entries.len() == 1 && child.entries[0].is_leaf() {
                    match &child.entries[0] {
                        Entry::Leaf { key, value } => Some(Some((key.clone(), value.clone()))),
                        Entry::Branch { .. } => None,
                    }
                } else {
                    None
                }
            }
            Entry::Leaf { .. } => None,
        };

        match collapse {
            Some(None) => {
                node.entries.remove(pos);
                node.bitmap &= !(1u32 << idx);
            }
            Some(Some((leaf_key, leaf_value))) => {
                node.entries[pos] = Entry::Leaf { key: leaf_key, value: leaf_value };
            }
            None => {}
        }
        node.invalidate();
        DeleteOutcome::Removed
    }
}

impl<V: Canonical> Canonical for Hamt<V> {
    fn encode(&self, enc: &mut Encoder) {
        self.root.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        Ok(Hamt { root: Node::decode(dec)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    fn wide_key(n: u8) -> Vec<u8> {
        let s = n.to_string();
        s.bytes().cycle().take(32).collect()
    }

    #[test]
    fn empty_trie_matches_spec_vector() {
        let trie: Hamt<String> = Hamt::new();
        assert_eq!(to_bytes_canonical(&trie), vec![0x82, 0x00, 0xF6]);
    }

    #[test]
    fn insert_find_delete_roundtrip() {
        let mut trie: Hamt<u64> = Hamt::new();
        assert!(trie.insert(b"alpha", 1));
        assert!(trie.insert(b"beta", 2));
        assert!(!trie.insert(b"alpha", 1)); // no-op, same value
        assert!(!trie.insert(b"alpha", 5)); // overwrite
        assert_eq!(trie.find(b"alpha"), Some(&5));
        assert_eq!(trie.find(b"beta"), Some(&2));
        assert_eq!(trie.find(b"missing"), None);
        assert_eq!(trie.size(), 2);

        assert!(trie.delete(b"alpha"));
        assert!(!trie.delete(b"alpha")); // already gone
        assert_eq!(trie.find(b"alpha"), None);
        assert_eq!(trie.size(), 1);
    }

    #[test]
    fn hash_is_independent_of_insertion_order() {
        let pairs: Vec<(Vec<u8>, String)> = (1..=10)
            .map(|i| (wide_key(i), format!("value{i}")))
            .collect();

        let mut baseline: Hamt<String> = Hamt::new();
        for (k, v) in &pairs {
            baseline.insert(k, v.clone());
        }
        let baseline_hash = baseline.hash();

        let mut rng_state: u64 = 0x9E3779B97F4A7C15;
        let mut next_rand = move || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            rng_state
        };

        for _ in 0..25 {
            let mut permuted = pairs.clone();
            // Fisher-Yates using a small xorshift PRNG, deterministic per run.
            for i in (1..permuted.len()).rev() {
                let j = (next_rand() as usize) % (i + 1);
                permuted.swap(i, j);
            }
            let mut trie: Hamt<String> = Hamt::new();
            for (k, v) in &permuted {
                trie.insert(k, v.clone());
            }
            assert_eq!(trie.hash(), baseline_hash);
        }
    }

    #[test]
    fn serialize_deserialize_preserves_hash_and_size() {
        let mut trie: Hamt<u64> = Hamt::new();
        for i in 0..40u64 {
            trie.insert(&i.to_be_bytes(), i);
        }
        let bytes = to_bytes_canonical(&trie);
        let back: Hamt<u64> = from_bytes_canonical(&bytes).unwrap();
        assert_eq!(back.hash(), trie.hash());
        assert_eq!(back.size(), trie.size());
        for i in 0..40u64 {
            assert_eq!(back.find(&i.to_be_bytes()), Some(&i));
        }
    }

    #[test]
    fn decrement_then_increment_restores_value() {
        // Exercised at the u64 level here; the Patcher owns the
        // OutOfStock/underflow policy for Inventory specifically.
        let mut trie: Hamt<u64> = Hamt::new();
        trie.insert(b"sku", 50);
        let current = *trie.find(b"sku").unwrap();
        trie.insert(b"sku", current - 20);
        let decremented = *trie.find(b"sku").unwrap();
        trie.insert(b"sku", decremented + 20);
        assert_eq!(trie.find(b"sku"), Some(&50));
    }

    proptest::proptest! {
        /// For 1000 arbitrary permutations of the same 10 key/value pairs,
        /// the resulting trie hash always matches the baseline insertion
        /// order's hash: the hash is a function of the key/value set, not
        /// of arrival order.
        #[test]
        fn hash_is_independent_of_insertion_order_across_many_permutations(seed in proptest::prelude::any::<u64>()) {
            let pairs: Vec<(Vec<u8>, String)> = (1..=10).map(|i| (wide_key(i), format!("value{i}"))).collect();

            let mut baseline: Hamt<String> = Hamt::new();
            for (k, v) in &pairs {
                baseline.insert(k, v.clone());
            }
            let baseline_hash = baseline.hash();

            let mut rng_state = seed | 1;
            let mut next_rand = move || {
                rng_state ^= rng_state << 13;
                rng_state ^= rng_state >> 7;
                rng_state ^= rng_state << 17;
                rng_state
            };
            let mut permuted = pairs.clone();
            for i in (1..permuted.len()).rev() {
                let j = (next_rand() as usize) % (i + 1);
                permuted.swap(i, j);
            }

            let mut trie: Hamt<String> = Hamt::new();
            for (k, v) in &permuted {
                trie.insert(k, v.clone());
            }
            proptest::prop_assert_eq!(trie.hash(), baseline_hash);
        }
    }
}
