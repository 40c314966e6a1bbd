// Path: crates/shop-auth/src/header.rs
//! The authenticated envelope around an ordered batch of patches: a
//! `PatchSetHeader` binding a nonce, the shop's identity, a timestamp and a
//! Merkle root, and the `SignedPatchSet` that carries it alongside its
//! signature and the patches it commits to.

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::{Hash, Signature, Timestamp, Uint256};

use crate::root::compute_root_hash;
use shop_patch::Patch;

/// `{KeyCardNonce, ShopID, Timestamp, RootHash}`, the preimage signed over
/// to authenticate one patch set.
///
/// `KeyCardNonce` increases with every patch set a given KeyCard submits,
/// the replay-protection counterpart to `SchemaVersion`'s monotonic bump on
/// the shop side; it is validated non-zero but its monotonicity against
/// prior nonces is a property of the caller's nonce ledger, not of this
/// header in isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSetHeader {
    /// The submitting KeyCard's per-shop nonce; must be non-zero.
    pub key_card_nonce: u64,
    /// The shop this patch set applies to.
    pub shop_id: Uint256,
    /// When the patch set was assembled.
    pub timestamp: Timestamp,
    /// The padded MMR root over the patch set's canonical patch encodings.
    pub root_hash: Hash,
}

impl PatchSetHeader {
    /// Structural validation: `KeyCardNonce` must be non-zero.
    pub fn validate(&self) -> Result<(), ShopError> {
        if self.key_card_nonce == 0 {
            return Err(ShopError::validation("PatchSetHeader KeyCardNonce must be non-zero"));
        }
        Ok(())
    }
}

impl Canonical for PatchSetHeader {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(4);
        self.key_card_nonce.encode(enc);
        self.shop_id.encode(enc);
        self.timestamp.encode(enc);
        self.root_hash.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(4)?;
        Ok(PatchSetHeader {
            key_card_nonce: u64::decode(dec)?,
            shop_id: Uint256::decode(dec)?,
            timestamp: Timestamp::decode(dec)?,
            root_hash: Hash::decode(dec)?,
        })
    }
}

/// `{Header, Signature, Patches}`: a header, the KeyCard's signature over
/// its canonical encoding, and the ordered patches the header's root
/// commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPatchSet {
    /// The signed header.
    pub header: PatchSetHeader,
    /// The KeyCard's ECDSA signature over `header`'s canonical encoding.
    pub signature: Signature,
    /// The ordered patches this patch set applies.
    pub patches: Vec<Patch>,
}

impl SignedPatchSet {
    /// Recomputes the padded MMR root over `self.patches` and compares it
    /// against `self.header.root_hash`.
    pub fn root_matches_header(&self) -> bool {
        compute_root_hash(&self.patches) == self.header.root_hash
    }
}

impl Canonical for SignedPatchSet {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(3);
        self.header.encode(enc);
        self.signature.encode(enc);
        self.patches.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(3)?;
        Ok(SignedPatchSet {
            header: PatchSetHeader::decode(dec)?,
            signature: Signature::decode(dec)?,
            patches: Canonical::decode(dec)?,
        })
    }
}
