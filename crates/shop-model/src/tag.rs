// Path: crates/shop-model/src/tag.rs
//! A named grouping of listings.

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::ObjectId;

/// `{Name, ListingIDs}`. Referential integrity (every id names an existing
/// listing) is enforced by the patcher, which has the shop in scope; this
/// type only guarantees its own shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag {
    /// The tag's name, used as its own HAMT key.
    pub name: String,
    /// Listings grouped under this tag, in insertion order.
    pub listing_ids: Vec<ObjectId>,
}

impl Tag {
    /// Structural validation: a non-blank name.
    pub fn validate(&self) -> Result<(), ShopError> {
        if self.name.trim().is_empty() {
            return Err(ShopError::validation("tag name must be non-blank"));
        }
        Ok(())
    }
}

impl Canonical for Tag {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        self.name.encode(enc);
        self.listing_ids.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        Ok(Tag {
            name: String::decode(dec)?,
            listing_ids: Canonical::decode(dec)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn tag_roundtrips() {
        let tag = Tag { name: "featured".into(), listing_ids: vec![ObjectId(1), ObjectId(2)] };
        let bytes = to_bytes_canonical(&tag);
        assert_eq!(from_bytes_canonical::<Tag>(&bytes).unwrap(), tag);
    }

    #[test]
    fn blank_name_is_rejected() {
        let tag = Tag { name: "   ".into(), listing_ids: vec![] };
        assert!(tag.validate().is_err());
    }
}
