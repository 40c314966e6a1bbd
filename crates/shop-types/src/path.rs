// Path: crates/shop-types/src/path.rs
//! The typed, path-addressed discriminator used by every [`Patch`](crate) to
//! name the shop entity and sub-field a mutation targets.
//!
//! On the wire a path is the opaque array `[type_string, id?, ...fields]`;
//! the `id` element is omitted iff the type is `Manifest` or `SchemaVersion`.
//! Trailing `fields` are heterogeneous — a field name, a numeric array
//! index, or the JSON-Patch `"-"` append marker — and their original CBOR
//! major type is preserved on decode so an index is never confused with a
//! map key of the same textual shape.

use crate::codec::{Canonical, Decoder, Encoder};
use crate::error::ShopError;
use crate::primitives::{EthereumAddress, ObjectId};

/// One element of a path's trailing sub-field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// A named struct field or map key, e.g. `"Metadata"`.
    Field(String),
    /// A numeric array index.
    Index(u64),
    /// The JSON-Patch `"-"` marker meaning "append to the end of the array".
    Append,
    /// A raw byte-string map key, e.g. an [`EthereumAddress`] keying a
    /// `Payees` or `AcceptedCurrencies` entry.
    Bytes(Vec<u8>),
}

impl PathElement {
    /// Returns the field name if this element is a [`PathElement::Field`].
    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathElement::Field(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the numeric index if this element is a [`PathElement::Index`].
    pub fn as_index(&self) -> Option<u64> {
        match self {
            PathElement::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the raw bytes if this element is a [`PathElement::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PathElement::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Builds a path element carrying an [`EthereumAddress`] map key.
    pub fn address(addr: EthereumAddress) -> Self {
        PathElement::Bytes(addr.0.to_vec())
    }

    /// Returns the address if this element is a 20-byte [`PathElement::Bytes`].
    pub fn as_address(&self) -> Option<EthereumAddress> {
        let bytes = self.as_bytes()?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(EthereumAddress(arr))
    }
}

impl Canonical for PathElement {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            PathElement::Field(s) => enc.write_text(s),
            PathElement::Index(i) => enc.write_uint(*i),
            PathElement::Append => enc.write_text("-"),
            PathElement::Bytes(b) => enc.write_bytes(b),
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let probe = *dec;
        let mut probe = probe;
        let head = probe.read_head()?;
        match head.major {
            0 => Ok(PathElement::Index(dec.read_uint()?)),
            2 => Ok(PathElement::Bytes(dec.read_bytes()?)),
            3 => {
                let text = dec.read_text()?;
                if text == "-" {
                    Ok(PathElement::Append)
                } else {
                    Ok(PathElement::Field(text))
                }
            }
            other => Err(ShopError::DecodeMismatch(format!(
                "path element must be a uint, text or byte string, got major {other}"
            ))),
        }
    }
}

/// The discriminated union of entity types a [`Path`] may address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathType {
    /// The root schema version counter.
    SchemaVersion,
    /// The shop's root-of-trust manifest.
    Manifest,
    /// An account keyed by its Ethereum address.
    Account(EthereumAddress),
    /// A listing keyed by its object id.
    Listing(ObjectId),
    /// An order keyed by its object id.
    Order(ObjectId),
    /// A tag keyed by its (non-empty) name.
    Tag(String),
    /// An inventory entry keyed by listing id (variation fields trail as
    /// path elements, per the spec's key-derivation rule).
    Inventory(ObjectId),
}

impl PathType {
    fn type_string(&self) -> &'static str {
        match self {
            PathType::SchemaVersion => "SchemaVersion",
            PathType::Manifest => "Manifest",
            PathType::Account(_) => "Account",
            PathType::Listing(_) => "Listing",
            PathType::Order(_) => "Order",
            PathType::Tag(_) => "Tag",
            PathType::Inventory(_) => "Inventory",
        }
    }

    fn has_id(&self) -> bool {
        !matches!(self, PathType::SchemaVersion | PathType::Manifest)
    }
}

/// A fully decoded path: an entity discriminator plus trailing sub-fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// The addressed entity type (and, where applicable, its id).
    pub ty: PathType,
    /// Trailing sub-field elements, e.g. `["Metadata", "Title"]`.
    pub fields: Vec<PathElement>,
}

impl Path {
    /// Builds a root path (no trailing fields) for the given type.
    pub fn root(ty: PathType) -> Self {
        Path { ty, fields: Vec::new() }
    }

    /// Builds a path with trailing sub-fields.
    pub fn with_fields(ty: PathType, fields: Vec<PathElement>) -> Self {
        Path { ty, fields }
    }
}

impl Canonical for Path {
    fn encode(&self, enc: &mut Encoder) {
        let has_id = self.ty.has_id();
        let total = 1 + usize::from(has_id) + self.fields.len();
        enc.write_array_header(total as u64);
        enc.write_text(self.ty.type_string());
        match &self.ty {
            PathType::SchemaVersion | PathType::Manifest => {}
            PathType::Account(addr) => addr.encode(enc),
            PathType::Listing(id) | PathType::Order(id) | PathType::Inventory(id) => {
                id.encode(enc)
            }
            PathType::Tag(name) => enc.write_text(name),
        }
        for field in &self.fields {
            field.encode(enc);
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let total = dec.read_array_header()?;
        if total == 0 {
            return Err(ShopError::DecodeMismatch("empty path array".into()));
        }
        let type_string = dec.read_text()?;
        let mut consumed = 1u64;

        let ty = match type_string.as_str() {
            "SchemaVersion" => PathType::SchemaVersion,
            "Manifest" => PathType::Manifest,
            "Account" => {
                consumed += 1;
                PathType::Account(EthereumAddress::decode(dec)?)
            }
            "Listing" => {
                consumed += 1;
                PathType::Listing(ObjectId::decode(dec)?)
            }
            "Order" => {
                consumed += 1;
                PathType::Order(ObjectId::decode(dec)?)
            }
            "Tag" => {
                consumed += 1;
                let name = dec.read_text()?;
                if name.is_empty() {
                    return Err(ShopError::Validation("tag name must be non-empty".into()));
                }
                PathType::Tag(name)
            }
            "Inventory" => {
                consumed += 1;
                PathType::Inventory(ObjectId::decode(dec)?)
            }
            other => {
                return Err(ShopError::DecodeMismatch(format!(
                    "unknown path type discriminator {other:?}"
                )))
            }
        };

        if consumed > total {
            return Err(ShopError::DecodeMismatch(
                "path array too short for its discriminant".into(),
            ));
        }
        let remaining = total - consumed;
        let mut fields = Vec::with_capacity(remaining as usize);
        for _ in 0..remaining {
            fields.push(PathElement::decode(dec)?);
        }
        Ok(Path { ty, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn manifest_path_omits_id_slot() {
        let path = Path::with_fields(
            PathType::Manifest,
            vec![PathElement::Field("ShopID".into())],
        );
        let bytes = to_bytes_canonical(&path);
        let back = from_bytes_canonical::<Path>(&bytes).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn listing_path_roundtrips_with_index_and_append() {
        let path = Path::with_fields(
            PathType::Listing(ObjectId(42)),
            vec![
                PathElement::Field("Metadata".into()),
                PathElement::Field("Images".into()),
                PathElement::Append,
            ],
        );
        let bytes = to_bytes_canonical(&path);
        let back = from_bytes_canonical::<Path>(&bytes).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn index_and_field_are_not_confused() {
        let numeric_field = PathElement::Field("0".to_string());
        let index = PathElement::Index(0);
        assert_ne!(to_bytes_canonical(&numeric_field), to_bytes_canonical(&index));
    }

    #[test]
    fn unknown_type_discriminator_is_rejected() {
        let mut enc = Encoder::new();
        enc.write_array_header(1);
        enc.write_text("NotAType");
        let err = from_bytes_canonical::<Path>(&enc.into_bytes()).unwrap_err();
        assert!(matches!(err, ShopError::DecodeMismatch(_)));
    }
}
