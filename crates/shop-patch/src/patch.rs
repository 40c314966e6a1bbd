// Path: crates/shop-patch/src/patch.rs
//! The wire shape of a single mutation: an operation, the path it targets,
//! and an opaque, pre-encoded canonical value.

use shop_types::codec::{from_bytes_canonical, to_bytes_canonical, Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::path::Path;

/// The operation a [`Patch`] performs against its target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    /// Installs a new entity or array element; the target must not already
    /// hold a value.
    Add,
    /// Overwrites an existing entity or field in place.
    Replace,
    /// Deletes an entity or array element.
    Remove,
    /// Adds the decoded `u64` value to the target's current count.
    Increment,
    /// Subtracts the decoded `u64` value from the target's current count.
    Decrement,
}

impl PatchOp {
    fn to_u64(self) -> u64 {
        match self {
            PatchOp::Add => 0,
            PatchOp::Replace => 1,
            PatchOp::Remove => 2,
            PatchOp::Increment => 3,
            PatchOp::Decrement => 4,
        }
    }
    fn from_u64(v: u64) -> Result<Self, ShopError> {
        match v {
            0 => Ok(PatchOp::Add),
            1 => Ok(PatchOp::Replace),
            2 => Ok(PatchOp::Remove),
            3 => Ok(PatchOp::Increment),
            4 => Ok(PatchOp::Decrement),
            other => Err(ShopError::DecodeMismatch(format!("unknown PatchOp {other}"))),
        }
    }
}

impl Canonical for PatchOp {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(self.to_u64());
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        PatchOp::from_u64(dec.read_uint()?)
    }
}

/// `{Op, Path, Value}`. `Value` carries the pre-encoded canonical bytes of
/// whatever type the targeted path expects; the patcher knows that type
/// from the path alone, so it is never tagged on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// The mutation to perform.
    pub op: PatchOp,
    /// The entity and sub-field the mutation targets.
    pub path: Path,
    /// The pre-encoded canonical bytes of the new value, empty for a bare
    /// `Remove`.
    pub value: Vec<u8>,
}

impl Patch {
    /// Decodes `self.value` as `T`, the type expected at `self.path`.
    pub fn value_as<T: Canonical>(&self) -> Result<T, ShopError> {
        from_bytes_canonical(&self.value)
    }

    /// Builds a patch whose value is `v`'s canonical encoding.
    pub fn with_value<T: Canonical>(op: PatchOp, path: Path, v: &T) -> Self {
        Patch { op, path, value: to_bytes_canonical(v) }
    }
}

impl Canonical for Patch {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(3);
        self.op.encode(enc);
        self.path.encode(enc);
        self.value.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(3)?;
        Ok(Patch { op: PatchOp::decode(dec)?, path: Path::decode(dec)?, value: Vec::<u8>::decode(dec)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::path::PathType;
    use shop_types::primitives::ObjectId;

    #[test]
    fn patch_roundtrips() {
        let patch = Patch::with_value(PatchOp::Replace, Path::root(PathType::Listing(ObjectId(1))), &7u64);
        let bytes = to_bytes_canonical(&patch);
        let back = from_bytes_canonical::<Patch>(&bytes).unwrap();
        assert_eq!(back, patch);
        assert_eq!(back.value_as::<u64>().unwrap(), 7);
    }
}
