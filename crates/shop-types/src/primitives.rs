// Path: crates/shop-types/src/primitives.rs
//! The primitive wire types shared by every layer: identifiers, arbitrary
//! precision integers, hashes, keys, signatures and chain addresses.

use crate::codec::{Canonical, Decoder, Encoder, TAG_BIGUINT, TAG_TIMESTAMP};
use crate::error::ShopError;
use chrono::{DateTime, SecondsFormat, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// An identifier for a shop entity (listing, order, ...). Zero is reserved
/// to mean "unset"; entities that own one must have a non-zero value,
/// enforced by structural validation rather than the type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Returns whether this id is non-zero, i.e. fit to identify an entity.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Encodes this id as an 8-byte big-endian key, used by every HAMT that
    /// keys its table by `ObjectId`.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl Canonical for ObjectId {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        Ok(ObjectId(dec.read_uint()?))
    }
}

/// An arbitrary-precision non-negative integer, bounded to 256 bits as used
/// throughout the shop's pricing and inventory fields. Canonical encoding
/// collapses to a plain unsigned integer when the value fits in 64 bits,
/// and otherwise to a tagged, minimal big-endian byte string (CBOR "bignum").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Uint256(#[serde(with = "u256_serde")] pub U256);

mod u256_serde {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        let mut bytes = [0u8; 32];
        v.to_big_endian(&mut bytes);
        bytes.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        Ok(U256::from_big_endian(&bytes))
    }
}

impl Uint256 {
    /// The zero value.
    pub const ZERO: Uint256 = Uint256(U256::zero());

    /// Builds a `Uint256` from a `u64`.
    pub fn from_u64(v: u64) -> Self {
        Uint256(U256::from(v))
    }

    /// Returns the minimal big-endian byte representation (no leading zero
    /// bytes, and a single `0x00` byte for zero itself).
    pub fn minimal_be_bytes(&self) -> Vec<u8> {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        let first_nonzero = bytes.iter().position(|b| *b != 0);
        match first_nonzero {
            Some(i) => bytes[i..].to_vec(),
            None => vec![0u8],
        }
    }
}

impl Canonical for Uint256 {
    fn encode(&self, enc: &mut Encoder) {
        if self.0 <= U256::from(u64::MAX) {
            enc.write_uint(self.0.as_u64());
        } else {
            enc.write_tag(TAG_BIGUINT);
            enc.write_bytes(&self.minimal_be_bytes());
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        // Peek the head without a generic "peek tag" helper: read it, then
        // branch on major type.
        let mut probe = *dec;
        let head = probe.read_head()?;
        if head.major == 6 {
            dec.expect_tag(TAG_BIGUINT)?;
            let bytes = dec.read_bytes()?;
            if bytes.len() > 32 {
                return Err(ShopError::DecodeMismatch(
                    "bignum exceeds 256 bits".into(),
                ));
            }
            Ok(Uint256(U256::from_big_endian(&bytes)))
        } else {
            Ok(Uint256(U256::from(dec.read_uint()?)))
        }
    }
}

/// A 32-byte content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Canonical for Hash {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(&self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let bytes = dec.read_bytes()?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ShopError::BytesTooShort { expected: 32, got: v.len() })?;
        Ok(Hash(arr))
    }
}

/// A 33-byte compressed secp256k1 public key, i.e. a KeyCard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 33]);

impl Canonical for PublicKey {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(&self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let bytes = dec.read_bytes()?;
        let arr: [u8; 33] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ShopError::BytesTooShort { expected: 33, got: v.len() })?;
        Ok(PublicKey(arr))
    }
}

/// A 65-byte `r || s || v` ECDSA signature, with `v` already normalized to
/// 27 or 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    /// Returns the recovery id implied by the normalized `v` byte (0 or 1).
    pub fn recovery_id(&self) -> Result<u8, ShopError> {
        match self.0[64] {
            27 => Ok(0),
            28 => Ok(1),
            other => Err(ShopError::Validation(format!(
                "signature recovery byte {other} is not normalized to 27/28"
            ))),
        }
    }
}

impl Canonical for Signature {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(&self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let bytes = dec.read_bytes()?;
        let arr: [u8; 65] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ShopError::BytesTooShort { expected: 65, got: v.len() })?;
        Ok(Signature(arr))
    }
}

/// A 20-byte Ethereum-style account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EthereumAddress(pub [u8; 20]);

impl EthereumAddress {
    /// The zero address, used by the guest account and to designate a
    /// chain's native currency within `AcceptedCurrencies`.
    pub const ZERO: EthereumAddress = EthereumAddress([0u8; 20]);
}

impl Canonical for EthereumAddress {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(&self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let bytes = dec.read_bytes()?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ShopError::BytesTooShort { expected: 20, got: v.len() })?;
        Ok(EthereumAddress(arr))
    }
}

/// A chain-scoped address: an EVM chain id paired with an address on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ChainAddress {
    /// The EVM chain id. Must be non-zero.
    pub chain_id: u64,
    /// The address on that chain.
    pub address: EthereumAddress,
}

impl ChainAddress {
    /// Returns whether `chain_id` is non-zero, as required by the spec.
    pub fn is_valid(&self) -> bool {
        self.chain_id != 0
    }
}

impl Canonical for ChainAddress {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        enc.write_uint(self.chain_id);
        self.address.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        let chain_id = dec.read_uint()?;
        let address = EthereumAddress::decode(dec)?;
        Ok(ChainAddress { chain_id, address })
    }
}

/// A UTC timestamp, canonically encoded as CBOR tag 0 carrying an RFC 3339
/// string. Sub-second precision is dropped so re-encoding is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Canonical for Timestamp {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_tag(TAG_TIMESTAMP);
        enc.write_text(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.expect_tag(TAG_TIMESTAMP)?;
        let text = dec.read_text()?;
        let parsed = DateTime::parse_from_rfc3339(&text)
            .map_err(|e| ShopError::DecodeMismatch(format!("invalid rfc3339 timestamp: {e}")))?;
        Ok(Timestamp(parsed.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn uint256_collapses_to_native_width_when_it_fits() {
        let small = Uint256::from_u64(42);
        let bytes = to_bytes_canonical(&small);
        // Plain uint head for 42, no bignum tag.
        assert_eq!(bytes, vec![0x18, 42]);
        assert_eq!(from_bytes_canonical::<Uint256>(&bytes).unwrap(), small);
    }

    #[test]
    fn uint256_big_value_roundtrips_through_tagged_bignum() {
        let big = Uint256(U256::from(u64::MAX) + U256::from(1));
        let bytes = to_bytes_canonical(&big);
        assert_eq!(bytes[0] >> 5, 6); // tag major type
        assert_eq!(from_bytes_canonical::<Uint256>(&bytes).unwrap(), big);
    }

    #[test]
    fn chain_address_roundtrip() {
        let addr = ChainAddress {
            chain_id: 1,
            address: EthereumAddress([7u8; 20]),
        };
        let bytes = to_bytes_canonical(&addr);
        assert_eq!(from_bytes_canonical::<ChainAddress>(&bytes).unwrap(), addr);
    }

    #[test]
    fn timestamp_roundtrip_is_idempotent() {
        let ts = Timestamp(DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc));
        let bytes = to_bytes_canonical(&ts);
        let back = from_bytes_canonical::<Timestamp>(&bytes).unwrap();
        assert_eq!(back, ts);
        assert_eq!(to_bytes_canonical(&back), bytes);
    }
}
