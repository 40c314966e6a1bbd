// Path: crates/shop-types/src/codec.rs

//! The canonical, deterministic binary codec for all consensus-critical state.
//!
//! Everything that is ever fed to a hasher or a signature goes through this
//! module and nothing else. The wire shape is a restriction of CBOR (RFC
//! 8949) to its "core deterministic encoding" subset: integers and lengths
//! are written in the shortest form that represents them, map entries are
//! sorted by the byte order of their *encoded* keys, and decoding rejects
//! any input that is not already in that canonical form.
//!
//! This crate hand-rolls the encoder instead of reaching for a generic
//! serialization library because the bytes themselves are the consensus
//! artifact: a library that is merely "CBOR-compatible" gives no guarantee
//! that two implementations emit identical bytes for identical values. The
//! same reasoning is why hash-preimage encoding is written by hand anywhere
//! it appears in this codebase rather than derived from a generic `Encode`.

use crate::error::ShopError;

const MAJOR_UINT: u8 = 0;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;

/// RFC 3339 timestamps are tagged with CBOR tag 0 ("standard date/time string").
pub const TAG_TIMESTAMP: u64 = 0;
/// Arbitrary-precision unsigned integers that do not fit in 64 bits use tag 2
/// ("unsigned bignum"), carrying their minimal big-endian byte string.
pub const TAG_BIGUINT: u64 = 2;

/// A growable buffer that accumulates canonical bytes.
///
/// Every `write_*` method appends a single, self-delimiting CBOR item so
/// callers can freely interleave them to build arrays, maps, and tagged
/// values by hand.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consumes the encoder, returning the accumulated canonical bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes a major-type head with its argument in the shortest form that
    /// represents it, per CBOR core deterministic encoding rules.
    fn write_head(&mut self, major: u8, arg: u64) {
        let top = major << 5;
        match arg {
            0..=23 => self.buf.push(top | (arg as u8)),
            24..=0xFF => {
                self.buf.push(top | 24);
                self.buf.push(arg as u8);
            }
            0x100..=0xFFFF => {
                self.buf.push(top | 25);
                self.buf.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.push(top | 26);
                self.buf.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(top | 27);
                self.buf.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    /// Writes an unsigned integer in shortest form.
    pub fn write_uint(&mut self, v: u64) {
        self.write_head(MAJOR_UINT, v);
    }

    /// Writes a raw byte string.
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.write_head(MAJOR_BYTES, b.len() as u64);
        self.buf.extend_from_slice(b);
    }

    /// Writes a UTF-8 text string.
    pub fn write_text(&mut self, s: &str) {
        self.write_head(MAJOR_TEXT, s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a boolean simple value.
    pub fn write_bool(&mut self, b: bool) {
        self.buf
            .push((MAJOR_SIMPLE << 5) | if b { SIMPLE_TRUE } else { SIMPLE_FALSE });
    }

    /// Writes the `null` simple value.
    pub fn write_null(&mut self) {
        self.buf.push((MAJOR_SIMPLE << 5) | SIMPLE_NULL);
    }

    /// Writes the header for a fixed-length array of `len` items. Callers
    /// must follow this with exactly `len` encoded items.
    pub fn write_array_header(&mut self, len: u64) {
        self.write_head(MAJOR_ARRAY, len);
    }

    /// Writes a tag head (e.g. [`TAG_TIMESTAMP`]). Callers must follow this
    /// with exactly one encoded item, the tag's content.
    pub fn write_tag(&mut self, tag: u64) {
        self.write_head(MAJOR_TAG, tag);
    }

    /// Writes a map from already-encoded `(key_bytes, value_bytes)` pairs,
    /// sorting entries by the byte order of their encoded keys as required
    /// by canonical CBOR (RFC 8949 section 4.2.1).
    pub fn write_map(&mut self, mut entries: Vec<(Vec<u8>, Vec<u8>)>) {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.write_head(MAJOR_MAP, entries.len() as u64);
        for (k, v) in entries {
            self.buf.extend_from_slice(&k);
            self.buf.extend_from_slice(&v);
        }
    }

    /// Encodes `v` into its own buffer and returns the resulting bytes,
    /// useful for building up the `(key_bytes, value_bytes)` pairs consumed
    /// by [`Encoder::write_map`].
    pub fn encoded_bytes_of<T: Canonical>(v: &T) -> Vec<u8> {
        let mut enc = Encoder::new();
        v.encode(&mut enc);
        enc.into_bytes()
    }
}

/// A cursor over canonical bytes being decoded.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    rest: &'a [u8],
}

/// The decoded head of a CBOR item: its major type and its argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    /// The CBOR major type (0-7).
    pub major: u8,
    /// The decoded argument. For simple values this holds the simple-value number.
    pub arg: u64,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the given byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    /// Returns the number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Fails unless every byte has been consumed. Call this after decoding a
    /// top-level value to catch trailing garbage.
    pub fn expect_exhausted(&self) -> Result<(), ShopError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(ShopError::DecodeMismatch(format!(
                "{} trailing byte(s) after canonical value",
                self.rest.len()
            )))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ShopError> {
        if self.rest.len() < n {
            return Err(ShopError::BytesTooShort {
                expected: n,
                got: self.rest.len(),
            });
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    /// Reads one item head without interpreting its payload.
    pub fn read_head(&mut self) -> Result<Head, ShopError> {
        let b = *self.take(1)?.first().ok_or(ShopError::BytesTooShort {
            expected: 1,
            got: 0,
        })?;
        let major = b >> 5;
        let low = b & 0x1F;
        let arg = match low {
            0..=23 => low as u64,
            24 => u8::from_be_bytes(self.take(1)?.try_into().unwrap_or_default()) as u64,
            25 => u16::from_be_bytes(self.take(2)?.try_into().map_err(|_| {
                ShopError::DecodeMismatch("truncated 2-byte length".into())
            })?) as u64,
            26 => u32::from_be_bytes(self.take(4)?.try_into().map_err(|_| {
                ShopError::DecodeMismatch("truncated 4-byte length".into())
            })?) as u64,
            27 => u64::from_be_bytes(self.take(8)?.try_into().map_err(|_| {
                ShopError::DecodeMismatch("truncated 8-byte length".into())
            })?),
            _ => {
                return Err(ShopError::DecodeMismatch(format!(
                    "unsupported additional info {low}"
                )))
            }
        };
        Ok(Head { major, arg })
    }

    /// Reads a head and requires it to be the given major type.
    pub fn expect_major(&mut self, major: u8) -> Result<u64, ShopError> {
        let head = self.read_head()?;
        if head.major != major {
            return Err(ShopError::DecodeMismatch(format!(
                "expected major type {major}, got {}",
                head.major
            )));
        }
        Ok(head.arg)
    }

    /// Reads an unsigned integer.
    pub fn read_uint(&mut self) -> Result<u64, ShopError> {
        self.expect_major(MAJOR_UINT)
    }

    /// Reads a byte string.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ShopError> {
        let len = self.expect_major(MAJOR_BYTES)? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a UTF-8 text string.
    pub fn read_text(&mut self) -> Result<String, ShopError> {
        let len = self.expect_major(MAJOR_TEXT)? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ShopError::DecodeMismatch(format!("invalid utf-8 text: {e}")))
    }

    /// Reads a boolean simple value.
    pub fn read_bool(&mut self) -> Result<bool, ShopError> {
        let head = self.read_head()?;
        match (head.major, head.arg as u8) {
            (MAJOR_SIMPLE, SIMPLE_TRUE) => Ok(true),
            (MAJOR_SIMPLE, SIMPLE_FALSE) => Ok(false),
            _ => Err(ShopError::DecodeMismatch("expected bool".into())),
        }
    }

    /// Reads the `null` simple value.
    pub fn read_null(&mut self) -> Result<(), ShopError> {
        let head = self.read_head()?;
        if head.major == MAJOR_SIMPLE && head.arg as u8 == SIMPLE_NULL {
            Ok(())
        } else {
            Err(ShopError::DecodeMismatch("expected null".into()))
        }
    }

    /// Peeks whether the next item is `null` without consuming it on a mismatch.
    pub fn peek_is_null(&self) -> bool {
        matches!(
            self.rest.first(),
            Some(b) if *b == ((MAJOR_SIMPLE << 5) | SIMPLE_NULL)
        )
    }

    /// Reads an array header and requires it to carry exactly `len` items.
    pub fn read_array_header_exact(&mut self, len: u64) -> Result<(), ShopError> {
        let got = self.expect_major(MAJOR_ARRAY)?;
        if got != len {
            return Err(ShopError::DecodeMismatch(format!(
                "expected array of {len} item(s), got {got}"
            )));
        }
        Ok(())
    }

    /// Reads an array header, returning the element count without constraint.
    pub fn read_array_header(&mut self) -> Result<u64, ShopError> {
        self.expect_major(MAJOR_ARRAY)
    }

    /// Reads a tag head and requires it to match `tag`.
    pub fn expect_tag(&mut self, tag: u64) -> Result<(), ShopError> {
        let head = self.read_head()?;
        if head.major != MAJOR_TAG || head.arg != tag {
            return Err(ShopError::DecodeMismatch(format!(
                "expected tag {tag}, got major {} arg {}",
                head.major, head.arg
            )));
        }
        Ok(())
    }

    /// Reads a map header and then decodes `n` raw `(key_bytes, value_bytes)`
    /// pairs by slicing the underlying cursor, without interpreting their
    /// contents. Used by callers that need to match on specific keys, such
    /// as the path-addressed `Manifest` sub-patches.
    pub fn read_map_raw(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ShopError> {
        let len = self.expect_major(MAJOR_MAP)? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let key_start = self.rest;
            self.skip_one()?;
            let key_len = key_start.len() - self.rest.len();
            let key_bytes = key_start[..key_len].to_vec();

            let val_start = self.rest;
            self.skip_one()?;
            let val_len = val_start.len() - self.rest.len();
            let val_bytes = val_start[..val_len].to_vec();

            out.push((key_bytes, val_bytes));
        }
        Ok(out)
    }

    /// Skips exactly one well-formed canonical item, used to compute byte
    /// spans when re-slicing raw map entries.
    fn skip_one(&mut self) -> Result<(), ShopError> {
        let head = self.read_head()?;
        match head.major {
            MAJOR_UINT | MAJOR_SIMPLE => {}
            MAJOR_BYTES | MAJOR_TEXT => {
                self.take(head.arg as usize)?;
            }
            MAJOR_ARRAY => {
                for _ in 0..head.arg {
                    self.skip_one()?;
                }
            }
            MAJOR_MAP => {
                for _ in 0..head.arg * 2 {
                    self.skip_one()?;
                }
            }
            MAJOR_TAG => {
                self.skip_one()?;
            }
            _ => {
                return Err(ShopError::DecodeMismatch(format!(
                    "cannot skip major type {}",
                    head.major
                )))
            }
        }
        Ok(())
    }
}

/// Implemented by every type whose bytes can be fed to a hash or a
/// signature. Implementors must be careful to only ever emit the item(s)
/// their `decode` counterpart expects, in the same order, so that
/// `decode(encode(x)) == x` holds for all `x`.
pub trait Canonical: Sized {
    /// Appends this value's canonical encoding to `enc`.
    fn encode(&self, enc: &mut Encoder);

    /// Reads this value's canonical encoding from `dec`.
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError>;
}

/// Encodes a top-level value to its canonical byte representation.
pub fn to_bytes_canonical<T: Canonical>(v: &T) -> Vec<u8> {
    let mut enc = Encoder::new();
    v.encode(&mut enc);
    enc.into_bytes()
}

/// Decodes a top-level value from its canonical byte representation,
/// rejecting any trailing bytes.
pub fn from_bytes_canonical<T: Canonical>(b: &[u8]) -> Result<T, ShopError> {
    let mut dec = Decoder::new(b);
    let v = T::decode(&mut dec)?;
    dec.expect_exhausted()?;
    Ok(v)
}

impl Canonical for u64 {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(*self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_uint()
    }
}

impl Canonical for bool {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bool(*self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_bool()
    }
}

impl Canonical for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_text(self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_text()
    }
}

impl Canonical for Vec<u8> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_bytes()
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(self.len() as u64);
        for item in self {
            item.encode(enc);
        }
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let len = dec.read_array_header()?;
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(T::decode(dec)?);
        }
        Ok(out)
    }
}

impl<K: Canonical + Ord, V: Canonical> Canonical for std::collections::BTreeMap<K, V> {
    fn encode(&self, enc: &mut Encoder) {
        let entries = self
            .iter()
            .map(|(k, v)| (Encoder::encoded_bytes_of(k), Encoder::encoded_bytes_of(v)))
            .collect();
        enc.write_map(entries);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let raw = dec.read_map_raw()?;
        let mut out = std::collections::BTreeMap::new();
        for (k, v) in raw {
            let key = K::decode(&mut Decoder::new(&k))?;
            let value = V::decode(&mut Decoder::new(&v))?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<K: Canonical + Ord> Canonical for std::collections::BTreeSet<K> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(self.len() as u64);
        // Elements are re-sorted by their encoded bytes, matching the map
        // key ordering rule, so a set's canonical form is independent of
        // the element type's `Ord` impl versus its wire byte order.
        let mut encoded: Vec<Vec<u8>> = self.iter().map(Encoder::encoded_bytes_of).collect();
        encoded.sort();
        for item in encoded {
            enc.buf.extend_from_slice(&item);
        }
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let len = dec.read_array_header()?;
        let mut out = std::collections::BTreeSet::new();
        for _ in 0..len {
            out.insert(K::decode(dec)?);
        }
        Ok(out)
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Some(v) => v.encode(enc),
            None => enc.write_null(),
        }
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        if dec.peek_is_null() {
            dec.read_null()?;
            Ok(None)
        } else {
            Ok(Some(T::decode(dec)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        assert_eq!(from_bytes_canonical::<u64>(&to_bytes_canonical(&42u64)).unwrap(), 42);
        assert_eq!(
            from_bytes_canonical::<String>(&to_bytes_canonical(&"hi".to_string())).unwrap(),
            "hi"
        );
        assert_eq!(
            from_bytes_canonical::<Vec<u8>>(&to_bytes_canonical(&vec![1u8, 2, 3])).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn empty_array_of_null_matches_spec_vector() {
        // A two-element array of integer 0 and null: 0x82 0x00 0xF6.
        let mut enc = Encoder::new();
        enc.write_array_header(2);
        enc.write_uint(0);
        enc.write_null();
        assert_eq!(enc.into_bytes(), vec![0x82, 0x00, 0xF6]);
    }

    #[test]
    fn shortest_form_uint() {
        assert_eq!(to_bytes_canonical(&0u64), vec![0x00]);
        assert_eq!(to_bytes_canonical(&23u64), vec![0x17]);
        assert_eq!(to_bytes_canonical(&24u64), vec![0x18, 0x18]);
        assert_eq!(to_bytes_canonical(&256u64), vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn map_keys_sorted_by_encoded_bytes() {
        let mut enc = Encoder::new();
        enc.write_map(vec![
            (Encoder::encoded_bytes_of(&"b".to_string()), Encoder::encoded_bytes_of(&1u64)),
            (Encoder::encoded_bytes_of(&"a".to_string()), Encoder::encoded_bytes_of(&2u64)),
        ]);
        let bytes = enc.into_bytes();
        // "a" sorts before "b" so its entry must come first despite insertion order.
        let mut dec = Decoder::new(&bytes);
        let raw = dec.read_map_raw().unwrap();
        assert_eq!(raw.len(), 2);
        let mut k0 = Decoder::new(&raw[0].0);
        assert_eq!(k0.read_text().unwrap(), "a");
    }

    #[test]
    fn truncated_input_is_bytes_too_short() {
        let bytes = to_bytes_canonical(&"longer text".to_string());
        let truncated = &bytes[..bytes.len() - 2];
        let err = from_bytes_canonical::<String>(truncated).unwrap_err();
        assert!(matches!(err, ShopError::BytesTooShort { .. }));
    }

    #[test]
    fn option_roundtrip() {
        let some: Option<u64> = Some(7);
        let none: Option<u64> = None;
        assert_eq!(from_bytes_canonical::<Option<u64>>(&to_bytes_canonical(&some)).unwrap(), some);
        assert_eq!(from_bytes_canonical::<Option<u64>>(&to_bytes_canonical(&none)).unwrap(), none);
    }

    #[test]
    fn btreemap_roundtrips_sorted_by_encoded_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert("zeta".to_string(), 1u64);
        map.insert("alpha".to_string(), 2u64);
        let bytes = to_bytes_canonical(&map);
        let back = from_bytes_canonical::<BTreeMap<String, u64>>(&bytes).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn btreeset_roundtrips() {
        use std::collections::BTreeSet;
        let mut set = BTreeSet::new();
        set.insert(3u64);
        set.insert(1u64);
        set.insert(2u64);
        let bytes = to_bytes_canonical(&set);
        let back = from_bytes_canonical::<BTreeSet<u64>>(&bytes).unwrap();
        assert_eq!(back, set);
    }
}
