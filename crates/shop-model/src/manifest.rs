// Path: crates/shop-model/src/manifest.rs
//! The shop's root-of-trust metadata: identity, payout destinations,
//! accepted currencies, pricing currency, and shipping regions.

use std::collections::{BTreeMap, BTreeSet};

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::{ChainAddress, EthereumAddress, Uint256};

/// `{ShopID, Payees, AcceptedCurrencies, PricingCurrency, ShippingRegions}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    /// The shop's on-chain identifier.
    pub shop_id: Uint256,
    /// `chain_id → address → Payee`.
    pub payees: BTreeMap<u64, BTreeMap<EthereumAddress, Payee>>,
    /// `chain_id → set of accepted addresses`; the zero address designates
    /// the chain's native currency.
    pub accepted_currencies: BTreeMap<u64, BTreeSet<EthereumAddress>>,
    /// The currency prices are denominated in.
    pub pricing_currency: ChainAddress,
    /// Named shipping regions.
    pub shipping_regions: BTreeMap<String, ShippingRegion>,
}

impl Manifest {
    /// Structural validation: a zero `ShopID` is permitted only for an
    /// otherwise-empty manifest (the state before the first `replace`);
    /// every `PriceModifier` carries exactly one variant by construction,
    /// and every shipping region's names are non-blank map keys.
    pub fn validate(&self) -> Result<(), ShopError> {
        if !self.pricing_currency.is_valid() {
            return Err(ShopError::validation("manifest PricingCurrency chain_id must be non-zero"));
        }
        for (chain_id, addrs) in &self.payees {
            if *chain_id == 0 {
                return Err(ShopError::validation("manifest Payees chain_id must be non-zero"));
            }
            if addrs.is_empty() {
                return Err(ShopError::validation("manifest Payees entry must be non-empty"));
            }
        }
        for chain_id in self.accepted_currencies.keys() {
            if *chain_id == 0 {
                return Err(ShopError::validation(
                    "manifest AcceptedCurrencies chain_id must be non-zero",
                ));
            }
        }
        for (name, region) in &self.shipping_regions {
            if name.trim().is_empty() {
                return Err(ShopError::validation("shipping region name must be non-blank"));
            }
            region.validate()?;
        }
        Ok(())
    }
}

impl Canonical for Manifest {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(5);
        self.shop_id.encode(enc);
        self.payees.encode(enc);
        self.accepted_currencies.encode(enc);
        self.pricing_currency.encode(enc);
        self.shipping_regions.encode(enc);
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(5)?;
        Ok(Manifest {
            shop_id: Uint256::decode(dec)?,
            payees: Canonical::decode(dec)?,
            accepted_currencies: Canonical::decode(dec)?,
            pricing_currency: ChainAddress::decode(dec)?,
            shipping_regions: Canonical::decode(dec)?,
        })
    }
}

/// A single payout destination within `Payees[chain_id]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Payee {
    /// Whether funds sent to this address must be routed through a proxy
    /// contract call rather than a plain transfer.
    pub call_as_contract: bool,
}

impl Canonical for Payee {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(1);
        self.call_as_contract.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(1)?;
        Ok(Payee { call_as_contract: bool::decode(dec)? })
    }
}

/// `{Country, PostalCode, City, PriceModifiers}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShippingRegion {
    /// ISO-ish country name or code, free text per the source.
    pub country: String,
    /// Postal/zip code.
    pub postal_code: String,
    /// City name.
    pub city: String,
    /// Named price adjustments applied when shipping to this region.
    pub price_modifiers: BTreeMap<String, PriceModifier>,
}

impl ShippingRegion {
    fn validate(&self) -> Result<(), ShopError> {
        for name in self.price_modifiers.keys() {
            if name.trim().is_empty() {
                return Err(ShopError::validation("price modifier name must be non-blank"));
            }
        }
        Ok(())
    }
}

impl Canonical for ShippingRegion {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(4);
        self.country.encode(enc);
        self.postal_code.encode(enc);
        self.city.encode(enc);
        self.price_modifiers.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(4)?;
        Ok(ShippingRegion {
            country: String::decode(dec)?,
            postal_code: String::decode(dec)?,
            city: String::decode(dec)?,
            price_modifiers: Canonical::decode(dec)?,
        })
    }
}

/// Exactly one of a percentage adjustment or an absolute amount (signed by
/// `plus`). Never both, never neither — encoded as a tagged variant so
/// decoding rejects a record carrying zero or two of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceModifier {
    /// A percentage-of-price adjustment.
    Percent(Uint256),
    /// A flat amount, added if `plus` else subtracted.
    Absolute {
        /// The flat amount.
        amount: Uint256,
        /// Whether the amount is added (`true`) or subtracted (`false`).
        plus: bool,
    },
}

const MODIFIER_TAG_PERCENT: u64 = 0;
const MODIFIER_TAG_ABSOLUTE: u64 = 1;

impl Canonical for PriceModifier {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            PriceModifier::Percent(pct) => {
                enc.write_array_header(2);
                enc.write_uint(MODIFIER_TAG_PERCENT);
                pct.encode(enc);
            }
            PriceModifier::Absolute { amount, plus } => {
                enc.write_array_header(3);
                enc.write_uint(MODIFIER_TAG_ABSOLUTE);
                amount.encode(enc);
                plus.encode(enc);
            }
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        let len = dec.read_array_header()?;
        let tag = dec.read_uint()?;
        match (tag, len) {
            (MODIFIER_TAG_PERCENT, 2) => Ok(PriceModifier::Percent(Uint256::decode(dec)?)),
            (MODIFIER_TAG_ABSOLUTE, 3) => {
                let amount = Uint256::decode(dec)?;
                let plus = bool::decode(dec)?;
                Ok(PriceModifier::Absolute { amount, plus })
            }
            (other, _) => Err(ShopError::DecodeMismatch(format!(
                "unknown PriceModifier tag {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn price_modifier_roundtrips_both_variants() {
        let pct = PriceModifier::Percent(Uint256::from_u64(10));
        let abs = PriceModifier::Absolute { amount: Uint256::from_u64(500), plus: false };
        assert_eq!(from_bytes_canonical::<PriceModifier>(&to_bytes_canonical(&pct)).unwrap(), pct);
        assert_eq!(from_bytes_canonical::<PriceModifier>(&to_bytes_canonical(&abs)).unwrap(), abs);
    }

    #[test]
    fn manifest_roundtrips_with_nested_maps() {
        let mut manifest = Manifest {
            shop_id: Uint256::from_u64(1),
            pricing_currency: ChainAddress { chain_id: 1, address: EthereumAddress::ZERO },
            ..Default::default()
        };
        manifest
            .payees
            .entry(1)
            .or_default()
            .insert(EthereumAddress([1u8; 20]), Payee { call_as_contract: true });
        manifest.accepted_currencies.entry(1).or_default().insert(EthereumAddress::ZERO);
        manifest.shipping_regions.insert(
            "US".to_string(),
            ShippingRegion {
                country: "US".into(),
                postal_code: "".into(),
                city: "".into(),
                price_modifiers: BTreeMap::new(),
            },
        );

        let bytes = to_bytes_canonical(&manifest);
        let back = from_bytes_canonical::<Manifest>(&bytes).unwrap();
        assert_eq!(back, manifest);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn zero_chain_id_is_rejected() {
        let manifest = Manifest {
            shop_id: Uint256::from_u64(1),
            pricing_currency: ChainAddress { chain_id: 0, address: EthereumAddress::ZERO },
            ..Default::default()
        };
        assert!(manifest.validate().is_err());
    }
}
