// Path: crates/shop-model/src/listing.rs
//! A single catalog entry: price, descriptive metadata, publication state,
//! variation options, and per-variation stock status.

use std::collections::{BTreeMap, BTreeSet};

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::{ObjectId, Timestamp, Uint256};

use crate::manifest::PriceModifier;

/// `{Title, Description, Images[]}`, reused for both listings and
/// variations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// The display title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Image URLs, in display order.
    pub images: Vec<String>,
}

impl Canonical for Metadata {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(3);
        self.title.encode(enc);
        self.description.encode(enc);
        self.images.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(3)?;
        Ok(Metadata {
            title: String::decode(dec)?,
            description: String::decode(dec)?,
            images: Canonical::decode(dec)?,
        })
    }
}

/// Listing publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    /// No state has been chosen; invalid once a listing is installed.
    #[default]
    Unspecified,
    /// Visible to buyers.
    Published,
    /// Soft-deleted; no longer visible, retained for historical orders.
    Deleted,
}

impl ViewState {
    fn to_u64(self) -> u64 {
        match self {
            ViewState::Unspecified => 0,
            ViewState::Published => 1,
            ViewState::Deleted => 2,
        }
    }
    fn from_u64(v: u64) -> Result<Self, ShopError> {
        match v {
            0 => Ok(ViewState::Unspecified),
            1 => Ok(ViewState::Published),
            2 => Ok(ViewState::Deleted),
            other => Err(ShopError::DecodeMismatch(format!("unknown ViewState {other}"))),
        }
    }
}

impl Canonical for ViewState {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(self.to_u64());
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        ViewState::from_u64(dec.read_uint()?)
    }
}

/// A single variation under a [`ListingOption`]: its own metadata, an
/// optional price adjustment, and an optional SKU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingVariation {
    /// Display metadata specific to this variation.
    pub variation_info: Metadata,
    /// A price adjustment relative to the listing's base price.
    pub price_modifier: Option<PriceModifier>,
    /// A stock-keeping unit identifier.
    pub sku: Option<String>,
}

impl Canonical for ListingVariation {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(3);
        self.variation_info.encode(enc);
        self.price_modifier.encode(enc);
        self.sku.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(3)?;
        Ok(ListingVariation {
            variation_info: Metadata::decode(dec)?,
            price_modifier: Canonical::decode(dec)?,
            sku: Canonical::decode(dec)?,
        })
    }
}

/// `{Title, Variations}`. Variation keys must be unique not just within
/// this option but across every option of the owning listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingOption {
    /// The option's display title, e.g. "Color".
    pub title: String,
    /// `variation_key → ListingVariation`.
    pub variations: BTreeMap<String, ListingVariation>,
}

impl Canonical for ListingOption {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        self.title.encode(enc);
        self.variations.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        Ok(ListingOption {
            title: String::decode(dec)?,
            variations: Canonical::decode(dec)?,
        })
    }
}

/// Availability for one combination of variation ids. Exactly one of
/// `in_stock`/`expected_in_stock_by` is set; setting one clears the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingStockStatus {
    /// The combination of variation ids this status applies to.
    pub variation_ids: Vec<String>,
    /// The mutually-exclusive availability payload.
    pub availability: Availability,
}

/// The one-of payload of a [`ListingStockStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// A definite in-stock/out-of-stock flag.
    InStock(bool),
    /// An expected restock timestamp.
    ExpectedBy(Timestamp),
}

const AVAILABILITY_TAG_IN_STOCK: u64 = 0;
const AVAILABILITY_TAG_EXPECTED_BY: u64 = 1;

impl Canonical for ListingStockStatus {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        self.variation_ids.encode(enc);
        match &self.availability {
            Availability::InStock(in_stock) => {
                enc.write_array_header(2);
                enc.write_uint(AVAILABILITY_TAG_IN_STOCK);
                in_stock.encode(enc);
            }
            Availability::ExpectedBy(ts) => {
                enc.write_array_header(2);
                enc.write_uint(AVAILABILITY_TAG_EXPECTED_BY);
                ts.encode(enc);
            }
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        let variation_ids = Vec::<String>::decode(dec)?;
        dec.read_array_header_exact(2)?;
        let tag = dec.read_uint()?;
        let availability = match tag {
            AVAILABILITY_TAG_IN_STOCK => Availability::InStock(bool::decode(dec)?),
            AVAILABILITY_TAG_EXPECTED_BY => Availability::ExpectedBy(Timestamp::decode(dec)?),
            other => {
                return Err(ShopError::DecodeMismatch(format!(
                    "unknown ListingStockStatus availability tag {other}"
                )))
            }
        };
        Ok(ListingStockStatus { variation_ids, availability })
    }
}

/// `{ID, Price, Metadata, ViewState, Options, StockStatuses}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    /// The listing's identifier; must be non-zero once installed.
    pub id: ObjectId,
    /// Base price before any variation or shipping-region modifier.
    pub price: Uint256,
    /// Title/description/images.
    pub metadata: Metadata,
    /// Publication state.
    pub view_state: ViewState,
    /// `option_name → ListingOption`.
    pub options: BTreeMap<String, ListingOption>,
    /// Per-variation-combination availability.
    pub stock_statuses: Vec<ListingStockStatus>,
}

impl Listing {
    /// Structural validation: non-zero id, non-blank title, unique
    /// variation keys across all options, and a valid `ViewState`.
    pub fn validate(&self) -> Result<(), ShopError> {
        if !self.id.is_valid() {
            return Err(ShopError::validation("listing ID must be non-zero"));
        }
        if self.metadata.title.trim().is_empty() {
            return Err(ShopError::validation("listing title must be non-blank"));
        }
        if matches!(self.view_state, ViewState::Unspecified) {
            return Err(ShopError::validation("listing ViewState must be set"));
        }
        let mut seen_variation_keys: BTreeSet<&str> = BTreeSet::new();
        for option in self.options.values() {
            for key in option.variations.keys() {
                if !seen_variation_keys.insert(key.as_str()) {
                    return Err(ShopError::validation(format!(
                        "variation key {key:?} is not unique across this listing's options"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns whether `variation_id` names a variation under some option.
    pub fn has_variation(&self, variation_id: &str) -> bool {
        self.options.values().any(|o| o.variations.contains_key(variation_id))
    }
}

impl Canonical for Listing {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(6);
        self.id.encode(enc);
        self.price.encode(enc);
        self.metadata.encode(enc);
        self.view_state.encode(enc);
        self.options.encode(enc);
        self.stock_statuses.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(6)?;
        Ok(Listing {
            id: ObjectId::decode(dec)?,
            price: Uint256::decode(dec)?,
            metadata: Metadata::decode(dec)?,
            view_state: ViewState::decode(dec)?,
            options: Canonical::decode(dec)?,
            stock_statuses: Canonical::decode(dec)?,
        })
    }
}
