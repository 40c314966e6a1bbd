// Path: crates/shop-model/src/order.rs
//! An order's line items and its lifecycle state machine.

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::{ChainAddress, Hash, ObjectId, Timestamp, Uint256};

/// The six-stage total order a [`Order`] progresses through. `Unspecified`
/// is never a legal value on the wire.
///
/// Declaration order doubles as the spec's total order
/// (`Open < Canceled < Committed < PaymentChosen < Unpaid < Paid`); derive
/// input relies on that, so variants must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OrderState {
    /// Not yet set; invalid once an order is installed.
    #[default]
    Unspecified,
    /// Freshly created, still editable.
    Open,
    /// Terminated without payment.
    Canceled,
    /// Items locked in; no further item mutation permitted.
    Committed,
    /// A payee and currency have been selected.
    PaymentChosen,
    /// Payment has been requested but not yet confirmed.
    Unpaid,
    /// Payment confirmed.
    Paid,
}

impl OrderState {
    fn to_u64(self) -> u64 {
        match self {
            OrderState::Unspecified => 0,
            OrderState::Open => 1,
            OrderState::Canceled => 2,
            OrderState::Committed => 3,
            OrderState::PaymentChosen => 4,
            OrderState::Unpaid => 5,
            OrderState::Paid => 6,
        }
    }
    fn from_u64(v: u64) -> Result<Self, ShopError> {
        Ok(match v {
            0 => OrderState::Unspecified,
            1 => OrderState::Open,
            2 => OrderState::Canceled,
            3 => OrderState::Committed,
            4 => OrderState::PaymentChosen,
            5 => OrderState::Unpaid,
            6 => OrderState::Paid,
            other => return Err(ShopError::DecodeMismatch(format!("unknown OrderState {other}"))),
        })
    }
}

impl Canonical for OrderState {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(self.to_u64());
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        OrderState::from_u64(dec.read_uint()?)
    }
}

/// `{ListingID, VariationIDs, Quantity}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    /// The ordered listing.
    pub listing_id: ObjectId,
    /// The chosen variation ids, one per varying option.
    pub variation_ids: Vec<String>,
    /// Unit count; must be non-zero.
    pub quantity: u64,
}

impl Canonical for OrderItem {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(3);
        self.listing_id.encode(enc);
        self.variation_ids.encode(enc);
        self.quantity.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(3)?;
        Ok(OrderItem {
            listing_id: ObjectId::decode(dec)?,
            variation_ids: Canonical::decode(dec)?,
            quantity: u64::decode(dec)?,
        })
    }
}

/// A shipping or billing address attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostalAddress {
    /// Recipient name.
    pub name: String,
    /// Primary address line.
    pub address_line1: String,
    /// Secondary address line.
    pub address_line2: Option<String>,
    /// City.
    pub city: String,
    /// Postal/zip code.
    pub postal_code: String,
    /// Country.
    pub country: String,
    /// Contact phone number.
    pub phone_number: Option<String>,
}

impl Canonical for PostalAddress {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(7);
        self.name.encode(enc);
        self.address_line1.encode(enc);
        self.address_line2.encode(enc);
        self.city.encode(enc);
        self.postal_code.encode(enc);
        self.country.encode(enc);
        self.phone_number.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(7)?;
        Ok(PostalAddress {
            name: String::decode(dec)?,
            address_line1: String::decode(dec)?,
            address_line2: Canonical::decode(dec)?,
            city: String::decode(dec)?,
            postal_code: String::decode(dec)?,
            country: String::decode(dec)?,
            phone_number: Canonical::decode(dec)?,
        })
    }
}

/// Payment instructions the buyer is expected to satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    /// The total amount due in `ChosenCurrency`.
    pub total: Uint256,
    /// An opaque payment identifier assigned by the payment processor.
    pub payment_id: Vec<u8>,
}

impl Canonical for PaymentDetails {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        self.total.encode(enc);
        self.payment_id.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        Ok(PaymentDetails {
            total: Uint256::decode(dec)?,
            payment_id: Vec::<u8>::decode(dec)?,
        })
    }
}

/// The on-chain transaction that settled a [`PaymentDetails`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDetails {
    /// The settling transaction's hash.
    pub tx_hash: Hash,
}

impl Canonical for TxDetails {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(1);
        self.tx_hash.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(1)?;
        Ok(TxDetails { tx_hash: Hash::decode(dec)? })
    }
}

/// `{ID, Items, State, InvoiceAddress?, ShippingAddress?, CanceledAt?,
/// ChosenPayee?, ChosenCurrency?, PaymentDetails?, TxDetails?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// The order's identifier; must be non-zero.
    pub id: ObjectId,
    /// Line items.
    pub items: Vec<OrderItem>,
    /// Lifecycle state.
    pub state: OrderState,
    /// Billing address.
    pub invoice_address: Option<PostalAddress>,
    /// Delivery address.
    pub shipping_address: Option<PostalAddress>,
    /// When the order was canceled.
    pub canceled_at: Option<Timestamp>,
    /// The manifest payee chosen to receive payment.
    pub chosen_payee: Option<ChainAddress>,
    /// The manifest-accepted currency chosen for payment.
    pub chosen_currency: Option<ChainAddress>,
    /// Payment instructions, once a currency is chosen.
    pub payment_details: Option<PaymentDetails>,
    /// The settling transaction, once paid.
    pub tx_details: Option<TxDetails>,
}

impl Order {
    /// Structural validation: non-zero id, a set `State`, and the
    /// state-dependent required-field matrix of the specification.
    /// Referential integrity (items referencing real listings/variations,
    /// chosen payee/currency matching the manifest) is the patcher's
    /// responsibility since it requires the rest of the shop in scope.
    pub fn validate(&self) -> Result<(), ShopError> {
        if !self.id.is_valid() {
            return Err(ShopError::validation("order ID must be non-zero"));
        }
        if self.state == OrderState::Unspecified {
            return Err(ShopError::validation("order State must be set"));
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ShopError::validation("order item Quantity must be non-zero"));
            }
            if !item.listing_id.is_valid() {
                return Err(ShopError::validation("order item ListingID must be non-zero"));
            }
        }

        if self.state >= OrderState::Committed && self.items.is_empty() {
            return Err(ShopError::validation(format!(
                "order state {:?} requires at least one item",
                self.state
            )));
        }
        if self.state == OrderState::Canceled && self.canceled_at.is_none() {
            return Err(ShopError::validation("Canceled order requires CanceledAt"));
        }
        if self.state >= OrderState::PaymentChosen {
            if self.chosen_payee.is_none() {
                return Err(ShopError::validation(format!(
                    "order state {:?} requires ChosenPayee",
                    self.state
                )));
            }
            if self.chosen_currency.is_none() {
                return Err(ShopError::validation(format!(
                    "order state {:?} requires ChosenCurrency",
                    self.state
                )));
            }
            if self.invoice_address.is_none() && self.shipping_address.is_none() {
                return Err(ShopError::validation(format!(
                    "order state {:?} requires an invoice or shipping address",
                    self.state
                )));
            }
        }
        if self.state >= OrderState::Unpaid && self.payment_details.is_none() {
            return Err(ShopError::validation(format!(
                "order state {:?} requires PaymentDetails",
                self.state
            )));
        }
        if self.state == OrderState::Paid && self.tx_details.is_none() {
            return Err(ShopError::validation("Paid order requires TxDetails"));
        }
        Ok(())
    }

    /// Whether item mutation (add/remove/quantity change) is currently
    /// permitted: only before the order is locked in at `Committed`.
    pub fn items_are_mutable(&self) -> bool {
        self.state < OrderState::Committed
    }
}

impl Canonical for Order {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(10);
        self.id.encode(enc);
        self.items.encode(enc);
        self.state.encode(enc);
        self.invoice_address.encode(enc);
        self.shipping_address.encode(enc);
        self.canceled_at.encode(enc);
        self.chosen_payee.encode(enc);
        self.chosen_currency.encode(enc);
        self.payment_details.encode(enc);
        self.tx_details.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(10)?;
        Ok(Order {
            id: ObjectId::decode(dec)?,
            items: Canonical::decode(dec)?,
            state: OrderState::decode(dec)?,
            invoice_address: Canonical::decode(dec)?,
            shipping_address: Canonical::decode(dec)?,
            canceled_at: Canonical::decode(dec)?,
            chosen_payee: Canonical::decode(dec)?,
            chosen_currency: Canonical::decode(dec)?,
            payment_details: Canonical::decode(dec)?,
            tx_details: Canonical::decode(dec)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    fn bare_order(state: OrderState) -> Order {
        Order {
            id: ObjectId(666),
            items: vec![OrderItem { listing_id: ObjectId(5555), variation_ids: vec![], quantity: 1 }],
            state,
            invoice_address: None,
            shipping_address: None,
            canceled_at: None,
            chosen_payee: None,
            chosen_currency: None,
            payment_details: None,
            tx_details: None,
        }
    }

    #[test]
    fn order_state_total_order_matches_spec() {
        assert!(OrderState::Open < OrderState::Canceled);
        assert!(OrderState::Canceled < OrderState::Committed);
        assert!(OrderState::Committed < OrderState::PaymentChosen);
        assert!(OrderState::PaymentChosen < OrderState::Unpaid);
        assert!(OrderState::Unpaid < OrderState::Paid);
    }

    #[test]
    fn open_order_with_items_validates() {
        assert!(bare_order(OrderState::Open).validate().is_ok());
    }

    #[test]
    fn committed_order_requires_items_mutable_flag_flips() {
        let order = bare_order(OrderState::Committed);
        assert!(order.validate().is_ok());
        assert!(!order.items_are_mutable());
        assert!(bare_order(OrderState::Open).items_are_mutable());
    }

    #[test]
    fn payment_chosen_without_address_is_rejected() {
        use shop_types::primitives::EthereumAddress;
        let mut order = bare_order(OrderState::PaymentChosen);
        order.chosen_payee = Some(ChainAddress { chain_id: 1, address: EthereumAddress::ZERO });
        order.chosen_currency = Some(ChainAddress { chain_id: 1, address: EthereumAddress::ZERO });
        assert!(order.validate().is_err());
        order.shipping_address = Some(PostalAddress::default());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn canceled_without_timestamp_is_rejected() {
        assert!(bare_order(OrderState::Canceled).validate().is_err());
    }

    #[test]
    fn order_roundtrips() {
        let order = bare_order(OrderState::Open);
        let bytes = to_bytes_canonical(&order);
        assert_eq!(from_bytes_canonical::<Order>(&bytes).unwrap(), order);
    }
}
