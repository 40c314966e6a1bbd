// Path: crates/shop-model/src/account.rs
//! A shop participant's authorization record.

use shop_types::codec::{Canonical, Decoder, Encoder};
use shop_types::error::ShopError;
use shop_types::primitives::PublicKey;

/// `{KeyCards, Guest}`. The guest account is keyed in the shop's Accounts
/// HAMT by the zero address and carries no key cards of its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    /// The public keys authorized to act as this account.
    pub key_cards: Vec<PublicKey>,
    /// Whether this is the shop's anonymous/guest account.
    pub guest: bool,
}

impl Account {
    /// Structural validation: a non-guest account must carry at least one
    /// key card.
    pub fn validate(&self) -> Result<(), ShopError> {
        if !self.guest && self.key_cards.is_empty() {
            return Err(ShopError::validation("non-guest account must carry at least one KeyCard"));
        }
        Ok(())
    }
}

impl Canonical for Account {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array_header(2);
        self.key_cards.encode(enc);
        self.guest.encode(enc);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, ShopError> {
        dec.read_array_header_exact(2)?;
        Ok(Account {
            key_cards: Canonical::decode(dec)?,
            guest: bool::decode(dec)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_types::codec::{from_bytes_canonical, to_bytes_canonical};

    #[test]
    fn account_roundtrips() {
        let account = Account { key_cards: vec![PublicKey([1u8; 33])], guest: false };
        let bytes = to_bytes_canonical(&account);
        assert_eq!(from_bytes_canonical::<Account>(&bytes).unwrap(), account);
    }

    #[test]
    fn non_guest_without_keycards_is_rejected() {
        let account = Account { key_cards: vec![], guest: false };
        assert!(account.validate().is_err());
    }

    #[test]
    fn guest_account_needs_no_keycards() {
        let account = Account { key_cards: vec![], guest: true };
        assert!(account.validate().is_ok());
    }
}
