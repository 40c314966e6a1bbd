// Path: crates/shop-model/src/lib.rs
//! # Shop Model Crate Lints
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
//! # Shop Model
//!
//! The shop aggregate: a schema version, a manifest, and the five
//! [`shop_hamt::Hamt`]-backed tables (accounts, listings, tags, orders,
//! inventory) that hold every entity a shop owns. Every type here is
//! structurally self-validating (`validate()`); cross-table referential
//! integrity is the patcher's job, since only it has the whole shop in
//! scope at the moment a reference is introduced.

pub mod account;
pub mod inventory;
pub mod listing;
pub mod manifest;
pub mod order;
pub mod shop;
pub mod tag;

pub use account::Account;
pub use inventory::inventory_key;
pub use listing::{Availability, Listing, ListingOption, ListingStockStatus, ListingVariation, Metadata, ViewState};
pub use manifest::{Manifest, Payee, PriceModifier, ShippingRegion};
pub use order::{Order, OrderItem, OrderState, PaymentDetails, PostalAddress, TxDetails};
pub use shop::{AccountsTable, InventoryTable, ListingsTable, OrdersTable, Shop, TagsTable};
pub use tag::Tag;
