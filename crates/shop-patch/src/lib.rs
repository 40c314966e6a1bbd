// Path: crates/shop-patch/src/lib.rs
//! # Shop Patch Crate Lints
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]
//! # Shop Patch
//!
//! The typed patch model (`Patch`, `PatchOp`) and the mutation engine
//! (`patcher::apply`) that validates and applies a single patch against a
//! [`shop_model::shop::Shop`], enforcing the referential, type and
//! lifecycle invariants the specification assigns to each entity.

pub mod patch;
pub mod patcher;

pub use patch::{Patch, PatchOp};
