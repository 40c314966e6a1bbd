// Path: crates/shop-auth/src/lib.rs
//! # Shop Auth Crate Lints
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
//! # Shop Auth
//!
//! The Patch-Set Authenticator: builds the padded Merkle Mountain Range root
//! over an ordered batch of patches, binds it into a signed
//! `PatchSetHeader`, and verifies a received `SignedPatchSet` against a
//! KeyCard, a recomputed root and a future-timestamp tolerance.

pub mod authenticator;
pub mod header;
pub mod root;

pub use authenticator::{build_signed_patch_set, verify_signed_patch_set, MAX_FUTURE_SKEW_SECS};
pub use header::{PatchSetHeader, SignedPatchSet};
pub use root::{build_patch_set_mmr, compute_root_hash, prove_patch};
