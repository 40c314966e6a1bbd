// Path: crates/shop-types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Shop Types
//!
//! Foundational crate for the shop integrity spine: the canonical codec,
//! the error taxonomy, and the primitive wire types (`ObjectId`, `Uint256`,
//! `Hash`, `PublicKey`, `Signature`, `EthereumAddress`, `ChainAddress`) and
//! the typed `Path` discriminator that every other crate builds on.
//!
//! ## Architectural role
//!
//! As the base crate, `shop-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. This prevents
//! circular dependencies and gives a single, stable definition for the
//! bytes that get hashed and signed.

/// A crate-wide `Result` type alias with the shared error type as default.
pub type Result<T, E = crate::error::ShopError> = std::result::Result<T, E>;

/// The canonical, deterministic binary codec for all consensus-critical state.
pub mod codec;
/// A unified error taxonomy used across the codec, HAMT, model and patcher.
pub mod error;
/// The typed, path-addressed discriminator used by patches.
pub mod path;
/// Primitive wire types: identifiers, big integers, hashes, keys, addresses.
pub mod primitives;
