// Path: crates/shop-types/src/error/mod.rs
//! Error taxonomy shared by every layer of the shop integrity spine.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
///
/// Every error kind keeps a code independent of its `Display` message so
/// callers (and tests) can match on it without depending on wording.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// The unified error type returned by the codec, HAMT, shop model, patcher
/// and authenticator. Each variant corresponds to one of the error kinds
/// enumerated in the specification's error-handling design.
#[derive(Debug, Error)]
pub enum ShopError {
    /// A binary payload was shorter than a fixed-size primitive required.
    #[error("bytes too short: expected at least {expected} bytes, got {got}")]
    BytesTooShort {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes actually available.
        got: usize,
    },
    /// Structural decoding failed: wrong tag, wrong arity, or wrong type.
    #[error("decode mismatch: {0}")]
    DecodeMismatch(String),
    /// A value failed field-level structural validation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The addressed entity (by id, key, or index) does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An `add` operation targeted an already-occupied key.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The operation is disallowed by a state machine or monotonicity rule.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A foreign-key reference to another entity was not satisfied.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),
    /// An inventory decrement would underflow below zero.
    #[error("out of stock: {0}")]
    OutOfStock(String),
    /// A numeric index fell outside the bounds of the addressed slice.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),
    /// The op/type/path combination is not defined by the mutation engine.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// An MMR inclusion proof did not reconstruct to an accumulator peak.
    #[error("proof failure: {0}")]
    ProofFailure(String),
}

impl ErrorCode for ShopError {
    fn code(&self) -> &'static str {
        match self {
            Self::BytesTooShort { .. } => "BYTES_TOO_SHORT",
            Self::DecodeMismatch(_) => "DECODE_MISMATCH",
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::ReferentialIntegrity(_) => "REFERENTIAL_INTEGRITY",
            Self::OutOfStock(_) => "OUT_OF_STOCK",
            Self::IndexOutOfBounds(_) => "INDEX_OUT_OF_BOUNDS",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::ProofFailure(_) => "PROOF_FAILURE",
        }
    }
}

impl ShopError {
    /// Shorthand for a [`ShopError::Validation`] built from a `Display`-able reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Shorthand for a [`ShopError::NotFound`] built from a `Display`-able reason.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }
}
