// Path: crates/shop-crypto/src/sign.rs
//! ECDSA-on-secp256k1 signing and recovery, the scheme the Patch-Set
//! Authenticator uses to bind a `PatchSetHeader` to a KeyCard.
//!
//! Signatures are over the Keccak-256 digest of the canonical header bytes
//! (no personal-message prefix is applied at this layer; callers that need
//! the Ethereum `personal_sign` prefix apply it to the preimage before
//! calling [`sign`]). The recovery byte is always normalized to `27`/`28`.

use crate::hash::keccak256;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use shop_types::error::ShopError;
use shop_types::primitives::{PublicKey, Signature};

/// Signs `message` with `signing_key`, returning a 65-byte `r || s || v`
/// signature with `v` normalized to `27`/`28`.
///
/// The message is hashed with Keccak-256 before signing; callers pass the
/// raw preimage (e.g. the canonical `PatchSetHeader` encoding), not a digest.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Result<Signature, ShopError> {
    let digest = keccak256(message);
    let (sig, recovery_id): (K256Signature, RecoveryId) = signing_key
        .sign_prehash_recoverable(&digest.0)
        .map_err(|e| ShopError::Validation(format!("signing failed: {e}")))?;

    let mut out = [0u8; 65];
    let bytes = sig.to_bytes();
    out[..64].copy_from_slice(&bytes);
    out[64] = 27 + recovery_id.to_byte();
    Ok(Signature(out))
}

/// Recovers the public key that produced `signature` over `message`.
///
/// Returns [`ShopError::Validation`] if the recovery byte is not normalized
/// to `27`/`28` or the embedded `r`/`s` are not a valid signature.
pub fn recover(message: &[u8], signature: &Signature) -> Result<PublicKey, ShopError> {
    let digest = keccak256(message);
    let recovery_id = signature.recovery_id()?;
    let recovery_id = RecoveryId::from_byte(recovery_id)
        .ok_or_else(|| ShopError::Validation("invalid recovery id".into()))?;

    let sig = K256Signature::from_slice(&signature.0[..64])
        .map_err(|e| ShopError::Validation(format!("malformed signature: {e}")))?;

    let verifying_key = VerifyingKey::recover_from_prehash(&digest.0, &sig, recovery_id)
        .map_err(|e| ShopError::Validation(format!("recovery failed: {e}")))?;

    let encoded = verifying_key.to_encoded_point(true);
    let compressed = encoded.as_bytes();
    let arr: [u8; 33] = compressed
        .try_into()
        .map_err(|_| ShopError::Validation("unexpected public key length".into()))?;
    Ok(PublicKey(arr))
}

/// Verifies that `signature` over `message` was produced by `expected`.
pub fn verify(message: &[u8], signature: &Signature, expected: &PublicKey) -> Result<bool, ShopError> {
    let digest = keccak256(message);
    let sig = K256Signature::from_slice(&signature.0[..64])
        .map_err(|e| ShopError::Validation(format!("malformed signature: {e}")))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&expected.0)
        .map_err(|e| ShopError::Validation(format!("malformed public key: {e}")))?;
    Ok(verifying_key.verify_prehash(&digest.0, &sig).is_ok())
}
