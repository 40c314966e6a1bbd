// Path: crates/shop-auth/src/authenticator.rs
//! Assembles and verifies [`SignedPatchSet`]s: the signing half builds the
//! header's root and signs its canonical encoding; the verification half
//! recomputes that root, checks the signature recovers to the expected
//! KeyCard, and rejects headers timestamped too far in the future.

use k256::ecdsa::SigningKey;
use tracing::{debug, warn};

use shop_types::codec::to_bytes_canonical;
use shop_types::error::ShopError;
use shop_types::primitives::{PublicKey, Timestamp, Uint256};

use shop_crypto::sign::{recover, sign};
use shop_patch::Patch;

use crate::header::{PatchSetHeader, SignedPatchSet};
use crate::root::compute_root_hash;

/// How far into the future a header's timestamp may sit relative to the
/// verifier's reference clock before it is rejected. Five minutes gives
/// ordinary clock skew between a KeyCard and a relay room to clear without
/// opening a window a stale-dated patch set could exploit.
pub const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Builds and signs a patch set: computes the padded root over `patches`,
/// assembles a [`PatchSetHeader`], and signs its canonical encoding with
/// `signing_key`.
pub fn build_signed_patch_set(
    signing_key: &SigningKey,
    key_card_nonce: u64,
    shop_id: Uint256,
    timestamp: Timestamp,
    patches: Vec<Patch>,
) -> Result<SignedPatchSet, ShopError> {
    let header = PatchSetHeader {
        key_card_nonce,
        shop_id,
        timestamp,
        root_hash: compute_root_hash(&patches),
    };
    header.validate()?;

    let signature = sign(signing_key, &to_bytes_canonical(&header))?;
    debug!(
        target: "patch-set-auth",
        "built patch set: nonce={key_card_nonce} patches={} root={:?}",
        patches.len(),
        header.root_hash
    );
    Ok(SignedPatchSet { header, signature, patches })
}

/// Verifies `signed` in full: the header is structurally valid, its root
/// matches a fresh recomputation over `signed.patches`, the signature
/// recovers to `expected_signer`, and the header's timestamp is not more
/// than [`MAX_FUTURE_SKEW_SECS`] ahead of `now`.
///
/// `now` is supplied by the caller rather than read from the system clock,
/// so this function stays a pure, replayable check of its inputs.
pub fn verify_signed_patch_set(
    signed: &SignedPatchSet,
    expected_signer: &PublicKey,
    now: Timestamp,
) -> Result<(), ShopError> {
    signed.header.validate()?;

    if !signed.root_matches_header() {
        warn!(target: "patch-set-auth", "root mismatch for nonce={}", signed.header.key_card_nonce);
        return Err(ShopError::ProofFailure(
            "patch set root does not match its header's RootHash".into(),
        ));
    }

    let skew = signed.header.timestamp.0.signed_duration_since(now.0).num_seconds();
    if skew > MAX_FUTURE_SKEW_SECS {
        warn!(target: "patch-set-auth", "header {skew}s in the future (tolerance {MAX_FUTURE_SKEW_SECS}s)");
        return Err(ShopError::validation(format!(
            "patch set header is {skew}s in the future, exceeding the {MAX_FUTURE_SKEW_SECS}s tolerance"
        )));
    }

    let header_bytes = to_bytes_canonical(&signed.header);
    let recovered = recover(&header_bytes, &signed.signature)?;
    if recovered.0 != expected_signer.0 {
        warn!(target: "patch-set-auth", "signature does not recover to the expected KeyCard");
        return Err(ShopError::validation(
            "patch set signature does not recover to the expected KeyCard",
        ));
    }

    debug!(target: "patch-set-auth", "verified patch set nonce={}", signed.header.key_card_nonce);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use rand::rngs::OsRng;
    use shop_patch::PatchOp;
    use shop_types::path::{Path, PathType};
    use shop_types::primitives::ObjectId;

    fn public_key_of(signing_key: &SigningKey) -> PublicKey {
        let encoded = signing_key.verifying_key().to_encoded_point(true);
        let mut arr = [0u8; 33];
        arr.copy_from_slice(encoded.as_bytes());
        PublicKey(arr)
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    fn sample_patches() -> Vec<Patch> {
        vec![
            Patch::with_value(PatchOp::Replace, Path::root(PathType::Listing(ObjectId(1))), &1u64),
            Patch::with_value(PatchOp::Replace, Path::root(PathType::Listing(ObjectId(2))), &2u64),
        ]
    }

    #[test]
    fn signed_patch_set_verifies_against_its_signer() {
        let signing_key = SigningKey::random(&mut OsRng);
        let signer = public_key_of(&signing_key);
        let now = ts("2026-01-01T00:00:00Z");

        let signed = build_signed_patch_set(&signing_key, 1, Uint256::from_u64(7), now, sample_patches()).unwrap();

        verify_signed_patch_set(&signed, &signer, now).expect("genuine patch set should verify");
    }

    #[test]
    fn wrong_signer_is_rejected() {
        let signing_key = SigningKey::random(&mut OsRng);
        let other_key = SigningKey::random(&mut OsRng);
        let other_signer = public_key_of(&other_key);
        let now = ts("2026-01-01T00:00:00Z");

        let signed = build_signed_patch_set(&signing_key, 1, Uint256::from_u64(7), now, sample_patches()).unwrap();

        assert!(verify_signed_patch_set(&signed, &other_signer, now).is_err());
    }

    #[test]
    fn tampered_patches_break_the_root_check() {
        let signing_key = SigningKey::random(&mut OsRng);
        let signer = public_key_of(&signing_key);
        let now = ts("2026-01-01T00:00:00Z");

        let mut signed = build_signed_patch_set(&signing_key, 1, Uint256::from_u64(7), now, sample_patches()).unwrap();
        signed.patches.push(Patch::with_value(
            PatchOp::Replace,
            Path::root(PathType::Listing(ObjectId(3))),
            &3u64,
        ));

        let err = verify_signed_patch_set(&signed, &signer, now).unwrap_err();
        assert!(matches!(err, ShopError::ProofFailure(_)));
    }

    #[test]
    fn far_future_timestamp_is_rejected() {
        let signing_key = SigningKey::random(&mut OsRng);
        let signer = public_key_of(&signing_key);
        let now = ts("2026-01-01T00:00:00Z");
        let header_time = Timestamp(now.0 + Duration::seconds(MAX_FUTURE_SKEW_SECS + 60));

        let signed =
            build_signed_patch_set(&signing_key, 1, Uint256::from_u64(7), header_time, sample_patches()).unwrap();

        assert!(verify_signed_patch_set(&signed, &signer, now).is_err());
    }

    #[test]
    fn skew_within_tolerance_is_accepted() {
        let signing_key = SigningKey::random(&mut OsRng);
        let signer = public_key_of(&signing_key);
        let now = ts("2026-01-01T00:00:00Z");
        let header_time = Timestamp(now.0 + Duration::seconds(MAX_FUTURE_SKEW_SECS - 30));

        let signed =
            build_signed_patch_set(&signing_key, 1, Uint256::from_u64(7), header_time, sample_patches()).unwrap();

        verify_signed_patch_set(&signed, &signer, now).expect("skew within tolerance should verify");
    }

    #[test]
    fn zero_nonce_header_is_rejected_before_signing() {
        let signing_key = SigningKey::random(&mut OsRng);
        let now = ts("2026-01-01T00:00:00Z");
        let err = build_signed_patch_set(&signing_key, 0, Uint256::from_u64(7), now, sample_patches()).unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }
}
