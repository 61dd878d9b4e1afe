//! Taproot output-key tweaking: `Q = P + t·G` with `t = TapTweak(P.x)`.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::curve::CURVE;
use crate::error::{Error, Result};
use crate::outcome::{Check, VerificationOutcome};
use crate::point::{mul_generator, point_add, to_be_bytes32, Point};
use crate::scalar::{check_scalar, normalize_prefix, to_hex64};

/// Domain tag for the taproot tweak.
pub const TAP_TWEAK_TAG: &[u8] = b"TapTweak";

/// `SHA256(SHA256(tag) || SHA256(tag) || data)`
pub fn tagged_hash(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag);
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// Output of one tweak computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakResult {
    /// Internal key P
    pub internal: Point,
    pub internal_x: BigUint,
    /// Raw tagged-hash output
    pub tweak_bytes: [u8; 32],
    /// Tagged hash reduced mod n
    pub tweak: BigUint,
    /// Output key Q = P + t·G
    pub output: Point,
    pub output_x: BigUint,
}

/// Tweak an internal key point.
pub fn tweak_point(internal: &Point) -> Result<TweakResult> {
    let internal_x = internal
        .x()
        .ok_or(Error::PointAtInfinity { field: "internal key" })?
        .clone();
    let tweak_bytes = tagged_hash(TAP_TWEAK_TAG, &to_be_bytes32(&internal_x));
    let tweak = BigUint::from_bytes_be(&tweak_bytes) % &CURVE.n;

    let output = point_add(internal, &mul_generator(&tweak)?)?;
    let output_x = output
        .x()
        .ok_or(Error::PointAtInfinity { field: "output key" })?
        .clone();

    Ok(TweakResult {
        internal: internal.clone(),
        internal_x,
        tweak_bytes,
        tweak,
        output,
        output_x,
    })
}

/// Tweak the key `d·G`.
pub fn taproot_tweak(privkey: &BigUint) -> Result<TweakResult> {
    check_scalar("privkey", privkey)?;
    tweak_point(&mul_generator(privkey)?)
}

/// Tweak both points with x coordinate `internal_x`, even y first.
///
/// The sign of y cannot be recovered from x alone, so both candidates are
/// returned.
pub fn tweak_from_x(internal_x: &BigUint) -> Result<[TweakResult; 2]> {
    let [even, odd] = Point::lift_x(internal_x)?;
    Ok([tweak_point(&even)?, tweak_point(&odd)?])
}

/// Where the internal key comes from.
#[derive(Debug, Clone)]
pub enum InternalKey {
    /// Full private key d, P = d·G
    Private(BigUint),
    /// Only P.x is known
    XOnly(BigUint),
}

/// A taproot-mode result.
#[derive(Debug, Clone)]
pub struct TaprootClaim {
    pub key: InternalKey,
    /// Expected output key Q.x, full or as a hex prefix
    pub expected_output_x: String,
    /// Expected tweak t, if reported
    pub expected_tweak: Option<String>,
}

impl TaprootClaim {
    pub fn verify(&self) -> Result<VerificationOutcome> {
        verify_taproot(self)
    }
}

/// Recompute the output key and compare it against the claim.
///
/// For an x-only internal key the claim holds if either parity candidate
/// matches.
pub fn verify_taproot(claim: &TaprootClaim) -> Result<VerificationOutcome> {
    let candidates: Vec<TweakResult> = match &claim.key {
        InternalKey::Private(d) => vec![taproot_tweak(d)?],
        InternalKey::XOnly(x) => tweak_from_x(x)?.to_vec(),
    };
    let expected_q = normalize_prefix("expected Q.x", &claim.expected_output_x)?;
    let mut checks = Vec::with_capacity(2);

    if let Some(expected_t) = &claim.expected_tweak {
        let expected_t = normalize_prefix("expected tweak", expected_t)?;
        // t depends on P.x only, so every candidate shares it
        let t_hex = hex::encode(candidates[0].tweak_bytes);
        if !t_hex.starts_with(&expected_t) {
            return Ok(VerificationOutcome::mismatch(Check::TaprootTweak, t_hex, expected_t));
        }
        checks.push(Check::TaprootTweak);
    }

    let outputs: Vec<String> = candidates.iter().map(|c| to_hex64(&c.output_x)).collect();
    match outputs.iter().position(|q| q.starts_with(&expected_q)) {
        Some(index) => {
            checks.push(Check::TaprootOutputKey);
            let parity = match (&claim.key, index) {
                (InternalKey::Private(_), _) => "",
                (InternalKey::XOnly(_), 0) => " (even-y internal key)",
                (InternalKey::XOnly(_), _) => " (odd-y internal key)",
            };
            Ok(VerificationOutcome::confirmed(
                checks,
                format!("Q.x = {}... matches{}", &outputs[index][..16], parity),
            ))
        }
        None => Ok(VerificationOutcome::mismatch(
            Check::TaprootOutputKey,
            outputs.join(" | "),
            expected_q,
        )),
    }
}
