//! Signature-mode claims: R-value grinding for ECDSA and Schnorr.
//!
//! R-value grinding only constrains `r`, so an `r` mismatch always rejects the
//! claim. For ECDSA the full signature is then recomputed from the nonce,
//! message hash and private key, and independently checked with the public
//! verification equation.
//!
//! For Schnorr (BIP-340 style) only `R.x` is checked. The grinder adjusts the
//! nonce for R's y parity itself and its challenge-hash convention is not
//! pinned down, so `s` is deliberately not recomputed here.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::curve::CURVE;
use crate::error::{Error, Result};
use crate::field::mod_inverse;
use crate::outcome::{Check, VerificationOutcome};
use crate::point::{mul_generator, point_add, scalar_mul, Point};
use crate::scalar::{check_scalar, to_hex64};

/// An ECDSA signature-mode result.
#[derive(Debug, Clone)]
pub struct EcdsaClaim {
    /// Nonce k reported by the grinder
    pub nonce: BigUint,
    /// Message hash z
    pub z: BigUint,
    /// Signing key d
    pub privkey: BigUint,
    pub r: BigUint,
    pub s: BigUint,
}

/// A Schnorr signature-mode result; only the nonce point is checked.
#[derive(Debug, Clone)]
pub struct SchnorrClaim {
    pub nonce: BigUint,
    pub r: BigUint,
}

/// Canonicalize `s` to the smaller of `{s, n - s}`.
pub fn low_s_normalize(s: &BigUint) -> BigUint {
    if s > &CURVE.half_n {
        &CURVE.n - s
    } else {
        s.clone()
    }
}

/// Compute `(r, s)` for nonce `k`, hash `z` and key `d`, with low-s applied.
pub fn compute_ecdsa(nonce: &BigUint, z: &BigUint, privkey: &BigUint) -> Result<(BigUint, BigUint)> {
    check_scalar("nonce", nonce)?;
    check_scalar("privkey", privkey)?;

    let r = nonce_r(nonce)?;
    let s = raw_s(nonce, z, &r, privkey)?;
    Ok((r, low_s_normalize(&s)))
}

/// `R.x mod n` for `R = k·G`.
fn nonce_r(nonce: &BigUint) -> Result<BigUint> {
    let big_r = mul_generator(nonce)?;
    let x = big_r.x().ok_or(Error::PointAtInfinity { field: "R" })?;
    Ok(x % &CURVE.n)
}

/// `k⁻¹·(z + r·d) mod n`
fn raw_s(nonce: &BigUint, z: &BigUint, r: &BigUint, privkey: &BigUint) -> Result<BigUint> {
    let n = &CURVE.n;
    let k_inv = mod_inverse(nonce, n)?;
    Ok(k_inv * ((z + r * privkey) % n) % n)
}

/// Public ECDSA verification: does `(z/s)·G + (r/s)·P` have `x ≡ r (mod n)`?
pub fn verification_equation_holds(z: &BigUint, r: &BigUint, s: &BigUint, pubkey: &Point) -> Result<bool> {
    let n = &CURVE.n;
    let s_inv = mod_inverse(s, n)?;
    let u1 = (z * &s_inv) % n;
    let u2 = (r * &s_inv) % n;

    let r_prime = point_add(&mul_generator(&u1)?, &scalar_mul(&u2, pubkey)?)?;
    Ok(match r_prime.x() {
        Some(x) => &(x % n) == r,
        None => false,
    })
}

impl EcdsaClaim {
    pub fn verify(&self) -> Result<VerificationOutcome> {
        verify_ecdsa(self)
    }
}

impl SchnorrClaim {
    pub fn verify(&self) -> Result<VerificationOutcome> {
        verify_schnorr(self)
    }
}

/// Verify an ECDSA claim: r match, low-s, s match, verification equation.
pub fn verify_ecdsa(claim: &EcdsaClaim) -> Result<VerificationOutcome> {
    check_scalar("nonce", &claim.nonce)?;
    check_scalar("privkey", &claim.privkey)?;

    let r = nonce_r(&claim.nonce)?;
    if r != claim.r {
        return Ok(VerificationOutcome::mismatch(
            Check::EcdsaR,
            to_hex64(&r),
            to_hex64(&claim.r),
        ));
    }

    // a high-s claim is rejected as such before the value comparison
    if claim.s > CURVE.half_n {
        return Ok(VerificationOutcome::mismatch(
            Check::LowS,
            format!("<= {}", to_hex64(&CURVE.half_n)),
            to_hex64(&claim.s),
        ));
    }

    let s_raw = raw_s(&claim.nonce, &claim.z, &r, &claim.privkey)?;
    let s = low_s_normalize(&s_raw);
    if s != claim.s {
        return Ok(VerificationOutcome::mismatch(
            Check::EcdsaS,
            to_hex64(&s),
            to_hex64(&claim.s),
        ));
    }

    if (&claim.s % &CURVE.n).is_zero() {
        return Ok(VerificationOutcome::Invalid(
            "s is zero, signature is undefined".to_string(),
        ));
    }

    let pubkey = mul_generator(&claim.privkey)?;
    if !verification_equation_holds(&claim.z, &claim.r, &claim.s, &pubkey)? {
        return Ok(VerificationOutcome::mismatch(
            Check::EcdsaEquation,
            "R'.x mod n != r",
            to_hex64(&claim.r),
        ));
    }

    let r_hex = to_hex64(&r);
    let s_hex = to_hex64(&s);
    Ok(VerificationOutcome::confirmed(
        vec![Check::EcdsaR, Check::LowS, Check::EcdsaS, Check::EcdsaEquation],
        format!(
            "r = {}..., s = {}... (low-s), verification equation holds",
            &r_hex[..16],
            &s_hex[..16]
        ),
    ))
}

/// Verify a Schnorr claim by its nonce point only.
pub fn verify_schnorr(claim: &SchnorrClaim) -> Result<VerificationOutcome> {
    check_scalar("nonce", &claim.nonce)?;

    let r = nonce_r(&claim.nonce)?;
    if r != claim.r {
        return Ok(VerificationOutcome::mismatch(
            Check::SchnorrR,
            to_hex64(&r),
            to_hex64(&claim.r),
        ));
    }

    let r_hex = to_hex64(&r);
    Ok(VerificationOutcome::confirmed(
        vec![Check::SchnorrR],
        format!("Schnorr R.x = {}... matches (s not checked)", &r_hex[..16]),
    ))
}
