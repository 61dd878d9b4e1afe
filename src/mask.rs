//! Mask/prefix claims: a private key whose public key x coordinate starts
//! with (or matches under a bitmask) a target pattern.

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::outcome::{Check, VerificationOutcome};
use crate::point::mul_generator;
use crate::scalar::{check_scalar, normalize_prefix, parse_hex, to_hex64};

/// A mask-mode result as reported by the grinder.
#[derive(Debug, Clone)]
pub struct MaskClaim {
    pub privkey: BigUint,
    /// Hex pattern the pubkey x coordinate must start with
    pub target: String,
    /// Explicit 256-bit mask; when set, only masked bits are compared
    pub mask: Option<String>,
    /// The `MASK:` value printed by the grinder, if any
    pub reported_x: Option<String>,
}

impl MaskClaim {
    pub fn new(privkey: BigUint, target: impl Into<String>) -> Self {
        Self {
            privkey,
            target: target.into(),
            mask: None,
            reported_x: None,
        }
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn with_reported_x(mut self, reported: impl Into<String>) -> Self {
        self.reported_x = Some(reported.into());
        self
    }

    pub fn verify(&self) -> Result<VerificationOutcome> {
        verify_mask_claim(self)
    }
}

/// Check that `k·G` has an x coordinate matching `target`.
pub fn verify_mask(privkey: &BigUint, target: &str, mask: Option<&str>) -> Result<VerificationOutcome> {
    let mut claim = MaskClaim::new(privkey.clone(), target);
    claim.mask = mask.map(str::to_string);
    verify_mask_claim(&claim)
}

fn verify_mask_claim(claim: &MaskClaim) -> Result<VerificationOutcome> {
    check_scalar("privkey", &claim.privkey)?;

    let pubkey = mul_generator(&claim.privkey)?;
    let x = pubkey
        .x()
        .ok_or(Error::PointAtInfinity { field: "public key" })?;
    let x_hex = to_hex64(x);

    let target = normalize_prefix("target", &claim.target)?;
    if target.len() > 64 {
        return Err(Error::malformed("target", "longer than 64 hex digits"));
    }

    let mut checks = Vec::with_capacity(2);

    if let Some(reported) = &claim.reported_x {
        let reported = normalize_prefix("reported pubkey.x", reported)?;
        if reported.len() > 64 {
            return Err(Error::malformed("reported pubkey.x", "longer than 64 hex digits"));
        }
        if !x_hex.starts_with(&reported) {
            return Ok(VerificationOutcome::mismatch(
                Check::ReportedPubkey,
                &x_hex[..reported.len()],
                reported,
            ));
        }
        checks.push(Check::ReportedPubkey);
    }

    match &claim.mask {
        Some(mask) => {
            // the target covers the leading digits; the rest is zero
            let padded = format!("{:0<64}", target);
            let target_int = parse_hex("target", &padded)?;
            let mask_int = parse_hex("mask", mask)?;

            let derived = x & &mask_int;
            let expected = &target_int & &mask_int;
            if derived != expected {
                return Ok(VerificationOutcome::mismatch(
                    Check::MaskBits,
                    to_hex64(&derived),
                    to_hex64(&expected),
                ));
            }
            checks.push(Check::MaskBits);
            Ok(VerificationOutcome::confirmed(
                checks,
                format!("pubkey.x = {}... matches {} under mask", &x_hex[..16], target),
            ))
        }
        None => {
            if !x_hex.starts_with(&target) {
                return Ok(VerificationOutcome::mismatch(
                    Check::MaskPrefix,
                    &x_hex[..target.len()],
                    target,
                ));
            }
            checks.push(Check::MaskPrefix);
            Ok(VerificationOutcome::confirmed(
                checks,
                format!("pubkey.x = {}... starts with {}", &x_hex[..16], target),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CURVE;

    #[test]
    fn test_generator_prefix_confirmed() {
        let outcome = verify_mask(&BigUint::from(1u32), "79BE", None).unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome::confirmed(
                vec![Check::MaskPrefix],
                "pubkey.x = 79be667ef9dcbbac... starts with 79be"
            )
        );
    }

    #[test]
    fn test_generator_prefix_mismatch() {
        let outcome = verify_mask(&BigUint::from(1u32), "FFFF", None).unwrap();
        assert_eq!(outcome, VerificationOutcome::mismatch(Check::MaskPrefix, "79be", "ffff"));
    }

    #[test]
    fn test_known_key_prefix() {
        // x = e2c8d082...
        let k = BigUint::parse_bytes(
            b"4c0883a69102937d6231471b5dbb6204fe512961708279f8b9f0629fbd2b6f72",
            16,
        )
        .unwrap();
        assert!(verify_mask(&k, "e2c8d0", None).unwrap().is_confirmed());
        assert!(!verify_mask(&k, "e2c8d1", None).unwrap().is_confirmed());
    }

    #[test]
    fn test_explicit_mask_ignores_unmasked_bits() {
        // G.x = 79be..., mask only the high byte: 0x79
        let mask = format!("{:0<64}", "ff");
        let outcome = verify_mask(&BigUint::from(1u32), "7900", Some(&mask)).unwrap();
        assert_eq!(outcome.failed_check(), None);
        assert!(outcome.is_confirmed());

        let outcome = verify_mask(&BigUint::from(1u32), "7a", Some(&mask)).unwrap();
        assert_eq!(outcome.failed_check(), Some(Check::MaskBits));
    }

    #[test]
    fn test_nibble_mask() {
        // 0x7 in the top nibble only
        let mask = format!("{:0<64}", "f");
        assert!(verify_mask(&BigUint::from(1u32), "7", Some(&mask))
            .unwrap()
            .is_confirmed());
    }

    #[test]
    fn test_out_of_range_key() {
        assert_eq!(
            verify_mask(&BigUint::from(0u32), "00", None),
            Err(Error::OutOfRange { field: "privkey" })
        );
        assert_eq!(
            verify_mask(&CURVE.n, "00", None),
            Err(Error::OutOfRange { field: "privkey" })
        );
    }

    #[test]
    fn test_malformed_target() {
        assert!(matches!(
            verify_mask(&BigUint::from(1u32), "zz", None),
            Err(Error::MalformedInput { field: "target", .. })
        ));
    }

    #[test]
    fn test_reported_x_cross_check() {
        let claim = MaskClaim::new(BigUint::from(1u32), "79be").with_reported_x("79BE667EF9DCBBAC");
        let outcome = claim.verify().unwrap();
        assert!(outcome.is_confirmed());

        let claim = MaskClaim::new(BigUint::from(1u32), "79be").with_reported_x("79BE000000000000");
        assert_eq!(claim.verify().unwrap().failed_check(), Some(Check::ReportedPubkey));
    }

    #[test]
    fn test_reported_x_too_long() {
        let gx = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let claim = MaskClaim::new(BigUint::from(1u32), "79be").with_reported_x(gx);
        assert!(claim.verify().unwrap().is_confirmed());

        let claim = MaskClaim::new(BigUint::from(1u32), "79be").with_reported_x(format!("{}00", gx));
        assert!(matches!(claim.verify(), Err(Error::MalformedInput { field: "reported pubkey.x", .. })));
    }
}
