//! secp256k1 domain parameters
//!
//! y² = x³ + 7 over the prime field p = 2^256 - 2^32 - 977.

use hex_literal::hex;
use num_bigint::BigUint;
use once_cell::sync::Lazy;

use crate::point::Point;

// Field prime p, big endian.
const P_BE: [u8; 32] = hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F");

// Group order n, big endian.
const N_BE: [u8; 32] = hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141");

// Generator X coordinate, big endian.
const GX_BE: [u8; 32] = hex!("79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798");

// Generator Y coordinate, big endian.
const GY_BE: [u8; 32] = hex!("483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8");

/// Immutable curve constants, built once and shared by every verifier.
#[derive(Debug, Clone)]
pub struct CurveParams {
    /// Prime modulus of the coordinate field
    pub p: BigUint,
    /// Order of the generator
    pub n: BigUint,
    /// Curve constant b (a = 0)
    pub b: BigUint,
    /// Generator point G
    pub g: Point,
    /// floor(n / 2), the low-s bound
    pub half_n: BigUint,
    /// (p + 1) / 4, square-root exponent since p ≡ 3 (mod 4)
    pub sqrt_exp: BigUint,
}

impl CurveParams {
    fn secp256k1() -> Self {
        let p = BigUint::from_bytes_be(&P_BE);
        let n = BigUint::from_bytes_be(&N_BE);
        let g = Point::Affine {
            x: BigUint::from_bytes_be(&GX_BE),
            y: BigUint::from_bytes_be(&GY_BE),
        };
        let half_n = &n >> 1u32;
        let sqrt_exp = (&p + 1u32) >> 2u32;

        Self {
            p,
            n,
            b: BigUint::from(7u32),
            g,
            half_n,
            sqrt_exp,
        }
    }
}

/// The secp256k1 parameter set.
pub static CURVE: Lazy<CurveParams> = Lazy::new(CurveParams::secp256k1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_on_curve() {
        assert!(CURVE.g.is_on_curve());
    }

    #[test]
    fn test_field_prime_is_3_mod_4() {
        assert_eq!(&CURVE.p % 4u32, BigUint::from(3u32));
    }

    #[test]
    fn test_half_order() {
        let expected = BigUint::parse_bytes(
            b"7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
            16,
        )
        .unwrap();
        assert_eq!(CURVE.half_n, expected);
    }
}
