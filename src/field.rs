//! Modular arithmetic over the field prime and the group order.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Modular inverse using the iterative extended Euclidean algorithm.
///
/// Returns the unique `x` in `[0, m)` with `a·x ≡ 1 (mod m)`, or
/// [`Error::NoInverse`] when `gcd(a, m) != 1`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    if m.is_zero() {
        return Err(Error::NoInverse);
    }
    let m_int = BigInt::from(m.clone());

    let mut old_r = m_int.clone();
    let mut r = BigInt::from(a % m);
    let mut old_s = BigInt::zero();
    let mut s = BigInt::one();

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return Err(Error::NoInverse);
    }

    // old_s is the Bezout coefficient of a; bring it into [0, m)
    Ok(reduce(&old_s, m))
}

/// Reduce a signed integer into `[0, m)`.
pub fn reduce(a: &BigInt, m: &BigUint) -> BigUint {
    let m_int = BigInt::from(m.clone());
    let r = a % &m_int;
    let r = if r.sign() == Sign::Minus { r + &m_int } else { r };
    // r is non-negative here
    r.magnitude().clone()
}

/// `(a - b) mod m` for operands already reduced into `[0, m)`.
pub fn mod_sub(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    if a >= b {
        (a - b) % m
    } else {
        (m - (b - a) % m) % m
    }
}

/// Square root modulo a prime `p ≡ 3 (mod 4)`, given `exp = (p + 1) / 4`.
///
/// Returns `None` when `a` is not a quadratic residue.
pub fn mod_sqrt(a: &BigUint, p: &BigUint, exp: &BigUint) -> Option<BigUint> {
    let a = a % p;
    let root = a.modpow(exp, p);
    if (&root * &root) % p == a {
        Some(root)
    } else {
        None
    }
}
