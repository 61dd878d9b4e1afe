//! Affine point arithmetic on secp256k1 using exact big-integer math.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::curve::CURVE;
use crate::error::{Error, Result};
use crate::field::{mod_inverse, mod_sqrt, mod_sub};

/// A curve point in affine coordinates, or the group identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    /// Build an affine point, rejecting coordinates that are off the curve.
    pub fn new(x: BigUint, y: BigUint) -> Result<Self> {
        let point = Point::Affine { x, y };
        if point.is_on_curve() {
            Ok(point)
        } else {
            Err(Error::CurveViolation("y² != x³ + 7 (mod p)".to_string()))
        }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    /// x coordinate, `None` for the identity
    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    /// y coordinate, `None` for the identity
    pub fn y(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { y, .. } => Some(y),
        }
    }

    /// Check `y² ≡ x³ + 7 (mod p)`. The identity is considered on the curve.
    pub fn is_on_curve(&self) -> bool {
        match self {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                let p = &CURVE.p;
                if x >= p || y >= p {
                    return false;
                }
                let lhs = (y * y) % p;
                let rhs = (x * x % p * x + &CURVE.b) % p;
                lhs == rhs
            }
        }
    }

    /// Additive inverse `(x, -y)`.
    pub fn negate(&self) -> Point {
        match self {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: mod_sub(&BigUint::zero(), y, &CURVE.p),
            },
        }
    }

    /// Recover both points with the given x coordinate.
    ///
    /// The first entry has even y, the second odd y. Fails when `x³ + 7` is
    /// not a square modulo p, i.e. no point with this x exists.
    pub fn lift_x(x: &BigUint) -> Result<[Point; 2]> {
        let p = &CURVE.p;
        if x >= p {
            return Err(Error::CurveViolation("x coordinate exceeds field prime".to_string()));
        }
        let rhs = (x * x % p * x + &CURVE.b) % p;
        let y = mod_sqrt(&rhs, p, &CURVE.sqrt_exp)
            .ok_or_else(|| Error::CurveViolation("x³ + 7 is not a quadratic residue".to_string()))?;
        let other = mod_sub(&BigUint::zero(), &y, p);
        let (even, odd) = if y.bit(0) { (other, y) } else { (y, other) };

        Ok([
            Point::Affine { x: x.clone(), y: even },
            Point::Affine { x: x.clone(), y: odd },
        ])
    }

    /// 32-byte big-endian x coordinate.
    pub fn x_bytes(&self) -> Option<[u8; 32]> {
        self.x().map(to_be_bytes32)
    }
}

/// Point addition with the affine chord-and-tangent formulas.
///
/// `P + (-P)` and doubling a point with `y = 0` yield the identity.
pub fn point_add(a: &Point, b: &Point) -> Result<Point> {
    let (x1, y1, x2, y2) = match (a, b) {
        (Point::Infinity, _) => return Ok(b.clone()),
        (_, Point::Infinity) => return Ok(a.clone()),
        (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
    };
    let p = &CURVE.p;

    if x1 == x2 {
        if y1 != y2 {
            return Ok(Point::Infinity);
        }
        return point_double(a);
    }

    // slope = (y2 - y1) / (x2 - x1)
    let num = mod_sub(y2, y1, p);
    let den = mod_sub(x2, x1, p);
    let slope = num * mod_inverse(&den, p)? % p;

    Ok(finish(&slope, x1, y1, x2))
}

/// Point doubling.
pub fn point_double(a: &Point) -> Result<Point> {
    let (x, y) = match a {
        Point::Infinity => return Ok(Point::Infinity),
        Point::Affine { x, y } => (x, y),
    };
    if y.is_zero() {
        return Ok(Point::Infinity);
    }
    let p = &CURVE.p;

    // slope = 3x² / 2y
    let num = (x * x * 3u32) % p;
    let den = (y * 2u32) % p;
    let slope = num * mod_inverse(&den, p)? % p;

    Ok(finish(&slope, x, y, x))
}

fn finish(slope: &BigUint, x1: &BigUint, y1: &BigUint, x2: &BigUint) -> Point {
    let p = &CURVE.p;
    let s2 = slope * slope % p;
    let x3 = mod_sub(&mod_sub(&s2, x1, p), x2, p);
    let y3 = mod_sub(&(slope * mod_sub(x1, &x3, p) % p), y1, p);
    Point::Affine { x: x3, y: y3 }
}

/// Scalar multiplication `k·P` by double-and-add.
///
/// `k` is reduced modulo the group order first; a zero scalar or the identity
/// input gives the identity.
pub fn scalar_mul(k: &BigUint, point: &Point) -> Result<Point> {
    let k = k % &CURVE.n;
    if k.is_zero() || point.is_infinity() {
        return Ok(Point::Infinity);
    }

    let mut result = Point::Infinity;
    let mut addend = point.clone();

    for i in 0..k.bits() {
        if k.bit(i) {
            result = point_add(&result, &addend)?;
        }
        addend = point_double(&addend)?;
    }

    Ok(result)
}

/// `k·G`
pub fn mul_generator(k: &BigUint) -> Result<Point> {
    scalar_mul(k, &CURVE.g)
}

/// Left-pad a big-endian integer to 32 bytes.
///
/// Callers only pass values below 2^256.
pub fn to_be_bytes32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let take = bytes.len().min(32);
    out[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}
