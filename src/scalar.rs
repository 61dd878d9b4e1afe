//! Parsing and range checks for caller-supplied integers.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::curve::CURVE;
use crate::error::{Error, Result};

/// Parse a hex string (optional `0x` prefix, any case) into an integer.
pub fn parse_hex(field: &'static str, input: &str) -> Result<BigUint> {
    let digits = strip_hex_prefix(input.trim());
    if digits.is_empty() {
        return Err(Error::malformed(field, "empty hex string"));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::malformed(field, format!("invalid hex character '{}'", bad)));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::malformed(field, "unparseable hex"))
}

/// Parse a hex scalar and enforce `1 <= k < n`.
pub fn parse_scalar(field: &'static str, input: &str) -> Result<BigUint> {
    let k = parse_hex(field, input)?;
    check_scalar(field, &k)?;
    Ok(k)
}

/// Enforce `1 <= k < n`.
pub fn check_scalar(field: &'static str, k: &BigUint) -> Result<()> {
    if k.is_zero() || k >= &CURVE.n {
        return Err(Error::OutOfRange { field });
    }
    Ok(())
}

/// Strip a leading `0x`/`0X`.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Lowercase 64-digit hex rendering of a 256-bit value.
pub fn to_hex64(value: &BigUint) -> String {
    format!("{:064x}", value)
}

/// Validate a hex prefix pattern and return it lowercased.
pub fn normalize_prefix(field: &'static str, pattern: &str) -> Result<String> {
    let digits = strip_hex_prefix(pattern.trim());
    if digits.is_empty() {
        return Err(Error::malformed(field, "pattern cannot be empty"));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::malformed(
            field,
            format!("invalid character '{}', use only 0-9 a-f A-F", bad),
        ));
    }
    Ok(digits.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_accepts_prefix_and_case() {
        assert_eq!(parse_hex("k", "0xFF").unwrap(), BigUint::from(255u32));
        assert_eq!(parse_hex("k", "ff").unwrap(), BigUint::from(255u32));
        assert_eq!(parse_hex("k", " 0X0a ").unwrap(), BigUint::from(10u32));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(matches!(
            parse_hex("nonce", "12zz"),
            Err(Error::MalformedInput { field: "nonce", .. })
        ));
        assert!(matches!(
            parse_hex("nonce", "0x"),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_scalar_range() {
        assert_eq!(
            parse_scalar("privkey", "0"),
            Err(Error::OutOfRange { field: "privkey" })
        );
        let n_hex = to_hex64(&CURVE.n);
        assert_eq!(
            parse_scalar("privkey", &n_hex),
            Err(Error::OutOfRange { field: "privkey" })
        );
        let n_minus_one = to_hex64(&(&CURVE.n - 1u32));
        assert!(parse_scalar("privkey", &n_minus_one).is_ok());
        assert!(parse_scalar("privkey", "1").is_ok());
    }

    #[test]
    fn test_to_hex64_pads() {
        let s = to_hex64(&BigUint::from(1u32));
        assert_eq!(s.len(), 64);
        assert!(s.ends_with("01"));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("target", "79BE").unwrap(), "79be");
        assert!(normalize_prefix("target", "").is_err());
        assert!(normalize_prefix("target", "xyz").is_err());
    }
}
