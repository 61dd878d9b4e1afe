//! TXID-mode claims: a nonce written into a raw transaction template so that
//! the transaction id starts with a target prefix.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::outcome::{Check, VerificationOutcome};
use crate::scalar::normalize_prefix;

/// A TXID-mode result.
#[derive(Debug, Clone)]
pub struct TxidClaim {
    /// Raw transaction bytes before the nonce is written
    pub template: Vec<u8>,
    pub nonce: BigUint,
    /// Byte offset of the nonce field
    pub offset: usize,
    /// Width of the nonce field in bytes
    pub length: usize,
    /// Hex prefix the id must start with
    pub expected_prefix: String,
    /// The `TXID:` value printed by the grinder, if any
    pub reported_txid: Option<String>,
}

impl TxidClaim {
    pub fn new(
        template: Vec<u8>,
        nonce: BigUint,
        offset: usize,
        length: usize,
        expected_prefix: impl Into<String>,
    ) -> Self {
        Self {
            template,
            nonce,
            offset,
            length,
            expected_prefix: expected_prefix.into(),
            reported_txid: None,
        }
    }

    pub fn with_reported_txid(mut self, txid: impl Into<String>) -> Self {
        self.reported_txid = Some(txid.into());
        self
    }

    pub fn verify(&self) -> Result<VerificationOutcome> {
        verify_txid(self)
    }
}

/// Write `nonce` little-endian into `template[offset..offset + length]`.
///
/// Bytes of the nonce beyond `length` are dropped; all other template bytes
/// are left untouched.
pub fn place_nonce(template: &[u8], nonce: &BigUint, offset: usize, length: usize) -> Result<Vec<u8>> {
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= template.len())
        .ok_or(Error::RangeError {
            offset,
            length,
            buffer: template.len(),
        })?;

    let le = nonce.to_bytes_le();
    let mut tx = template.to_vec();
    for (i, byte) in tx[offset..end].iter_mut().enumerate() {
        *byte = le.get(i).copied().unwrap_or(0);
    }
    Ok(tx)
}

/// Transaction id in display order: `reverse(SHA256(SHA256(tx)))` as hex.
pub fn compute_txid(tx: &[u8]) -> String {
    let first = Sha256::digest(tx);
    let mut second: [u8; 32] = Sha256::digest(first).into();
    second.reverse();
    hex::encode(second)
}

/// Recompute the id of the claimed transaction and check its prefix.
pub fn verify_txid(claim: &TxidClaim) -> Result<VerificationOutcome> {
    let expected = normalize_prefix("expected prefix", &claim.expected_prefix)?;
    let tx = place_nonce(&claim.template, &claim.nonce, claim.offset, claim.length)?;
    let txid = compute_txid(&tx);

    let mut checks = Vec::with_capacity(2);
    if let Some(reported) = &claim.reported_txid {
        // grinders usually print a truncated preview of the id
        let reported = normalize_prefix("reported txid", reported)?;
        if reported.len() > 64 {
            return Err(Error::malformed("reported txid", "longer than 64 hex digits"));
        }
        if !txid.starts_with(&reported) {
            return Ok(VerificationOutcome::mismatch(
                Check::ReportedTxid,
                &txid[..reported.len()],
                reported,
            ));
        }
        checks.push(Check::ReportedTxid);
    }

    if !txid.starts_with(&expected) {
        return Ok(VerificationOutcome::mismatch(Check::TxidPrefix, txid, expected));
    }
    checks.push(Check::TxidPrefix);

    Ok(VerificationOutcome::confirmed(
        checks,
        format!("TXID = {}... starts with {}", &txid[..16], expected),
    ))
}
