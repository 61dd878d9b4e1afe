//! Results of re-deriving a claim: which checks ran and where one failed.

use std::fmt;

/// The individual checks a verifier can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// pubkey.x hex prefix against the target
    MaskPrefix,
    /// pubkey.x & mask against target & mask
    MaskBits,
    /// `MASK:` value printed by the grinder against the derived pubkey.x
    ReportedPubkey,
    /// R.x mod n against the claimed r
    EcdsaR,
    /// recomputed, low-s normalized s against the claimed s
    EcdsaS,
    /// claimed s <= n/2
    LowS,
    /// (z/s)·G + (r/s)·P has x ≡ r
    EcdsaEquation,
    /// Schnorr R.x mod n against the claimed r
    SchnorrR,
    /// recomputed TapTweak scalar against the claimed tweak
    TaprootTweak,
    /// tweaked output key Q.x against the expected value
    TaprootOutputKey,
    /// transaction id prefix against the target
    TxidPrefix,
    /// `TXID:` value printed by the grinder against the recomputed id
    ReportedTxid,
}

impl Check {
    pub fn label(&self) -> &'static str {
        match self {
            Check::MaskPrefix => "mask prefix",
            Check::MaskBits => "mask bits",
            Check::ReportedPubkey => "reported pubkey.x",
            Check::EcdsaR => "ecdsa r",
            Check::EcdsaS => "ecdsa s",
            Check::LowS => "low-s",
            Check::EcdsaEquation => "ecdsa verification equation",
            Check::SchnorrR => "schnorr R.x",
            Check::TaprootTweak => "taproot tweak",
            Check::TaprootOutputKey => "taproot output key",
            Check::TxidPrefix => "txid prefix",
            Check::ReportedTxid => "reported txid",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Diagnostics for a failed check: what was recomputed and what was claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub check: Check,
    pub computed: String,
    pub claimed: String,
}

/// Result of re-deriving a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Every check held. The checks are listed in the order they ran.
    Confirmed { checks: Vec<Check>, detail: String },
    /// The claim is well-formed but wrong.
    Mismatch(Mismatch),
    /// The claim cannot be checked (e.g. a required report field is missing).
    Invalid(String),
}

impl VerificationOutcome {
    pub fn confirmed(checks: Vec<Check>, detail: impl Into<String>) -> Self {
        VerificationOutcome::Confirmed {
            checks,
            detail: detail.into(),
        }
    }

    pub fn mismatch(check: Check, computed: impl Into<String>, claimed: impl Into<String>) -> Self {
        VerificationOutcome::Mismatch(Mismatch {
            check,
            computed: computed.into(),
            claimed: claimed.into(),
        })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, VerificationOutcome::Confirmed { .. })
    }

    /// The failed check, if this is a mismatch.
    pub fn failed_check(&self) -> Option<Check> {
        match self {
            VerificationOutcome::Mismatch(m) => Some(m.check),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Confirmed { detail, .. } => write!(f, "OK: {}", detail),
            VerificationOutcome::Mismatch(m) => write!(
                f,
                "MISMATCH: {} computed {} claimed {}",
                m.check, m.computed, m.claimed
            ),
            VerificationOutcome::Invalid(reason) => write!(f, "INVALID: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lines() {
        let ok = VerificationOutcome::confirmed(vec![Check::MaskPrefix], "pubkey.x starts with 79be");
        assert_eq!(ok.to_string(), "OK: pubkey.x starts with 79be");
        assert!(ok.is_confirmed());

        let bad = VerificationOutcome::mismatch(Check::EcdsaS, "aa", "bb");
        assert_eq!(bad.to_string(), "MISMATCH: ecdsa s computed aa claimed bb");
        assert_eq!(bad.failed_check(), Some(Check::EcdsaS));

        let invalid = VerificationOutcome::Invalid("report has no sig.r".into());
        assert_eq!(invalid.to_string(), "INVALID: report has no sig.r");
        assert!(!invalid.is_confirmed());
    }
}
