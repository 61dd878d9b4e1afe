//! Extraction of claimed results from the grinder's free-text output.
//!
//! Pattern matching happens only here. Everything downstream works on typed
//! claims.

use num_bigint::BigUint;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::mask::MaskClaim;
use crate::outcome::VerificationOutcome;
use crate::scalar::parse_hex;
use crate::signature::{EcdsaClaim, SchnorrClaim};
use crate::taproot::{InternalKey, TaprootClaim};
use crate::txid::TxidClaim;

static PRIV_HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Priv \(HEX\):\s*0x([0-9A-Fa-f]+)").expect("valid regex"));
static PRIV_LEGACY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Private key \(d\):\s*([0-9A-Fa-f]+)").expect("valid regex"));
static SIG_NONCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Nonce \(k\):\s*([0-9A-Fa-f]+)").expect("valid regex"));
static SIG_R: Lazy<Regex> = Lazy::new(|| Regex::new(r"sig\.r:\s*([0-9A-Fa-f]+)").expect("valid regex"));
static SIG_S: Lazy<Regex> = Lazy::new(|| Regex::new(r"sig\.s:\s*([0-9A-Fa-f]+)").expect("valid regex"));
static TXID_NONCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Nonce:\s*0x([0-9A-Fa-f]+)").expect("valid regex"));
static TXID: Lazy<Regex> = Lazy::new(|| Regex::new(r"TXID:\s*([0-9A-Fa-f]+)").expect("valid regex"));
static MASK: Lazy<Regex> = Lazy::new(|| Regex::new(r"MASK:([0-9A-Fa-f]+)").expect("valid regex"));
static GPU_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[GPU\s+([\d.]+)\s+(M|G)key/s\]").expect("valid regex"));
static ESTIMATE_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@\s+([\d.]+)\s+(M|G)Keys/s").expect("valid regex"));

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

/// Fields found in one grinder report. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrinderReport {
    /// Private key, zero-padded to 64 hex digits
    pub privkey: Option<String>,
    /// Signature-mode nonce k
    pub sig_nonce: Option<String>,
    pub sig_r: Option<String>,
    pub sig_s: Option<String>,
    /// TXID-mode nonce
    pub txid_nonce: Option<String>,
    pub txid: Option<String>,
    /// pubkey.x as printed by mask mode
    pub mask_x: Option<String>,
    /// Last reported throughput, in Mkey/s
    pub throughput_mkeys: Option<f64>,
}

impl GrinderReport {
    pub fn parse(text: &str) -> Self {
        let privkey = capture(&PRIV_HEX, text)
            .or_else(|| capture(&PRIV_LEGACY, text))
            .map(|hex| format!("{:0>64}", hex));

        Self {
            privkey,
            sig_nonce: capture(&SIG_NONCE, text),
            sig_r: capture(&SIG_R, text),
            sig_s: capture(&SIG_S, text),
            txid_nonce: capture(&TXID_NONCE, text),
            txid: capture(&TXID, text),
            mask_x: capture(&MASK, text),
            throughput_mkeys: parse_throughput_mkeys(text),
        }
    }

    /// Whether the grinder reported a hit of any kind.
    pub fn found(&self) -> bool {
        self.privkey.is_some() || self.sig_r.is_some() || self.txid.is_some()
    }

    /// Verify the report against what the grinder was asked to find.
    ///
    /// A report missing a field the expectation needs is `Invalid`, not an
    /// error.
    pub fn verify(&self, expectation: &ReportExpectation) -> Result<VerificationOutcome> {
        match expectation {
            ReportExpectation::Mask { target, mask } => {
                let Some(privkey) = field(&self.privkey, "privkey")? else {
                    return Ok(missing("Priv (HEX)"));
                };
                let mut claim = MaskClaim::new(privkey, target.clone());
                claim.mask = mask.clone();
                claim.reported_x = self.mask_x.clone();
                claim.verify()
            }
            ReportExpectation::Ecdsa { z, privkey } => {
                let (Some(nonce), Some(r), Some(s)) = (
                    field(&self.sig_nonce, "nonce")?,
                    field(&self.sig_r, "sig.r")?,
                    field(&self.sig_s, "sig.s")?,
                ) else {
                    return Ok(missing("Nonce (k), sig.r or sig.s"));
                };
                EcdsaClaim {
                    nonce,
                    z: z.clone(),
                    privkey: privkey.clone(),
                    r,
                    s,
                }
                .verify()
            }
            ReportExpectation::Schnorr => {
                let (Some(nonce), Some(r)) = (
                    field(&self.sig_nonce, "nonce")?,
                    field(&self.sig_r, "sig.r")?,
                ) else {
                    return Ok(missing("Nonce (k) or sig.r"));
                };
                SchnorrClaim { nonce, r }.verify()
            }
            ReportExpectation::Taproot { target } => {
                let Some(privkey) = field(&self.privkey, "privkey")? else {
                    return Ok(missing("Priv (HEX)"));
                };
                TaprootClaim {
                    key: InternalKey::Private(privkey),
                    expected_output_x: target.clone(),
                    expected_tweak: None,
                }
                .verify()
            }
            ReportExpectation::Txid {
                template,
                offset,
                length,
                prefix,
            } => {
                let Some(nonce) = field(&self.txid_nonce, "txid nonce")? else {
                    return Ok(missing("Nonce"));
                };
                // the grinder defaults to the trailing bytes of the template
                let offset = offset.unwrap_or_else(|| template.len().saturating_sub(*length));
                let mut claim = TxidClaim::new(template.clone(), nonce, offset, *length, prefix.clone());
                claim.reported_txid = self.txid.clone();
                claim.verify()
            }
        }
    }
}

fn field(value: &Option<String>, name: &'static str) -> Result<Option<BigUint>> {
    value.as_deref().map(|hex| parse_hex(name, hex)).transpose()
}

fn missing(label: &str) -> VerificationOutcome {
    VerificationOutcome::Invalid(format!("report has no {}", label))
}

/// What the grinder was asked to find, supplied by the caller.
#[derive(Debug, Clone)]
pub enum ReportExpectation {
    Mask {
        target: String,
        mask: Option<String>,
    },
    Ecdsa {
        z: BigUint,
        privkey: BigUint,
    },
    Schnorr,
    Taproot {
        /// Expected Q.x prefix
        target: String,
    },
    Txid {
        template: Vec<u8>,
        /// `None` places the nonce in the last `length` bytes
        offset: Option<usize>,
        length: usize,
        prefix: String,
    },
}

/// Throughput in Mkey/s from a report.
///
/// The last `[GPU x Mkey/s]` status line wins. Without one, the header
/// estimate `@ x GKeys/s` is used.
pub fn parse_throughput_mkeys(text: &str) -> Option<f64> {
    let to_mkeys = |value: &str, unit: &str| -> Option<f64> {
        let value: f64 = value.parse().ok()?;
        Some(if unit.eq_ignore_ascii_case("G") { value * 1000.0 } else { value })
    };

    let running = GPU_RATE
        .captures_iter(text)
        .filter_map(|c| to_mkeys(&c[1], &c[2]))
        .last();
    running.or_else(|| {
        ESTIMATE_RATE
            .captures(text)
            .and_then(|c| to_mkeys(&c[1], &c[2]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::outcome::Check;

    const MASK_REPORT: &str = "\
VanityMask v1.19
Estimate:   12.3 seconds @ 26.1 GKeys/s
[GPU 25544.10 Mkey/s][Total 2^34.1][Prob 40.2%]
[GPU 26144.42 Mkey/s][Total 2^35.0][Prob 71.0%]

MASK:79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798
Priv (HEX): 0x1
";

    #[test]
    fn test_parse_mask_report() {
        let report = GrinderReport::parse(MASK_REPORT);
        assert_eq!(
            report.privkey.as_deref(),
            Some("0000000000000000000000000000000000000000000000000000000000000001")
        );
        assert!(report.mask_x.as_deref().unwrap().starts_with("79BE667E"));
        assert_eq!(report.throughput_mkeys, Some(26144.42));
        assert!(report.found());
    }

    #[test]
    fn test_verify_mask_report() {
        let report = GrinderReport::parse(MASK_REPORT);
        let outcome = report
            .verify(&ReportExpectation::Mask {
                target: "79be667e".into(),
                mask: None,
            })
            .unwrap();
        match outcome {
            VerificationOutcome::Confirmed { checks, .. } => {
                assert_eq!(checks, vec![Check::ReportedPubkey, Check::MaskPrefix])
            }
            other => panic!("expected confirmation, got {other}"),
        }
    }

    #[test]
    fn test_legacy_private_key_line() {
        let report = GrinderReport::parse("Private key (d): ABCDEF\n");
        assert_eq!(report.privkey.unwrap(), format!("{:0>64}", "ABCDEF"));
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        let report = GrinderReport::parse("nothing found\n");
        assert!(!report.found());
        let outcome = report.verify(&ReportExpectation::Schnorr).unwrap();
        assert!(matches!(outcome, VerificationOutcome::Invalid(_)));
    }

    #[test]
    fn test_signature_report() {
        let text = "\
Nonce (k): 0000000000000000000000000000000000000000000000000000000000000002
sig.r: C6047F9441ED7D6D3045406E95C07CD85C778E4B8CEF3CA7ABAC09B95C709EE5
sig.s: 1C7CBEB3DC863DC563585A42AE98BA0B26929DC386A1A63DFD861CDBAB53C19E
";
        let report = GrinderReport::parse(text);
        let z = parse_hex("z", "0102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F20").unwrap();
        let outcome = report
            .verify(&ReportExpectation::Ecdsa {
                z,
                privkey: BigUint::from(1u32),
            })
            .unwrap();
        assert!(outcome.is_confirmed(), "{outcome}");
        assert!(report.verify(&ReportExpectation::Schnorr).unwrap().is_confirmed());
    }

    #[test]
    fn test_txid_report_uses_trailing_nonce_bytes() {
        let template = hex::decode(
            "0100000001000000000000000000000000000000000000000000000000000000000000000000000000ffffffff0100000000000000000000000000",
        )
        .unwrap();
        let text = "Nonce: 0xDEADBEEF\nTXID: 0674dc986f0139456bae426807ec33972b43da71c5b17d28b603b8a138b886bc\n";
        let report = GrinderReport::parse(text);
        assert_eq!(report.txid_nonce.as_deref(), Some("DEADBEEF"));
        // "Nonce (k):" must not be confused with the TXID nonce
        assert_eq!(report.sig_nonce, None);

        let outcome = report
            .verify(&ReportExpectation::Txid {
                template,
                offset: None,
                length: 4,
                prefix: "0674".into(),
            })
            .unwrap();
        assert!(outcome.is_confirmed(), "{outcome}");
    }

    #[test]
    fn test_txid_report_with_preview() {
        let template = hex::decode(
            "0100000001000000000000000000000000000000000000000000000000000000000000000000000000ffffffff0100000000000000000000000000",
        )
        .unwrap();
        let text = "Nonce:      0xdeadbeef (3735928559)\nTXID:       0674dc986f0139456bae426807ec33972b43da71...\n";
        let report = GrinderReport::parse(text);
        assert_eq!(
            report.txid.as_deref(),
            Some("0674dc986f0139456bae426807ec33972b43da71")
        );

        let expectation = ReportExpectation::Txid {
            template,
            offset: None,
            length: 4,
            prefix: "0674".into(),
        };
        let outcome = report.verify(&expectation).unwrap();
        assert!(outcome.is_confirmed(), "{outcome}");

        let wrong = GrinderReport::parse(
            "Nonce:      0xdeadbeef (3735928559)\nTXID:       0674dd986f0139456bae426807ec33972b43da71...\n",
        );
        assert_eq!(
            wrong.verify(&expectation).unwrap().failed_check(),
            Some(Check::ReportedTxid)
        );
    }

    #[test]
    fn test_taproot_report() {
        let report = GrinderReport::parse(
            "Priv (HEX): 0x9AAE19AEB99743CB99A25B3E73062089F6067F949DE5034EB2790978F998DBD9\n",
        );
        let outcome = report
            .verify(&ReportExpectation::Taproot {
                target: "651C2ABF".into(),
            })
            .unwrap();
        assert!(outcome.is_confirmed());
    }

    #[test]
    fn test_throughput_estimate_fallback() {
        assert_eq!(
            parse_throughput_mkeys("Estimate:   3.2 seconds @ 1.5 GKeys/s\n"),
            Some(1500.0)
        );
        assert_eq!(parse_throughput_mkeys("[GPU 2.50 Gkey/s]"), Some(2500.0));
        assert_eq!(parse_throughput_mkeys("no rate here"), None);
    }

    #[test]
    fn test_malformed_report_value() {
        let report = GrinderReport {
            sig_nonce: Some("xyz".into()),
            sig_r: Some("01".into()),
            ..Default::default()
        };
        assert!(matches!(
            report.verify(&ReportExpectation::Schnorr),
            Err(Error::MalformedInput { field: "nonce", .. })
        ));
    }
}
