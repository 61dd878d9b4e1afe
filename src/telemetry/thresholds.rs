//! Expected GPU utilization per grinding mode.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Grinding modes with a known utilization profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrindMode {
    Mask,
    SigEcdsa,
    SigSchnorr,
    Taproot,
    Txid,
    Vanity,
}

/// Minimum and target average utilization for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationTarget {
    pub minimum: u8,
    pub target: u8,
    pub description: &'static str,
}

const EC_BOUND: UtilizationTarget = UtilizationTarget {
    minimum: 85,
    target: 95,
    description: "EC operations (compute-bound)",
};

impl GrindMode {
    pub const ALL: [GrindMode; 6] = [
        GrindMode::Mask,
        GrindMode::SigEcdsa,
        GrindMode::SigSchnorr,
        GrindMode::Taproot,
        GrindMode::Txid,
        GrindMode::Vanity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GrindMode::Mask => "mask",
            GrindMode::SigEcdsa => "sig_ecdsa",
            GrindMode::SigSchnorr => "sig_schnorr",
            GrindMode::Taproot => "taproot",
            GrindMode::Txid => "txid",
            GrindMode::Vanity => "vanity",
        }
    }

    pub const fn utilization_target(&self) -> UtilizationTarget {
        match self {
            GrindMode::Mask | GrindMode::SigEcdsa | GrindMode::SigSchnorr | GrindMode::Taproot => EC_BOUND,
            GrindMode::Txid => UtilizationTarget {
                minimum: 50,
                target: 62,
                description: "SHA256 operations (memory-bound)",
            },
            GrindMode::Vanity => UtilizationTarget {
                minimum: 85,
                target: 95,
                description: "EC + hash operations",
            },
        }
    }

    /// Parse a mode name, falling back to [`GrindMode::Mask`] for unknown names.
    pub fn parse_or_mask(name: &str) -> GrindMode {
        name.parse().unwrap_or_else(|_| {
            warn!("unknown mode '{}', using mask utilization targets", name);
            GrindMode::Mask
        })
    }
}

impl fmt::Display for GrindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GrindMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "mask" => Ok(GrindMode::Mask),
            "sig" | "sig_ecdsa" | "ecdsa" => Ok(GrindMode::SigEcdsa),
            "sig_schnorr" | "schnorr" => Ok(GrindMode::SigSchnorr),
            "taproot" => Ok(GrindMode::Taproot),
            "txid" => Ok(GrindMode::Txid),
            "vanity" => Ok(GrindMode::Vanity),
            other => Err(format!("unknown grinding mode '{}'", other)),
        }
    }
}

/// Outcome of comparing a mean utilization against a mode's target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationCheck {
    pub mode: GrindMode,
    pub mean: f64,
    pub target: UtilizationTarget,
    pub meets_min: bool,
    pub meets_target: bool,
}

pub fn check_utilization(mode: GrindMode, mean: f64) -> UtilizationCheck {
    let target = mode.utilization_target();
    UtilizationCheck {
        mode,
        mean,
        target,
        meets_min: mean >= f64::from(target.minimum),
        meets_target: mean >= f64::from(target.target),
    }
}

impl fmt::Display for UtilizationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.meets_target {
            "OK"
        } else if self.meets_min {
            "BELOW TARGET"
        } else {
            "LOW"
        };
        write!(
            f,
            "GPU util {:.1}% (min {}%, target {}%, {}) [{}]",
            self.mean, self.target.minimum, self.target.target, self.target.description, status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("sig".parse::<GrindMode>().unwrap(), GrindMode::SigEcdsa);
        assert_eq!("sig-schnorr".parse::<GrindMode>().unwrap(), GrindMode::SigSchnorr);
        assert_eq!("TXID".parse::<GrindMode>().unwrap(), GrindMode::Txid);
        assert!("bogus".parse::<GrindMode>().is_err());
    }

    #[test]
    fn test_unknown_falls_back_to_mask() {
        assert_eq!(GrindMode::parse_or_mask("bogus"), GrindMode::Mask);
        assert_eq!(GrindMode::parse_or_mask("txid"), GrindMode::Txid);
    }

    #[test]
    fn test_targets() {
        assert_eq!(GrindMode::Txid.utilization_target().minimum, 50);
        assert_eq!(GrindMode::Txid.utilization_target().target, 62);
        for mode in [GrindMode::Mask, GrindMode::SigEcdsa, GrindMode::SigSchnorr, GrindMode::Taproot] {
            assert_eq!(mode.utilization_target(), EC_BOUND);
        }
    }

    #[test]
    fn test_name_round_trips() {
        for mode in GrindMode::ALL {
            assert_eq!(mode.name().parse::<GrindMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_check_utilization_boundaries() {
        let check = check_utilization(GrindMode::Mask, 85.0);
        assert!(check.meets_min);
        assert!(!check.meets_target);

        let check = check_utilization(GrindMode::Txid, 62.0);
        assert!(check.meets_target);

        let check = check_utilization(GrindMode::Mask, 84.9);
        assert!(!check.meets_min);
        assert!(check.to_string().ends_with("[LOW]"));
    }
}
