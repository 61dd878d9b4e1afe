//! Throughput regression checks against stored baselines.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A drop of more than this many percent is critical.
pub const CRITICAL_DROP_PCT: f64 = 30.0;
/// A drop of more than this many percent is a warning.
pub const WARNING_DROP_PCT: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegressionVerdict {
    Pass,
    Warning,
    Critical,
}

impl RegressionVerdict {
    pub fn is_pass(&self) -> bool {
        *self == RegressionVerdict::Pass
    }
}

impl fmt::Display for RegressionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegressionVerdict::Pass => "PASS",
            RegressionVerdict::Warning => "WARNING",
            RegressionVerdict::Critical => "CRITICAL",
        })
    }
}

/// Measured throughput compared against a baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub verdict: RegressionVerdict,
    pub measured: f64,
    pub baseline: Option<f64>,
    /// Signed percentage change; `None` when there was nothing to compare
    pub diff_pct: Option<f64>,
}

/// Classify `measured` against an optional `baseline`.
///
/// The bounds are exclusive: exactly -30% is a warning and exactly -15% is a
/// pass. The difference is rounded to six decimals so that `0.7 * b` lands
/// on the boundary for any `b`.
pub fn evaluate(measured: f64, baseline: Option<f64>) -> Regression {
    let diff_pct = baseline
        .filter(|b| *b > 0.0 && measured > 0.0)
        .map(|b| round_pct((measured - b) * 100.0 / b));

    let verdict = match diff_pct {
        Some(d) if d < -CRITICAL_DROP_PCT => RegressionVerdict::Critical,
        Some(d) if d < -WARNING_DROP_PCT => RegressionVerdict::Warning,
        _ => RegressionVerdict::Pass,
    };

    Regression {
        verdict,
        measured,
        baseline,
        diff_pct,
    }
}

fn round_pct(pct: f64) -> f64 {
    (pct * 1e6).round() / 1e6
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.baseline, self.diff_pct) {
            (Some(b), Some(d)) => write!(
                f,
                "{:.1} Mkey/s vs baseline {:.1} Mkey/s ({:+.1}%) [{}]",
                self.measured, b, d, self.verdict
            ),
            _ => write!(f, "{:.1} Mkey/s, no baseline [{}]", self.measured, self.verdict),
        }
    }
}

/// Key for a mode and difficulty, e.g. `mask_32bit`.
pub fn baseline_key(mode: &str, bits: u32) -> String {
    format!("{}_{}bit", mode, bits)
}

/// One stored baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    #[serde(default)]
    pub throughput_mkeys: f64,
    /// Older files stored Gkey/s instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_gkeys: Option<f64>,
    #[serde(default)]
    pub time_sec: f64,
    #[serde(default)]
    pub gpu: String,
    /// RFC 3339
    pub timestamp: String,
}

impl BaselineRecord {
    pub fn new(throughput_mkeys: f64, time_sec: f64, gpu: impl Into<String>) -> Self {
        Self {
            throughput_mkeys,
            throughput_gkeys: None,
            time_sec,
            gpu: gpu.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Throughput in Mkey/s, converting a Gkey/s-only record.
    pub fn throughput(&self) -> f64 {
        if self.throughput_mkeys > 0.0 {
            self.throughput_mkeys
        } else {
            self.throughput_gkeys.unwrap_or(0.0) * 1000.0
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("baseline file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("baseline file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON file of baselines keyed by [`baseline_key`].
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    path: PathBuf,
    records: BTreeMap<String, BaselineRecord>,
}

impl BaselineStore {
    /// Load the store. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BaselineError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| BaselineError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no baseline file at {}", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(BaselineError::Io { path, source }),
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, mode: &str, bits: u32) -> Option<&BaselineRecord> {
        self.records.get(&baseline_key(mode, bits))
    }

    pub fn insert(&mut self, mode: &str, bits: u32, record: BaselineRecord) {
        self.records.insert(baseline_key(mode, bits), record);
    }

    /// Compare `measured` against the stored baseline for `mode`/`bits`.
    pub fn evaluate(&self, mode: &str, bits: u32, measured: f64) -> Regression {
        evaluate(measured, self.get(mode, bits).map(BaselineRecord::throughput))
    }

    pub fn save(&self) -> Result<(), BaselineError> {
        let json = serde_json::to_string_pretty(&self.records).map_err(|source| BaselineError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| BaselineError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(records = self.records.len(), "baselines saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_is_pass() {
        let r = evaluate(1000.0, Some(1000.0));
        assert_eq!(r.verdict, RegressionVerdict::Pass);
        assert_eq!(r.diff_pct, Some(0.0));
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(evaluate(700.0, Some(1000.0)).diff_pct, Some(-30.0));
        assert_eq!(evaluate(700.0, Some(1000.0)).verdict, RegressionVerdict::Warning);
        assert_eq!(evaluate(690.0, Some(1000.0)).verdict, RegressionVerdict::Critical);
        assert_eq!(evaluate(850.0, Some(1000.0)).verdict, RegressionVerdict::Pass);
        assert_eq!(evaluate(849.0, Some(1000.0)).verdict, RegressionVerdict::Warning);
    }

    #[test]
    fn test_boundaries_at_uneven_baselines() {
        for b in [26144.42, 999.0, 7.0, 3.3, 123456.789] {
            let at_critical = evaluate(0.70 * b, Some(b));
            assert_eq!(at_critical.diff_pct, Some(-30.0), "baseline {}", b);
            assert_eq!(at_critical.verdict, RegressionVerdict::Warning, "baseline {}", b);

            let at_warning = evaluate(0.85 * b, Some(b));
            assert_eq!(at_warning.diff_pct, Some(-15.0), "baseline {}", b);
            assert_eq!(at_warning.verdict, RegressionVerdict::Pass, "baseline {}", b);

            assert_eq!(evaluate(0.69 * b, Some(b)).verdict, RegressionVerdict::Critical);
            assert_eq!(evaluate(0.84 * b, Some(b)).verdict, RegressionVerdict::Warning);
        }
    }

    #[test]
    fn test_improvement_is_pass() {
        let r = evaluate(1500.0, Some(1000.0));
        assert_eq!(r.verdict, RegressionVerdict::Pass);
        assert_eq!(r.diff_pct, Some(50.0));
    }

    #[test]
    fn test_no_baseline() {
        let r = evaluate(123.0, None);
        assert_eq!(r.verdict, RegressionVerdict::Pass);
        assert_eq!(r.diff_pct, None);
        assert!(r.to_string().contains("no baseline"));
    }

    #[test]
    fn test_non_positive_values() {
        assert_eq!(evaluate(0.0, Some(1000.0)).diff_pct, None);
        assert_eq!(evaluate(0.0, Some(1000.0)).verdict, RegressionVerdict::Pass);
        assert_eq!(evaluate(500.0, Some(0.0)).diff_pct, None);
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baselines.json");

        let mut store = BaselineStore::load(&path).unwrap();
        assert!(store.is_empty());
        store.insert("mask", 32, BaselineRecord::new(26144.4, 0.2, "RTX 4090"));
        store.save().unwrap();

        let store = BaselineStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        let record = store.get("mask", 32).unwrap();
        assert_eq!(record.gpu, "RTX 4090");
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
        assert!(store.get("mask", 40).is_none());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"mask_32bit\""));
    }

    #[test]
    fn test_legacy_gkeys_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        fs::write(
            &path,
            r#"{"txid_24bit": {"throughput_gkeys": 2.0, "time_sec": 1.5, "gpu": "RTX 4090", "timestamp": "2025-01-01T00:00:00"}}"#,
        )
        .unwrap();

        let store = BaselineStore::load(&path).unwrap();
        assert_eq!(store.get("txid", 24).unwrap().throughput(), 2000.0);
        assert_eq!(store.evaluate("txid", 24, 1300.0).verdict, RegressionVerdict::Critical);
        assert_eq!(store.evaluate("txid", 16, 1300.0).verdict, RegressionVerdict::Pass);
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(BaselineStore::load(&path), Err(BaselineError::Json { .. })));
    }
}
