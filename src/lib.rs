//! Independent verification of GPU grinder results.
//!
//! Every claim (a mask-mode private key, an R-value-ground signature, a
//! taproot output key, a ground transaction id) is re-derived from scratch
//! with exact secp256k1 and SHA-256 arithmetic on the host. A background
//! sampler watches GPU utilization while the grinder runs, and measured
//! throughput is compared against stored baselines.

pub mod curve;
pub mod error;
pub mod field;
pub mod point;
pub mod scalar;
pub mod outcome;
pub mod mask;
pub mod signature;
pub mod taproot;
pub mod txid;
pub mod report;
pub mod telemetry;
pub mod regression;
pub mod runner;
pub mod difficulty;
pub mod hardware;
pub mod stats;
pub mod display;

pub use curve::{CurveParams, CURVE};
pub use error::{Error, Result};
pub use field::{mod_inverse, mod_sqrt};
pub use point::{mul_generator, point_add, point_double, scalar_mul, Point};
pub use scalar::{parse_hex, parse_scalar, to_hex64};
pub use outcome::{Check, Mismatch, VerificationOutcome};

pub use mask::{verify_mask, MaskClaim};
pub use signature::{
    compute_ecdsa, low_s_normalize, verification_equation_holds, verify_ecdsa, verify_schnorr,
    EcdsaClaim, SchnorrClaim,
};
pub use taproot::{
    tagged_hash, taproot_tweak, tweak_from_x, verify_taproot, InternalKey, TaprootClaim, TweakResult,
};
pub use txid::{compute_txid, place_nonce, verify_txid, TxidClaim};
pub use report::{parse_throughput_mkeys, GrinderReport, ReportExpectation};

pub use telemetry::{GpuReading, NvidiaSmi, TelemetryError, TelemetrySource};
pub use telemetry::sampler::{
    SamplerConfig, UtilizationReport, UtilizationSample, UtilizationSampler, UtilizationStats,
};
pub use telemetry::thresholds::{check_utilization, GrindMode, UtilizationCheck, UtilizationTarget};

pub use regression::{
    baseline_key, evaluate, BaselineError, BaselineRecord, BaselineStore, Regression, RegressionVerdict,
};
pub use runner::{run_monitored, GrinderInvocation, MonitoredRun, RunExit};

pub use difficulty::{estimate_time, expected_attempts, format_difficulty, format_duration, prefix_bits};
pub use hardware::{display_hardware_info, get_core_count, get_cpu_info, host_label, host_snapshot, HostSnapshot};
pub use stats::{format_number, format_speed, IterationResult, IterationSummary};
pub use display::{create_progress_bar, display_outcome, outcome_line, utilization_line};
