use indicatif::{ProgressBar, ProgressStyle};

use crate::difficulty::format_duration;
use crate::outcome::VerificationOutcome;
use crate::regression::Regression;
use crate::stats::IterationSummary;
use crate::telemetry::sampler::UtilizationReport;
use crate::telemetry::thresholds::UtilizationCheck;

/// Create a spinner for a long-running step
pub fn create_progress_bar(desc: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(desc.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// One line per verified claim, prefixed with a label
pub fn outcome_line(label: &str, outcome: &VerificationOutcome) -> String {
    let mark = if outcome.is_confirmed() { "✓" } else { "✗" };
    format!("{} [{}] {}", mark, label, outcome)
}

pub fn display_outcome(label: &str, outcome: &VerificationOutcome) {
    println!("{}", outcome_line(label, outcome));
}

/// Human-readable utilization summary
pub fn utilization_line(report: &UtilizationReport) -> String {
    match report {
        UtilizationReport::Stats(stats) => {
            let mut line = format!(
                "GPU util: {:.1}% avg ({}-{}%), {} samples over {}",
                stats.mean,
                stats.min,
                stats.max,
                stats.count,
                format_duration(stats.duration)
            );
            if let Some(t) = stats.max_temperature {
                line.push_str(&format!(", max {:.0}°C", t));
            }
            if let Some(p) = stats.avg_power_draw {
                line.push_str(&format!(", {:.0} W avg", p));
            }
            if let Some(m) = stats.max_memory_used {
                line.push_str(&format!(", VRAM {:.0} MB", m));
            }
            line
        }
        UtilizationReport::NoData { error, duration } => format!(
            "GPU util: no data after {} ({})",
            format_duration(*duration),
            error.as_deref().unwrap_or("no samples")
        ),
    }
}

/// Benchmark block for one mode/difficulty
pub fn display_benchmark(
    key: &str,
    summary: &IterationSummary,
    regression: &Regression,
    utilization: Option<&UtilizationCheck>,
) {
    println!("\n{}:", key);
    println!("  Summary:   {}", summary);
    if let Some(check) = utilization {
        println!("  {}", check);
    }
    println!("  Baseline:  {}", regression);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Check;
    use crate::telemetry::sampler::UtilizationStats;
    use crate::telemetry::GpuReading;
    use std::time::Duration;

    #[test]
    fn test_outcome_line() {
        let ok = VerificationOutcome::confirmed(vec![Check::TxidPrefix], "TXID starts with 00");
        assert_eq!(outcome_line("txid", &ok), "✓ [txid] OK: TXID starts with 00");

        let bad = VerificationOutcome::mismatch(Check::SchnorrR, "01", "02");
        assert!(outcome_line("sig", &bad).starts_with("✗ [sig] MISMATCH"));
    }

    #[test]
    fn test_no_data_line() {
        let report = UtilizationReport::NoData {
            error: Some("nvidia-smi not found".into()),
            duration: Duration::from_secs(3),
        };
        assert_eq!(
            utilization_line(&report),
            "GPU util: no data after 3 seconds (nvidia-smi not found)"
        );
    }

    #[test]
    fn test_stats_line() {
        let samples = [90u8, 94]
            .iter()
            .map(|u| crate::telemetry::sampler::UtilizationSample {
                timestamp: chrono::Utc::now(),
                reading: GpuReading::utilization_only(*u),
            })
            .collect();
        let stats = UtilizationStats::from_samples(samples, Duration::from_secs(2), None).unwrap();
        assert_eq!(
            utilization_line(&UtilizationReport::Stats(stats)),
            "GPU util: 92.0% avg (90-94%), 2 samples over 2 seconds"
        );
    }
}
