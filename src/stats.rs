use std::fmt;

/// One benchmark iteration of the grinder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationResult {
    pub throughput_mkeys: f64,
    pub time_sec: f64,
    /// Whether the grinder reported a hit
    pub found: bool,
}

/// Aggregate over a set of iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationSummary {
    pub iterations: usize,
    pub avg_throughput: f64,
    pub min_throughput: f64,
    pub max_throughput: f64,
    pub avg_time_sec: f64,
    /// Fraction of iterations with a hit, 0.0 to 1.0
    pub success_rate: f64,
}

impl IterationSummary {
    /// Summarize `results`. Throughput figures only count iterations that
    /// reported a rate.
    pub fn from_results(results: &[IterationResult]) -> Self {
        let iterations = results.len();
        if iterations == 0 {
            return Self {
                iterations,
                avg_throughput: 0.0,
                min_throughput: 0.0,
                max_throughput: 0.0,
                avg_time_sec: 0.0,
                success_rate: 0.0,
            };
        }

        let rates: Vec<f64> = results
            .iter()
            .map(|r| r.throughput_mkeys)
            .filter(|t| *t > 0.0)
            .collect();
        let (avg_throughput, min_throughput, max_throughput) = if rates.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                rates.iter().sum::<f64>() / rates.len() as f64,
                rates.iter().copied().fold(f64::INFINITY, f64::min),
                rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let found = results.iter().filter(|r| r.found).count();
        Self {
            iterations,
            avg_throughput,
            min_throughput,
            max_throughput,
            avg_time_sec: results.iter().map(|r| r.time_sec).sum::<f64>() / iterations as f64,
            success_rate: found as f64 / iterations as f64,
        }
    }
}

impl fmt::Display for IterationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} avg ({}-{}), avg time {:.3}s, success rate {:.0}%",
            format_speed(self.avg_throughput),
            format_speed(self.min_throughput),
            format_speed(self.max_throughput),
            self.avg_time_sec,
            self.success_rate * 100.0
        )
    }
}

/// Format a number with comma separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a rate given in Mkey/s
pub fn format_speed(mkeys: f64) -> String {
    if mkeys >= 1_000.0 {
        format!("{:.2} Gkey/s", mkeys / 1_000.0)
    } else {
        format!("{:.2} Mkey/s", mkeys)
    }
}
