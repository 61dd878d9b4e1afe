use std::time::Duration;

/// Bits constrained by a hex prefix (4 per digit)
pub fn prefix_bits(prefix: &str) -> u32 {
    (prefix.len() as u32).saturating_mul(4)
}

/// Expected attempts to match `bits` constrained bits: 2^bits
pub fn expected_attempts(bits: u32) -> f64 {
    2f64.powi(bits as i32)
}

/// Estimate time to a hit at `mkeys_per_sec`; `None` without a positive rate
pub fn estimate_time(bits: u32, mkeys_per_sec: f64) -> Option<Duration> {
    if mkeys_per_sec <= 0.0 || !mkeys_per_sec.is_finite() {
        return None;
    }
    let secs = expected_attempts(bits) / (mkeys_per_sec * 1_000_000.0);
    Duration::try_from_secs_f64(secs).ok()
}

/// Format an attempt count as "38.07B", "195.11K", etc.
pub fn format_difficulty(n: f64) -> String {
    if n >= 1e15 {
        format!("{:.2}Q", n / 1e15)
    } else if n >= 1e12 {
        format!("{:.2}T", n / 1e12)
    } else if n >= 1e9 {
        format!("{:.2}B", n / 1e9)
    } else if n >= 1e6 {
        format!("{:.2}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.2}K", n / 1e3)
    } else {
        format!("{:.0}", n)
    }
}

/// Format duration as "5.3 hours", "2.5 minutes", "45 seconds", etc.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();

    if secs >= 86400.0 {
        format!("{:.1} days", secs / 86400.0)
    } else if secs >= 3600.0 {
        format!("{:.1} hours", secs / 3600.0)
    } else if secs >= 60.0 {
        format!("{:.1} minutes", secs / 60.0)
    } else if secs >= 1.0 {
        format!("{:.0} seconds", secs)
    } else {
        format!("{:.0} ms", secs * 1000.0)
    }
}
