//! GPU telemetry via `nvidia-smi`.
//!
//! Every query shells out to the tool with a bounded timeout. Failures are
//! returned as [`TelemetryError`] and the sampler records them without
//! stopping.

pub mod sampler;
pub mod thresholds;

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

/// Fields requested from the tool, in output order.
pub const QUERY_FIELDS: &str =
    "utilization.gpu,utilization.memory,temperature.gpu,power.draw,memory.used";

/// Error types for telemetry queries
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("nvidia-smi not found")]
    NotFound,
    #[error("nvidia-smi timeout")]
    Timeout,
    #[error("nvidia-smi failed: {0}")]
    Failed(String),
    #[error("malformed telemetry output: {0}")]
    Malformed(String),
    #[error("telemetry i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One telemetry line.
///
/// Only the utilization figure is required; the auxiliary metrics are `None`
/// when the driver reports them as unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuReading {
    /// GPU utilization, 0 to 100
    pub utilization: u8,
    /// Memory controller utilization in percent
    pub memory_utilization: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Watts
    pub power_draw: Option<f64>,
    /// MiB
    pub memory_used: Option<f64>,
}

impl GpuReading {
    pub fn utilization_only(utilization: u8) -> Self {
        Self {
            utilization,
            memory_utilization: None,
            temperature: None,
            power_draw: None,
            memory_used: None,
        }
    }
}

/// Parse one `csv,noheader,nounits` line of [`QUERY_FIELDS`].
pub fn parse_query_line(line: &str) -> Result<GpuReading, TelemetryError> {
    let mut fields = line.split(',').map(str::trim);

    let first = fields
        .next()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| TelemetryError::Malformed("empty line".to_string()))?;
    let utilization: u8 = first
        .parse()
        .ok()
        .filter(|u| *u <= 100)
        .ok_or_else(|| TelemetryError::Malformed(format!("utilization '{}'", first)))?;

    // "[N/A]" and friends are treated as missing
    let mut aux = || fields.next().and_then(|f| f.parse::<f64>().ok());

    Ok(GpuReading {
        utilization,
        memory_utilization: aux(),
        temperature: aux(),
        power_draw: aux(),
        memory_used: aux(),
    })
}

/// Anything that can produce a utilization reading on demand.
pub trait TelemetrySource: Send + Sync {
    fn query(&self) -> Result<GpuReading, TelemetryError>;
}

/// The `nvidia-smi` command-line tool.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    pub program: String,
    pub gpu_id: u32,
    /// Upper bound on a single invocation
    pub timeout: Duration,
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self {
            program: "nvidia-smi".to_string(),
            gpu_id: 0,
            timeout: Duration::from_secs(2),
        }
    }
}

impl NvidiaSmi {
    pub fn new(gpu_id: u32) -> Self {
        Self {
            gpu_id,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the tool and return its stdout.
    fn run(&self, args: &[String]) -> Result<String, TelemetryError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TelemetryError::NotFound,
                _ => TelemetryError::Io(e),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TelemetryError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(10));
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                err.read_to_string(&mut stderr)?;
            }
            return Err(TelemetryError::Failed(stderr.trim().to_string()));
        }
        Ok(stdout)
    }

    /// Board name, e.g. "NVIDIA GeForce RTX 4090".
    pub fn gpu_name(&self) -> Result<String, TelemetryError> {
        let out = self.run(&[
            format!("--id={}", self.gpu_id),
            "--query-gpu=name".to_string(),
            "--format=csv,noheader".to_string(),
        ])?;
        out.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TelemetryError::Malformed("no gpu name".to_string()))
    }

    /// Whether the tool runs and lists at least one GPU.
    pub fn is_available(&self) -> bool {
        match self.run(&["-L".to_string()]) {
            Ok(out) => out.contains("GPU"),
            Err(e) => {
                debug!("nvidia-smi unavailable: {}", e);
                false
            }
        }
    }
}

impl TelemetrySource for NvidiaSmi {
    fn query(&self) -> Result<GpuReading, TelemetryError> {
        let out = self.run(&[
            format!("--id={}", self.gpu_id),
            format!("--query-gpu={}", QUERY_FIELDS),
            "--format=csv,noheader,nounits".to_string(),
        ])?;
        let line = out
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| TelemetryError::Malformed("no output".to_string()))?;
        parse_query_line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let reading = parse_query_line("97, 41, 66, 412.35, 1830").unwrap();
        assert_eq!(reading.utilization, 97);
        assert_eq!(reading.memory_utilization, Some(41.0));
        assert_eq!(reading.temperature, Some(66.0));
        assert_eq!(reading.power_draw, Some(412.35));
        assert_eq!(reading.memory_used, Some(1830.0));
    }

    #[test]
    fn test_parse_utilization_only() {
        assert_eq!(parse_query_line("12").unwrap(), GpuReading::utilization_only(12));
    }

    #[test]
    fn test_unavailable_aux_fields() {
        let reading = parse_query_line("50, [N/A], 70, [N/A], 100").unwrap();
        assert_eq!(reading.memory_utilization, None);
        assert_eq!(reading.temperature, Some(70.0));
        assert_eq!(reading.power_draw, None);
    }

    #[test]
    fn test_malformed_utilization() {
        for line in ["", "abc, 1", "101, 0", "-1", "[N/A], 5"] {
            assert!(
                matches!(parse_query_line(line), Err(TelemetryError::Malformed(_))),
                "{line:?}"
            );
        }
    }

    #[test]
    fn test_missing_tool() {
        let smi = NvidiaSmi {
            program: "definitely-not-a-real-nvidia-smi".to_string(),
            ..NvidiaSmi::default()
        };
        assert!(matches!(smi.query(), Err(TelemetryError::NotFound)));
        assert!(!smi.is_available());
        assert_eq!(TelemetryError::NotFound.to_string(), "nvidia-smi not found");
    }
}
