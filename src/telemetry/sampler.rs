//! Background utilization sampling.
//!
//! A sampler is `Idle` until [`UtilizationSampler::start`] and returns to
//! `Idle` on [`UtilizationSampler::stop`]. While running, one worker thread
//! polls the telemetry source every interval and sends each reading (or
//! failure) over a channel; the caller only sees the samples after `stop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{GpuReading, TelemetrySource};

/// Sampler settings.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Time between queries
    pub interval: Duration,
    /// How long `stop` waits for the worker before abandoning it
    pub grace: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationSample {
    pub timestamp: DateTime<Utc>,
    pub reading: GpuReading,
}

impl UtilizationSample {
    pub fn utilization(&self) -> u8 {
        self.reading.utilization
    }
}

/// Aggregates over a non-empty run of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationStats {
    pub count: usize,
    pub min: u8,
    pub max: u8,
    pub mean: f64,
    /// Wall-clock time between `start` and `stop`
    pub duration: Duration,
    pub avg_memory_utilization: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_power_draw: Option<f64>,
    pub max_power_draw: Option<f64>,
    pub avg_memory_used: Option<f64>,
    pub max_memory_used: Option<f64>,
    /// Last failed query, even if later queries succeeded
    pub last_error: Option<String>,
    pub samples: Vec<UtilizationSample>,
}

impl UtilizationStats {
    /// `None` for an empty sample list.
    pub fn from_samples(
        samples: Vec<UtilizationSample>,
        duration: Duration,
        last_error: Option<String>,
    ) -> Option<Self> {
        let first = samples.first()?.utilization();
        let (mut min, mut max, mut sum) = (first, first, 0u64);
        for s in &samples {
            min = min.min(s.utilization());
            max = max.max(s.utilization());
            sum += u64::from(s.utilization());
        }
        let count = samples.len();

        let aux = |f: fn(&GpuReading) -> Option<f64>| -> Vec<f64> {
            samples.iter().filter_map(|s| f(&s.reading)).collect()
        };
        let memory_utilization = aux(|r| r.memory_utilization);
        let temperature = aux(|r| r.temperature);
        let power = aux(|r| r.power_draw);
        let memory_used = aux(|r| r.memory_used);

        Some(Self {
            count,
            min,
            max,
            mean: sum as f64 / count as f64,
            duration,
            avg_memory_utilization: average(&memory_utilization),
            avg_temperature: average(&temperature),
            max_temperature: maximum(&temperature),
            avg_power_draw: average(&power),
            max_power_draw: maximum(&power),
            avg_memory_used: average(&memory_used),
            max_memory_used: maximum(&memory_used),
            last_error,
            samples,
        })
    }
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn maximum(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// What `stop` returns.
#[derive(Debug, Clone, PartialEq)]
pub enum UtilizationReport {
    Stats(UtilizationStats),
    /// No sample was collected. Not the same as 0% utilization.
    NoData {
        error: Option<String>,
        duration: Duration,
    },
}

impl UtilizationReport {
    pub fn stats(&self) -> Option<&UtilizationStats> {
        match self {
            UtilizationReport::Stats(stats) => Some(stats),
            UtilizationReport::NoData { .. } => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        self.stats().map(|s| s.mean)
    }
}

enum Event {
    Reading(UtilizationSample),
    Failure(String),
}

struct Worker {
    handle: JoinHandle<()>,
    events: Receiver<Event>,
    started: Instant,
}

/// Polls a [`TelemetrySource`] on a background thread.
pub struct UtilizationSampler {
    source: Arc<dyn TelemetrySource>,
    config: SamplerConfig,
    running: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl UtilizationSampler {
    pub fn new(source: Arc<dyn TelemetrySource>, config: SamplerConfig) -> Self {
        Self {
            source,
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start polling. Calling this while already running does nothing.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            debug!("sampler already running");
            return;
        }

        // a fresh flag per run, so an abandoned worker never sees it flip back
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();
        let (tx, rx) = mpsc::channel();
        let source = self.source.clone();
        let interval = self.config.interval;

        let handle = thread::spawn(move || sample_loop(source, running, interval, tx));
        info!(interval_ms = interval.as_millis() as u64, "sampler started");

        self.worker = Some(Worker {
            handle,
            events: rx,
            started: Instant::now(),
        });
    }

    /// Stop polling and summarize what was collected.
    ///
    /// Waits at most the grace period for the worker; a worker stuck in a
    /// query is abandoned and the samples received so far are kept.
    pub fn stop(&mut self) -> UtilizationReport {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return UtilizationReport::NoData {
                error: None,
                duration: Duration::ZERO,
            };
        };
        let duration = worker.started.elapsed();

        let mut samples = Vec::new();
        let mut last_error = None;
        let deadline = Instant::now() + self.config.grace;
        let mut finished = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.events.recv_timeout(remaining) {
                Ok(Event::Reading(sample)) => samples.push(sample),
                Ok(Event::Failure(error)) => last_error = Some(error),
                Err(RecvTimeoutError::Disconnected) => {
                    finished = true;
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        if finished {
            if worker.handle.join().is_err() {
                warn!("sampler thread panicked");
            }
        } else {
            warn!(grace_ms = self.config.grace.as_millis() as u64, "sampler thread abandoned");
        }

        info!(samples = samples.len(), "sampler stopped");
        match UtilizationStats::from_samples(samples, duration, last_error.clone()) {
            Some(stats) => UtilizationReport::Stats(stats),
            None => UtilizationReport::NoData {
                error: last_error,
                duration,
            },
        }
    }
}

impl Drop for UtilizationSampler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn sample_loop(
    source: Arc<dyn TelemetrySource>,
    running: Arc<AtomicBool>,
    interval: Duration,
    events: Sender<Event>,
) {
    loop {
        thread::sleep(interval);
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let event = match source.query() {
            Ok(reading) => Event::Reading(UtilizationSample {
                timestamp: Utc::now(),
                reading,
            }),
            Err(e) => {
                debug!("telemetry query failed: {}", e);
                Event::Failure(e.to_string())
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryError;
    use std::sync::atomic::AtomicUsize;

    struct Constant(u8);

    impl TelemetrySource for Constant {
        fn query(&self) -> Result<GpuReading, TelemetryError> {
            Ok(GpuReading::utilization_only(self.0))
        }
    }

    struct Missing;

    impl TelemetrySource for Missing {
        fn query(&self) -> Result<GpuReading, TelemetryError> {
            Err(TelemetryError::NotFound)
        }
    }

    /// Fails on every other call.
    struct Flaky(AtomicUsize);

    impl TelemetrySource for Flaky {
        fn query(&self) -> Result<GpuReading, TelemetryError> {
            if self.0.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(TelemetryError::Timeout)
            } else {
                Ok(GpuReading::utilization_only(80))
            }
        }
    }

    struct Hangs;

    impl TelemetrySource for Hangs {
        fn query(&self) -> Result<GpuReading, TelemetryError> {
            thread::sleep(Duration::from_secs(5));
            Ok(GpuReading::utilization_only(1))
        }
    }

    fn config(interval_ms: u64) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(interval_ms),
            grace: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_immediate_stop_is_no_data() {
        let mut sampler = UtilizationSampler::new(Arc::new(Constant(99)), config(200));
        sampler.start();
        let report = sampler.stop();
        assert!(matches!(report, UtilizationReport::NoData { error: None, .. }));
        assert_eq!(report.mean(), None);
        assert!(!sampler.is_running());
    }

    #[test]
    fn test_constant_source() {
        let mut sampler = UtilizationSampler::new(Arc::new(Constant(93)), config(40));
        sampler.start();
        thread::sleep(Duration::from_millis(40 * 5 + 20));
        let report = sampler.stop();

        let stats = report.stats().expect("samples collected");
        assert!((3..=6).contains(&stats.count), "count = {}", stats.count);
        assert_eq!(stats.min, 93);
        assert_eq!(stats.max, 93);
        assert_eq!(stats.mean, 93.0);
        assert_eq!(stats.last_error, None);
        assert_eq!(stats.avg_temperature, None);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut sampler = UtilizationSampler::new(Arc::new(Constant(50)), config(30));
        sampler.start();
        sampler.start();
        assert!(sampler.is_running());
        thread::sleep(Duration::from_millis(100));
        assert!(sampler.stop().stats().is_some());
        assert!(matches!(sampler.stop(), UtilizationReport::NoData { .. }));
    }

    #[test]
    fn test_failures_keep_sampling() {
        let mut sampler = UtilizationSampler::new(Arc::new(Missing), config(20));
        sampler.start();
        thread::sleep(Duration::from_millis(100));
        match sampler.stop() {
            UtilizationReport::NoData { error, .. } => {
                assert_eq!(error.as_deref(), Some("nvidia-smi not found"))
            }
            other => panic!("expected no data, got {other:?}"),
        }
    }

    #[test]
    fn test_error_is_sticky() {
        let mut sampler = UtilizationSampler::new(Arc::new(Flaky(AtomicUsize::new(0))), config(20));
        sampler.start();
        thread::sleep(Duration::from_millis(150));
        let report = sampler.stop();
        let stats = report.stats().expect("some queries succeed");
        assert_eq!(stats.min, 80);
        assert_eq!(stats.last_error.as_deref(), Some("nvidia-smi timeout"));
    }

    #[test]
    fn test_stuck_worker_is_abandoned() {
        let mut sampler = UtilizationSampler::new(
            Arc::new(Hangs),
            SamplerConfig {
                interval: Duration::from_millis(10),
                grace: Duration::from_millis(100),
            },
        );
        sampler.start();
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        let report = sampler.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(report, UtilizationReport::NoData { .. }));
    }

    #[test]
    fn test_independent_samplers() {
        let mut a = UtilizationSampler::new(Arc::new(Constant(10)), config(20));
        let mut b = UtilizationSampler::new(Arc::new(Constant(90)), config(20));
        a.start();
        b.start();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(a.stop().stats().map(|s| s.max), Some(10));
        assert_eq!(b.stop().stats().map(|s| s.min), Some(90));
    }

    #[test]
    fn test_aux_aggregates() {
        let reading = |u, t| GpuReading {
            utilization: u,
            memory_utilization: None,
            temperature: Some(t),
            power_draw: None,
            memory_used: None,
        };
        let samples = vec![
            UtilizationSample {
                timestamp: Utc::now(),
                reading: reading(90, 60.0),
            },
            UtilizationSample {
                timestamp: Utc::now(),
                reading: reading(96, 70.0),
            },
        ];
        let stats = UtilizationStats::from_samples(samples, Duration::from_secs(1), None).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 93.0);
        assert_eq!(stats.avg_temperature, Some(65.0));
        assert_eq!(stats.max_temperature, Some(70.0));
        assert_eq!(stats.avg_power_draw, None);
        assert!(UtilizationStats::from_samples(Vec::new(), Duration::ZERO, None).is_none());
    }
}
