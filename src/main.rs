use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use vanitymask_verify::display::display_benchmark;
use vanitymask_verify::{
    baseline_key, check_utilization, compute_ecdsa, create_progress_bar, display_hardware_info,
    display_outcome, estimate_time, expected_attempts, format_difficulty, format_duration,
    host_label, host_snapshot, outcome_line, parse_hex, parse_scalar, run_monitored,
    utilization_line, BaselineRecord, BaselineStore, EcdsaClaim, GrindMode, GrinderInvocation,
    GrinderReport, InternalKey, IterationResult, IterationSummary, MaskClaim, NvidiaSmi,
    ReportExpectation, RunExit, SamplerConfig, SchnorrClaim, TaprootClaim, TxidClaim, UtilizationReport,
    UtilizationSampler, VerificationOutcome,
};

#[derive(Parser)]
#[command(name = "vanitymask-verify")]
#[command(about = "Independently verify GPU grinder results and monitor GPU utilization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a mask/prefix private key
    Mask {
        /// Private key (hex)
        #[arg(long)]
        privkey: String,
        /// Target prefix of pubkey.x (hex)
        #[arg(long)]
        target: String,
        /// Explicit 256-bit mask (hex)
        #[arg(long)]
        mask: Option<String>,
        /// pubkey.x as printed by the grinder
        #[arg(long)]
        reported: Option<String>,
    },

    /// Verify an R-value ground signature
    Sig {
        /// Nonce k (hex)
        #[arg(long)]
        nonce: String,
        /// Claimed r (hex)
        #[arg(long)]
        r: String,
        /// Claimed s (hex), ECDSA only
        #[arg(long)]
        s: Option<String>,
        /// Message hash z (hex), ECDSA only
        #[arg(long)]
        z: Option<String>,
        /// Signing key d (hex), ECDSA only
        #[arg(long)]
        privkey: Option<String>,
        /// Check only R.x of a Schnorr signature
        #[arg(long)]
        schnorr: bool,
    },

    /// Verify a ground transaction id
    Txid {
        #[command(flatten)]
        template: TxidArgs,
        /// Nonce (hex)
        #[arg(long)]
        nonce: String,
        /// TXID as printed by the grinder
        #[arg(long)]
        reported: Option<String>,
    },

    /// Verify a taproot output key
    Taproot {
        /// Internal private key d (hex)
        #[arg(long, conflicts_with = "internal_x", required_unless_present = "internal_x")]
        privkey: Option<String>,
        /// Internal key x coordinate (hex), both parities are tried
        #[arg(long)]
        internal_x: Option<String>,
        /// Expected output key Q.x or a prefix of it (hex)
        #[arg(long)]
        expected: String,
        /// Expected tweak t (hex)
        #[arg(long)]
        tweak: Option<String>,
    },

    /// Verify grinder report files
    Report {
        /// Report files (grinder stdout)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Mode the grinder ran in
        #[arg(long)]
        mode: GrindMode,
        /// Target prefix (mask: pubkey.x, taproot: Q.x)
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        mask: Option<String>,
        /// Message hash z (hex), sig mode
        #[arg(long)]
        z: Option<String>,
        /// Signing key d (hex), sig mode
        #[arg(long)]
        privkey: Option<String>,
        /// Raw transaction template (hex), txid mode
        #[arg(long)]
        template: Option<String>,
        /// Nonce byte offset, txid mode
        #[arg(long)]
        offset: Option<usize>,
        /// Nonce width in bytes, txid mode
        #[arg(long, default_value_t = 4)]
        length: usize,
        /// Expected TXID prefix (hex), txid mode
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Sample GPU utilization until Ctrl+C or the duration elapses
    Monitor {
        #[command(flatten)]
        gpu: GpuArgs,
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Report against this mode's utilization target
        #[arg(long)]
        mode: Option<String>,
    },

    /// Benchmark the grinder and compare against stored baselines
    Bench {
        /// Grinder executable
        #[arg(long)]
        grinder: PathBuf,
        /// Mode name, used for baseline keys and utilization targets
        #[arg(long)]
        mode: String,
        /// Difficulty in bits
        #[arg(long)]
        bits: u32,
        #[arg(long, default_value_t = 3)]
        iterations: usize,
        /// Per-iteration timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// A timeout ends the run normally
        #[arg(long)]
        sustained: bool,
        #[arg(long, default_value = "benchmark_baselines.json")]
        baselines: PathBuf,
        /// Store the results as the new baseline
        #[arg(long)]
        save_baseline: bool,
        #[command(flatten)]
        gpu: GpuArgs,
        /// Arguments passed to the grinder
        #[arg(last = true)]
        grinder_args: Vec<String>,
    },

    /// Check the built-in reference vectors
    Selftest,

    /// Show host and GPU information
    Info {
        #[command(flatten)]
        gpu: GpuArgs,
    },
}

#[derive(Args, Clone)]
struct TxidArgs {
    /// Raw transaction template (hex)
    #[arg(long = "template")]
    template: String,
    /// Nonce byte offset (default: last `length` bytes)
    #[arg(long)]
    offset: Option<usize>,
    /// Nonce width in bytes
    #[arg(long, default_value_t = 4)]
    length: usize,
    /// Expected TXID prefix (hex)
    #[arg(long)]
    prefix: String,
}

#[derive(Args, Clone)]
struct GpuArgs {
    /// GPU index for nvidia-smi
    #[arg(long, default_value_t = 0)]
    gpu_id: u32,
    /// Sampling interval in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,
}

impl GpuArgs {
    fn source(&self) -> NvidiaSmi {
        NvidiaSmi::new(self.gpu_id)
    }

    fn sampler(&self) -> UtilizationSampler {
        let config = SamplerConfig {
            interval: Duration::from_millis(self.interval_ms),
            ..SamplerConfig::default()
        };
        UtilizationSampler::new(Arc::new(self.source()), config)
    }
}

impl TxidArgs {
    fn template_bytes(&self) -> anyhow::Result<Vec<u8>> {
        hex::decode(self.template.trim()).context("template is not valid hex")
    }

    fn offset(&self, template: &[u8]) -> usize {
        self.offset
            .unwrap_or_else(|| template.len().saturating_sub(self.length))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every check passed.
fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Mask {
            privkey,
            target,
            mask,
            reported,
        } => {
            let mut claim = MaskClaim::new(parse_hex("privkey", &privkey)?, target);
            claim.mask = mask;
            claim.reported_x = reported;
            Ok(show("mask", claim.verify()?))
        }

        Command::Sig {
            nonce,
            r,
            s,
            z,
            privkey,
            schnorr,
        } => {
            let nonce = parse_hex("nonce", &nonce)?;
            let r = parse_hex("r", &r)?;
            let outcome = if schnorr {
                SchnorrClaim { nonce, r }.verify()?
            } else {
                let (Some(s), Some(z), Some(privkey)) = (s, z, privkey) else {
                    bail!("ECDSA verification needs --s, --z and --privkey");
                };
                EcdsaClaim {
                    nonce,
                    z: parse_hex("z", &z)?,
                    privkey: parse_hex("privkey", &privkey)?,
                    r,
                    s: parse_hex("s", &s)?,
                }
                .verify()?
            };
            Ok(show("sig", outcome))
        }

        Command::Txid {
            template,
            nonce,
            reported,
        } => {
            let bytes = template.template_bytes()?;
            let offset = template.offset(&bytes);
            let mut claim = TxidClaim::new(bytes, parse_hex("nonce", &nonce)?, offset, template.length, template.prefix);
            claim.reported_txid = reported;
            Ok(show("txid", claim.verify()?))
        }

        Command::Taproot {
            privkey,
            internal_x,
            expected,
            tweak,
        } => {
            let key = match (privkey, internal_x) {
                (Some(d), _) => InternalKey::Private(parse_hex("privkey", &d)?),
                (None, Some(x)) => InternalKey::XOnly(parse_hex("internal x", &x)?),
                (None, None) => bail!("one of --privkey or --internal-x is required"),
            };
            let claim = TaprootClaim {
                key,
                expected_output_x: expected,
                expected_tweak: tweak,
            };
            Ok(show("taproot", claim.verify()?))
        }

        Command::Report {
            files,
            mode,
            target,
            mask,
            z,
            privkey,
            template,
            offset,
            length,
            prefix,
        } => {
            let txid = match (template, prefix) {
                (Some(template), Some(prefix)) => Some(TxidArgs {
                    template,
                    offset,
                    length,
                    prefix,
                }),
                _ => None,
            };
            let expectation = expectation(mode, target, mask, z, privkey, txid)?;
            verify_reports(&files, &expectation)
        }

        Command::Monitor { gpu, duration, mode } => monitor(&gpu, duration.map(Duration::from_secs), mode),

        Command::Bench {
            grinder,
            mode,
            bits,
            iterations,
            timeout,
            sustained,
            baselines,
            save_baseline,
            gpu,
            grinder_args,
        } => {
            // the grinder runs in its own process group and misses the terminal's Ctrl+C
            let keep_running = Arc::new(AtomicBool::new(true));
            let flag = keep_running.clone();
            ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
                .context("setting Ctrl+C handler")?;
            let invocation = GrinderInvocation::new(grinder, grinder_args)
                .with_timeout(Duration::from_secs(timeout))
                .sustained(sustained)
                .with_cancel(keep_running);
            let mut store = BaselineStore::load(&baselines)?;
            let passed = bench(&invocation, &mode, bits, iterations, &gpu, &mut store, save_baseline)?;
            Ok(passed)
        }

        Command::Selftest => Ok(selftest()),

        Command::Info { gpu } => {
            let source = gpu.source();
            let name = source.gpu_name().ok();
            display_hardware_info(name.as_deref());
            let snap = host_snapshot();
            println!("  Load:     CPU {:.1}%, RAM {}/{} MB", snap.cpu_percent, snap.ram_used_mb, snap.ram_total_mb);
            Ok(true)
        }
    }
}

fn show(label: &str, outcome: VerificationOutcome) -> bool {
    display_outcome(label, &outcome);
    outcome.is_confirmed()
}

fn expectation(
    mode: GrindMode,
    target: Option<String>,
    mask: Option<String>,
    z: Option<String>,
    privkey: Option<String>,
    txid: Option<TxidArgs>,
) -> anyhow::Result<ReportExpectation> {
    Ok(match mode {
        GrindMode::Mask | GrindMode::Vanity => ReportExpectation::Mask {
            target: target.context("--target is required for mask reports")?,
            mask,
        },
        GrindMode::SigEcdsa => ReportExpectation::Ecdsa {
            z: parse_hex("z", &z.context("--z is required for ECDSA reports")?)?,
            privkey: parse_scalar("privkey", &privkey.context("--privkey is required for ECDSA reports")?)?,
        },
        GrindMode::SigSchnorr => ReportExpectation::Schnorr,
        GrindMode::Taproot => ReportExpectation::Taproot {
            target: target.context("--target is required for taproot reports")?,
        },
        GrindMode::Txid => {
            let args = txid.context("--template and --prefix are required for txid reports")?;
            let template = args.template_bytes()?;
            ReportExpectation::Txid {
                offset: args.offset,
                length: args.length,
                prefix: args.prefix,
                template,
            }
        }
    })
}

fn verify_reports(files: &[PathBuf], expectation: &ReportExpectation) -> anyhow::Result<bool> {
    let lines: Vec<(String, bool)> = files
        .par_iter()
        .map(|path| {
            let label = path.display().to_string();
            let outcome = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", label))
                .and_then(|text| Ok(GrinderReport::parse(&text).verify(expectation)?));
            match outcome {
                Ok(outcome) => (outcome_line(&label, &outcome), outcome.is_confirmed()),
                Err(e) => (format!("✗ [{}] ERROR: {:#}", label, e), false),
            }
        })
        .collect();

    for (line, _) in &lines {
        println!("{}", line);
    }
    let passed = lines.iter().filter(|(_, ok)| *ok).count();
    println!("\n{}/{} reports confirmed", passed, lines.len());
    Ok(passed == lines.len())
}

fn monitor(gpu: &GpuArgs, duration: Option<Duration>, mode: Option<String>) -> anyhow::Result<bool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let mut sampler = gpu.sampler();
    let pb = create_progress_bar(&format!(
        "Sampling GPU {} every {} ms, Ctrl+C to stop",
        gpu.gpu_id, gpu.interval_ms
    ));
    sampler.start();
    let started = Instant::now();
    while running.load(Ordering::SeqCst) && duration.map_or(true, |d| started.elapsed() < d) {
        std::thread::sleep(Duration::from_millis(100));
    }
    let report = sampler.stop();
    pb.finish_and_clear();

    println!("{}", utilization_line(&report));
    match (&report, mode) {
        (UtilizationReport::Stats(stats), Some(mode)) => {
            let check = check_utilization(GrindMode::parse_or_mask(&mode), stats.mean);
            println!("{}", check);
            Ok(check.meets_min)
        }
        (UtilizationReport::Stats(_), None) => Ok(true),
        (UtilizationReport::NoData { .. }, _) => Ok(false),
    }
}

fn bench(
    invocation: &GrinderInvocation,
    mode: &str,
    bits: u32,
    iterations: usize,
    gpu: &GpuArgs,
    store: &mut BaselineStore,
    save_baseline: bool,
) -> anyhow::Result<bool> {
    let grind_mode = GrindMode::parse_or_mask(mode);
    let attempts = expected_attempts(bits);
    println!("Benchmark: {} {}-bit ({} attempts expected)", mode, bits, format_difficulty(attempts));
    println!("Command:   {}", invocation.command_line());

    let mut sampler = gpu.sampler();
    let mut results = Vec::with_capacity(iterations);
    let mut means = Vec::new();
    let mut all_acceptable = true;

    for i in 1..=iterations {
        let pb = create_progress_bar(&format!("Iteration {}/{}", i, iterations));
        let run = run_monitored(invocation, &mut sampler);
        pb.finish_and_clear();

        let report = run.report();
        let throughput = report.throughput_mkeys.unwrap_or(0.0);
        println!(
            "  [{}/{}] {:?} in {}, {:.1} Mkey/s, found: {}",
            i,
            iterations,
            run.exit,
            format_duration(run.elapsed),
            throughput,
            report.found()
        );
        println!("        {}", utilization_line(&run.utilization));

        all_acceptable &= run.acceptable();
        if let Some(mean) = run.utilization.mean() {
            means.push(mean);
        }
        results.push(IterationResult {
            throughput_mkeys: throughput,
            time_sec: run.elapsed.as_secs_f64(),
            found: report.found(),
        });
        if run.exit == RunExit::Cancelled {
            bail!("benchmark interrupted after {} of {} iterations", i, iterations);
        }
    }

    let summary = IterationSummary::from_results(&results);
    let utilization = (!means.is_empty())
        .then(|| check_utilization(grind_mode, means.iter().sum::<f64>() / means.len() as f64));
    let regression = store.evaluate(mode, bits, summary.avg_throughput);
    display_benchmark(
        &baseline_key(mode, bits),
        &summary,
        &regression,
        utilization.as_ref(),
    );
    if let Some(eta) = estimate_time(bits, summary.avg_throughput) {
        println!("  Expected time per hit: {}", format_duration(eta));
    }

    if save_baseline {
        if summary.avg_throughput <= 0.0 {
            bail!("no throughput measured, baseline not saved");
        }
        let label = gpu.source().gpu_name().unwrap_or_else(|_| host_label());
        store.insert(mode, bits, BaselineRecord::new(summary.avg_throughput, summary.avg_time_sec, label));
        store.save()?;
        println!("Baseline updated in {}", store.path().display());
    }

    Ok(all_acceptable && regression.verdict.is_pass())
}

/// Known-answer checks against fixed vectors.
fn selftest() -> bool {
    const FIXED_Z: &str = "0102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F20";
    const MINIMAL_TX: &str = "0100000001000000000000000000000000000000000000000000000000000000000000000000000000ffffffff0100000000000000000000000000";

    let one = num_bigint::BigUint::from(1u32);
    let checks: Vec<(&str, vanitymask_verify::Result<VerificationOutcome>)> = vec![
        ("mask", MaskClaim::new(one.clone(), "79BE").verify()),
        (
            "ecdsa",
            parse_hex("z", FIXED_Z).and_then(|z| {
                let (r, s) = compute_ecdsa(&one, &z, &one)?;
                EcdsaClaim {
                    nonce: one.clone(),
                    z,
                    privkey: one.clone(),
                    r,
                    s,
                }
                .verify()
            }),
        ),
        (
            "taproot",
            TaprootClaim {
                key: InternalKey::Private(one.clone()),
                expected_output_x: "da4710964f7852695de2da025290e24af6d8c281de5a0b902b7135fd9fd74d21".into(),
                expected_tweak: Some("3cf5216d476a5e637bf0da674e50ddf55c403270dd36494dfcca438132fa30e7".into()),
            }
            .verify(),
        ),
        (
            "txid",
            match hex::decode(MINIMAL_TX) {
                Ok(template) => TxidClaim::new(template, num_bigint::BigUint::from(0xdeadbeefu32), 55, 4, "0674dc98")
                    .with_reported_txid("0674dc986f0139456bae426807ec33972b43da71c5b17d28b603b8a138b886bc")
                    .verify(),
                Err(e) => Ok(VerificationOutcome::Invalid(e.to_string())),
            },
        ),
    ];

    let mut all = true;
    for (label, result) in checks {
        match result {
            Ok(outcome) => all &= show(label, outcome),
            Err(e) => {
                println!("✗ [{}] ERROR: {}", label, e);
                all = false;
            }
        }
    }
    all
}
