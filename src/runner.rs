//! Running the grinder under the utilization sampler.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::report::GrinderReport;
use crate::telemetry::sampler::{UtilizationReport, UtilizationSampler};

/// One grinder command line.
#[derive(Debug, Clone)]
pub struct GrinderInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// A timeout is the expected end of a sustained-load run
    pub sustained_load: bool,
    /// Cleared by the caller to kill the grinder early
    pub keep_running: Option<Arc<AtomicBool>>,
}

impl GrinderInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(300),
            sustained_load: false,
            keep_running: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sustained(mut self, sustained_load: bool) -> Self {
        self.sustained_load = sustained_load;
        self
    }

    pub fn with_cancel(mut self, keep_running: Arc<AtomicBool>) -> Self {
        self.keep_running = Some(keep_running);
        self
    }

    fn cancelled(&self) -> bool {
        self.keep_running
            .as_ref()
            .map_or(false, |flag| !flag.load(Ordering::SeqCst))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the grinder process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    Completed { code: Option<i32>, success: bool },
    /// Killed after the timeout
    TimedOut,
    /// Killed on request
    Cancelled,
    SpawnFailed(String),
}

/// Everything observed during one monitored run.
#[derive(Debug, Clone)]
pub struct MonitoredRun {
    pub command: String,
    pub exit: RunExit,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub sustained_load: bool,
    /// Collected even when the run timed out
    pub utilization: UtilizationReport,
}

impl MonitoredRun {
    /// Successful exit, or a timeout on a sustained-load run.
    pub fn acceptable(&self) -> bool {
        match &self.exit {
            RunExit::Completed { success, .. } => *success,
            RunExit::TimedOut => self.sustained_load,
            RunExit::Cancelled | RunExit::SpawnFailed(_) => false,
        }
    }

    pub fn report(&self) -> GrinderReport {
        GrinderReport::parse(&self.stdout)
    }
}

/// How long to wait for output pipes once the grinder itself has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output collected so far; a descendant still holding the pipe is abandoned.
fn collect(rx: &Receiver<String>, deadline: Instant) -> String {
    let remaining = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(remaining).unwrap_or_else(|_| {
        warn!("grinder output still open after exit, abandoning reader");
        String::new()
    })
}

fn spawn_grinder(invocation: &GrinderInvocation) -> std::io::Result<Child> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.spawn()
}

/// Kill the grinder along with anything it started.
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        // the child leads its own process group
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {}
            _ => child.kill()?,
        }
    }
    #[cfg(not(unix))]
    child.kill()?;
    child.wait()?;
    Ok(())
}

fn wait_for_exit(child: &mut Child, invocation: &GrinderInvocation) -> std::io::Result<RunExit> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(RunExit::Completed {
                code: status.code(),
                success: status.success(),
            });
        }
        if invocation.cancelled() {
            warn!("grinder cancelled");
            kill_tree(child)?;
            return Ok(RunExit::Cancelled);
        }
        if started.elapsed() >= invocation.timeout {
            warn!("grinder timed out after {:?}", invocation.timeout);
            kill_tree(child)?;
            return Ok(RunExit::TimedOut);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Run the grinder with `sampler` polling for its whole lifetime.
///
/// The sampler is always stopped, whatever happens to the process, and it is
/// stopped as soon as the process is gone.
pub fn run_monitored(invocation: &GrinderInvocation, sampler: &mut UtilizationSampler) -> MonitoredRun {
    let command = invocation.command_line();
    info!(%command, timeout_s = invocation.timeout.as_secs(), "starting grinder");

    sampler.start();
    let started = Instant::now();

    let (exit, stdout, stderr, utilization) = match spawn_grinder(invocation) {
        Err(e) => {
            warn!("failed to start grinder: {}", e);
            let utilization = sampler.stop();
            (RunExit::SpawnFailed(e.to_string()), String::new(), String::new(), utilization)
        }
        Ok(mut child) => {
            let out = drain(child.stdout.take());
            let err = drain(child.stderr.take());

            let exit = match wait_for_exit(&mut child, invocation) {
                Ok(exit) => exit,
                Err(e) => {
                    warn!("lost track of grinder: {}", e);
                    let _ = kill_tree(&mut child);
                    RunExit::SpawnFailed(e.to_string())
                }
            };
            let utilization = sampler.stop();

            let deadline = Instant::now() + DRAIN_GRACE;
            let stdout = collect(&out, deadline);
            let stderr = collect(&err, deadline);
            (exit, stdout, stderr, utilization)
        }
    };

    let elapsed = started.elapsed();
    info!(?exit, elapsed_ms = elapsed.as_millis() as u64, "grinder finished");

    MonitoredRun {
        command,
        exit,
        stdout,
        stderr,
        elapsed,
        sustained_load: invocation.sustained_load,
        utilization,
    }
}
