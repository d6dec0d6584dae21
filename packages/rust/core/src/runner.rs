//! Question execution driver.
//!
//! Runs one question program: feeds stdin line by line from a background
//! task, waits with a hard timeout, kills on expiry, and captures stdout and
//! stderr together.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, instrument, warn};

use autograde_shared::ExecutionConfig;

use crate::tools::CombinedCapture;

/// Appended to captured output whenever a run does not exit cleanly.
pub const EXECUTION_FAILED: &str = "\nExecution failed.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Program and arguments for one question run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCommand {
    program: String,
    args: Vec<String>,
}

impl QuestionCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Time and output limits for a question run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Hard wall-clock limit; the process is killed when it expires.
    pub timeout: Duration,
    /// Pause after each stdin line.
    pub input_delay: Duration,
    /// Captured output beyond this many bytes is discarded while reading.
    pub output_limit: usize,
}

impl From<&ExecutionConfig> for RunLimits {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            input_delay: config.input_delay(),
            output_limit: config.output_limit_bytes,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The timeout expired and the process was killed.
    TimedOut,
    /// The process could not be started or waited on.
    Failed(String),
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(status) if status.success())
    }
}

/// Result of a question run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Interleaved stdout/stderr, with [`EXECUTION_FAILED`] appended on failure.
    pub output: Vec<u8>,
    pub status: RunStatus,
    pub elapsed: Duration,
    /// The program printed more than [`RunLimits::output_limit`].
    pub truncated: bool,
}

/// Something that can run a question program.
///
/// [`ProcessRunner`] is the real driver; tests substitute canned runners.
pub trait QuestionRunner {
    fn run(
        &self,
        command: &QuestionCommand,
        stdin: Option<&str>,
    ) -> impl Future<Output = RunOutcome>;
}

/// Runs questions as child processes under [`RunLimits`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    limits: RunLimits,
}

impl ProcessRunner {
    pub fn new(limits: RunLimits) -> Self {
        Self { limits }
    }
}

impl QuestionRunner for ProcessRunner {
    async fn run(&self, command: &QuestionCommand, stdin: Option<&str>) -> RunOutcome {
        run_question(command, stdin, &self.limits).await
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run `command`, feeding `stdin` (if any) one line at a time.
///
/// Never fails: spawn errors, non-zero exits and timeouts are all reported
/// through [`RunOutcome::status`] and the failure marker in the output.
#[instrument(skip_all, fields(program = %command.program))]
pub async fn run_question(
    command: &QuestionCommand,
    stdin: Option<&str>,
    limits: &RunLimits,
) -> RunOutcome {
    let start = Instant::now();

    let mut process = Command::new(&command.program);
    process
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a timeout can take down anything it started.
    #[cfg(unix)]
    process.process_group(0);
    let spawned = process.spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, "failed to start command");
            return RunOutcome {
                output: EXECUTION_FAILED.as_bytes().to_vec(),
                status: RunStatus::Failed(format!("failed to start {}: {e}", command.program)),
                elapsed: start.elapsed(),
                truncated: false,
            };
        }
    };

    let capture = CombinedCapture::attach(&mut child, limits.output_limit);

    // Without input the pipe is dropped here, so the program sees EOF.
    let feeder = match (child.stdin.take(), stdin) {
        (Some(pipe), Some(text)) => Some(tokio::spawn(feed_stdin(
            pipe,
            text.to_owned(),
            limits.input_delay,
        ))),
        _ => None,
    };

    let status = match tokio::time::timeout(limits.timeout, child.wait()).await {
        Ok(Ok(status)) => RunStatus::Exited(status),
        Ok(Err(e)) => RunStatus::Failed(format!("wait failed: {e}")),
        Err(_) => {
            info!(timeout_ms = limits.timeout.as_millis() as u64, "command timed out");
            if let Some(pid) = child.id() {
                kill_process_group(pid);
            }
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out command");
            }
            RunStatus::TimedOut
        }
    };

    if let Some(feeder) = feeder {
        feeder.abort();
    }

    let captured = capture.finish().await;
    let truncated = captured.dropped > 0;
    if truncated {
        info!(
            kept = captured.bytes.len(),
            dropped = captured.dropped,
            "output limit reached"
        );
    }

    let mut output = captured.bytes;
    if status.is_success() {
        debug!("exited gracefully");
    } else {
        warn!(?status, "command failed");
        output.extend_from_slice(EXECUTION_FAILED.as_bytes());
    }

    RunOutcome {
        output,
        status,
        elapsed: start.elapsed(),
        truncated,
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid only signals that process group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group kill failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Write each line plus `\n`, flushing and pausing after every line, so
/// programs that open several `Scanner`s on stdin each get their own line.
/// stdin is closed when the last line has been sent.
async fn feed_stdin(mut pipe: ChildStdin, text: String, delay: Duration) {
    for line in text.split('\n') {
        let written = async {
            pipe.write_all(line.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
            pipe.flush().await
        }
        .await;

        if let Err(e) = written {
            debug!(error = %e, "program closed stdin early");
            return;
        }
        tokio::time::sleep(delay).await;
    }
}
