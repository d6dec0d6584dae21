//! External command wrappers with combined stdout/stderr capture.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use autograde_shared::{AutogradeError, Result};

/// How long to keep draining pipes after the child has been reaped.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Combined capture
// ---------------------------------------------------------------------------

/// Everything read from a child's stdout and stderr.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    /// Interleaved output, at most the capture limit.
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and thrown away.
    pub dropped: u64,
}

#[derive(Debug)]
struct Sink {
    captured: Captured,
    limit: usize,
}

impl Sink {
    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.captured.bytes.len());
        let kept = chunk.len().min(room);
        self.captured.bytes.extend_from_slice(&chunk[..kept]);
        self.captured.dropped += (chunk.len() - kept) as u64;
    }
}

/// Collects a child's stdout and stderr into one buffer, in arrival order.
pub(crate) struct CombinedCapture {
    sink: Arc<Mutex<Sink>>,
    pumps: Vec<JoinHandle<()>>,
}

impl CombinedCapture {
    /// Take the child's piped stdout/stderr and start draining them.
    ///
    /// At most `limit` bytes are kept. The pipes are read to the end
    /// regardless, so a chatty child never blocks on a full pipe.
    pub(crate) fn attach(child: &mut Child, limit: usize) -> Self {
        let sink = Arc::new(Mutex::new(Sink {
            captured: Captured::default(),
            limit,
        }));
        let mut pumps = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, Arc::clone(&sink))));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, Arc::clone(&sink))));
        }

        Self { sink, pumps }
    }

    /// Wait for both pipes to close and return everything captured.
    ///
    /// A grandchild holding a pipe open would block forever, so all pumps
    /// share one `DRAIN_GRACE` deadline and are abandoned after it.
    pub(crate) async fn finish(self) -> Captured {
        let deadline = Instant::now() + DRAIN_GRACE;
        for mut pump in self.pumps {
            if tokio::time::timeout_at(deadline, &mut pump).await.is_err() {
                debug!("output pipe still open after exit, abandoning it");
                pump.abort();
            }
        }
        std::mem::take(&mut self.sink.lock().await.captured)
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Sink>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.lock().await.push(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "output pipe read failed");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// External tool
// ---------------------------------------------------------------------------

/// Output of a completed external command.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// stdout and stderr, interleaved.
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A command-line tool run to completion (unzip, ant, fixture scripts, editors).
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: String,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Tool for an executable file; bare file names get a `./` prefix so
    /// they are not looked up on `PATH`.
    pub fn script(path: &Path) -> Self {
        let path = if path.components().count() == 1 {
            Path::new(".").join(path)
        } else {
            path.to_path_buf()
        };
        Self::new(path.display().to_string())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run with `args`, stdin closed, capturing stdout and stderr together.
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    pub async fn run_combined<I, S>(&self, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!(program = %self.program, "running external tool");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AutogradeError::tool(&self.program, format!("failed to start: {e}"))
            })?;

        let capture = CombinedCapture::attach(&mut child, usize::MAX);
        let status = child
            .wait()
            .await
            .map_err(|e| AutogradeError::tool(&self.program, format!("wait failed: {e}")))?;
        let output = String::from_utf8_lossy(&capture.finish().await.bytes).into_owned();

        if !status.success() {
            warn!(program = %self.program, %status, "external tool exited unsuccessfully");
        }

        Ok(ToolOutput { status, output })
    }
}
