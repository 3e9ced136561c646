//! Bounded-time subprocess execution.
//!
//! Stdout and stderr are drained on reader threads while the parent waits,
//! so a chatty child can never block on a full pipe. Readers hand their
//! buffers back over a channel and are abandoned after a short grace
//! period, since a grandchild that inherited a pipe can hold it open long
//! after the child itself was killed. Each call sets the child's working
//! directory explicitly; the parent process never changes its own.

use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Upper bound for captured stdout (structured analyzer output).
const MAX_STDOUT_SIZE: u64 = 64 * 1024 * 1024;
/// Upper bound for captured stderr.
const MAX_STDERR_SIZE: u64 = 1024 * 1024;
/// How long to keep collecting pipe output once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("terminated by signal")]
    Signaled { stderr: String },
}

#[derive(Debug, Clone)]
/// Captured output of a process that exited on its own.
pub struct ExecOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

fn read_pipe_bounded<R: Read>(reader: R, limit: u64) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Err(e) = reader.take(limit).read_to_end(&mut buffer) {
        debug!(error = %e, "pipe read ended early");
    }
    buffer
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>, limit: u64) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|p| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(read_pipe_bounded(p, limit));
        });
        rx
    })
}

/// Collect a reader's buffer, giving up at `deadline`.
fn collect_reader(rx: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Vec<u8> {
    let Some(rx) = rx else {
        return Vec::new();
    };
    let wait = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(wait).unwrap_or_else(|_| {
        debug!("pipe still held open after exit; abandoning reader");
        Vec::new()
    })
}

/// Run `program args...` in `cwd`, killing it after `timeout`.
pub fn run<I, S>(program: &str, args: I, cwd: &Path, timeout: Duration) -> Result<ExecOutput, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout_rx = spawn_reader(child.stdout.take(), MAX_STDOUT_SIZE);
    let stderr_rx = spawn_reader(child.stderr.take(), MAX_STDERR_SIZE);

    let waited = child.wait_timeout(timeout);
    let status = match waited {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!(program, cwd = %cwd.display(), secs = timeout.as_secs(), "process timed out; killing");
            let _ = child.kill();
            let _ = child.wait();
            let deadline = Instant::now() + DRAIN_GRACE;
            collect_reader(stdout_rx, deadline);
            collect_reader(stderr_rx, deadline);
            return Err(ExecError::Timeout {
                secs: timeout.as_secs(),
            });
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            let deadline = Instant::now() + DRAIN_GRACE;
            collect_reader(stdout_rx, deadline);
            collect_reader(stderr_rx, deadline);
            return Err(ExecError::Wait(e));
        }
    };

    // A child that exited on its own still gets the rest of its budget
    // for a descendant to let go of the pipes.
    let deadline = (start + timeout).max(Instant::now()) + DRAIN_GRACE;
    let stdout = collect_reader(stdout_rx, deadline);
    let stderr = collect_reader(stderr_rx, deadline);
    let elapsed = start.elapsed();
    debug!(program, cwd = %cwd.display(), code = ?status.code(), ms = elapsed.as_millis() as u64, "process finished");

    match status.code() {
        Some(code) => Ok(ExecOutput {
            code,
            stdout,
            stderr,
            elapsed,
        }),
        None => Err(ExecError::Signaled {
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }),
    }
}
