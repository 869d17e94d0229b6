//! Time-bounded child processes.
//!
//! [`run_bounded`] spawns a command with stdin closed and both output pipes
//! drained on background threads, then races the child against an optional
//! timer that also bounds output collection. When the timer wins, the
//! child's process group is interrupted, given a grace window to exit, and
//! then killed. Partial output from a timed out run is discarded.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

/// Default wait between interrupt and kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Timer settings for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Time allowed before the child is interrupted. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Time between interrupt and forced kill.
    pub grace: Duration,
}

impl RunLimits {
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Captured output of a completed child.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {after:?}")]
    TimedOut { program: String, after: Duration },
}

type Chunk = (&'static str, Vec<u8>, std::io::Result<usize>);

/// Output pipes being read on background threads.
struct Drains {
    rx: Receiver<Chunk>,
    pending: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Drains {
    fn spawn(child: &mut Child) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            drain(pipe, "stdout", tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            drain(pipe, "stderr", tx);
            pending += 1;
        }
        Self {
            rx,
            pending,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Waits for every pipe to close. Returns `false` if `deadline` passes
    /// first.
    fn collect(&mut self, deadline: Option<Instant>, program: &str) -> bool {
        while self.pending > 0 {
            let received = match deadline {
                Some(deadline) => self
                    .rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            let (stream, buf, result) = match received {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.pending -= 1;
            if let Err(e) = result {
                debug!(program = %program, stream, error = %e, "Failed to read child output");
            }
            match stream {
                "stdout" => self.stdout = buf,
                _ => self.stderr = buf,
            }
        }
        true
    }
}

fn drain<R: Read + Send + 'static>(
    mut pipe: R,
    stream: &'static str,
    tx: Sender<Chunk>,
) {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let result = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, buf, result));
    });
}

/// Runs `command` to completion or until `limits.timeout` expires.
///
/// The timer covers both the child's exit and the collection of its output,
/// so a grandchild holding a pipe open cannot outlive the limit.
///
/// # Errors
///
/// [`ProcessError::Spawn`] if the program cannot be started,
/// [`ProcessError::TimedOut`] if the timer fires first, and
/// [`ProcessError::Wait`] if waiting on the child fails.
pub fn run_bounded(mut command: Command, limits: RunLimits) -> Result<ProcessOutput, ProcessError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // The child leads its own group so grandchildren (the program
        // `go run` builds) are signalled with it.
        command.process_group(0);
    }

    let program = command.get_program().to_string_lossy().into_owned();
    let started = Instant::now();
    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let deadline = limits.timeout.map(|timeout| started + timeout);

    // Drain stdout and stderr in background threads to prevent deadlock when
    // the child's pipe buffer fills before it exits.
    let mut drains = Drains::spawn(&mut child);

    let waited = match deadline {
        Some(deadline) => child.wait_timeout(deadline.saturating_duration_since(Instant::now())),
        None => child.wait().map(Some),
    };
    let after = limits.timeout.unwrap_or_default();

    match waited {
        Ok(Some(status)) => {
            if !drains.collect(deadline, &program) {
                debug!(
                    program = %program,
                    timeout_ms = after.as_millis() as u64,
                    "Child exited but its output is still open, terminating process group"
                );
                terminate_group(child.id(), &mut drains, &program, limits.grace);
                return Err(ProcessError::TimedOut { program, after });
            }
            #[cfg(unix)]
            signal_group(child.id(), libc::SIGKILL);
            Ok(ProcessOutput {
                status,
                stdout: drains.stdout,
                stderr: drains.stderr,
            })
        }
        Ok(None) => {
            debug!(
                program = %program,
                timeout_ms = after.as_millis() as u64,
                grace_ms = limits.grace.as_millis() as u64,
                "Child timed out, terminating process group"
            );
            terminate(&mut child, limits.grace);
            Err(ProcessError::TimedOut { program, after })
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ProcessError::Wait { program, source })
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    // SAFETY: kill(2) with a negative pid only signals the group created for
    // this child in `run_bounded`.
    unsafe {
        libc::kill(-(pid as libc::pid_t), signal);
    }
}

/// Interrupts the child's group, waits out the grace window, then kills.
fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        signal_group(child.id(), libc::SIGINT);
        let exited = matches!(child.wait_timeout(grace), Ok(Some(_)));
        if !exited {
            debug!(pid = child.id(), "Grace period elapsed, killing process group");
        }
        // Stragglers in the group are killed even when the leader exited.
        signal_group(child.id(), libc::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = grace;
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Same escalation as [`terminate`] for a group whose leader was already
/// reaped. The grace window ends early once every pipe closes.
fn terminate_group(pid: u32, drains: &mut Drains, program: &str, grace: Duration) {
    #[cfg(unix)]
    {
        signal_group(pid, libc::SIGINT);
        if !drains.collect(Some(Instant::now() + grace), program) {
            debug!(pid, "Grace period elapsed, killing process group");
        }
        signal_group(pid, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, drains, program, grace);
    }
}
