//! Process execution with a wall-clock timeout and capped output capture
//!
//! Used both for the compiler and for running submissions. Every call is a
//! self-contained operation: the spawned process lives in its own process
//! group and is killed as a group when the timeout fires or output overflows.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Wall time limit exceeded, process group killed
    TimeLimitExceeded,
    /// stdout or stderr grew past the capture limit, process group killed
    OutputLimitExceeded,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Exited(0))
    }
}

#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Execution status
    pub status: ExecutionStatus,
    /// Wall time from spawn to exit (or to the kill) in milliseconds
    pub elapsed_ms: u64,
    /// Stdout content (lossy UTF-8)
    pub stdout: String,
    /// Stderr content (lossy UTF-8)
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get exit code from status (-1 if not applicable)
    pub fn exit_code(&self) -> i32 {
        match self.status {
            ExecutionStatus::Exited(code) => code,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Wall time limit
    pub timeout: Duration,
    /// Maximum bytes captured from each of stdout and stderr
    pub output_limit_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
    pub limits: ExecutionLimits,
    /// Fed to the child's stdin. `None` connects stdin to /dev/null.
    pub stdin: Option<String>,
}

impl ExecutionSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            work_dir: None,
            limits: ExecutionLimits::default(),
            stdin: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

impl Captured {
    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

enum Finish {
    Exited {
        status: ExitStatus,
        stdout: Captured,
        stderr: Captured,
    },
    Overflow {
        stdout: Captured,
        stderr: Captured,
    },
}

/// Read at most `limit` bytes, noting whether the stream had more
async fn read_capped<R: AsyncRead + Unpin>(reader: R, limit: usize) -> std::io::Result<Captured> {
    let mut bytes = Vec::new();
    let mut limited = reader.take(limit as u64 + 1);
    limited.read_to_end(&mut bytes).await?;

    let overflowed = bytes.len() > limit;
    bytes.truncate(limit);
    Ok(Captured { bytes, overflowed })
}

/// Run a program to completion under its configured limits.
///
/// Errors only for infrastructure faults (spawn failure, broken pipes on our
/// side). Timeouts, crashes and output floods are reported in the outcome.
pub async fn execute(spec: &ExecutionSpec) -> Result<ExecutionOutcome> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(dir) = &spec.work_dir {
        command.current_dir(dir);
    }

    debug!("Executing {:?} with args: {:?}", spec.program, spec.args);

    let started = Instant::now();
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {:?}", spec.program))?;
    let pid = child.id();

    // The child may never read its input; writing happens off to the side so
    // a full pipe cannot stall output collection.
    let stdin_task = match (child.stdin.take(), &spec.stdin) {
        (Some(mut pipe), Some(input)) => {
            let input = input.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    if e.kind() != ErrorKind::BrokenPipe {
                        debug!("Failed to write stdin: {}", e);
                    }
                }
            }))
        }
        _ => None,
    };

    let stdout = child.stdout.take().context("Child stdout was not captured")?;
    let stderr = child.stderr.take().context("Child stderr was not captured")?;
    let limit = spec.limits.output_limit_bytes;

    let collect = async {
        let stdout_fut = read_capped(stdout, limit);
        let stderr_fut = read_capped(stderr, limit);
        tokio::pin!(stdout_fut, stderr_fut);

        let mut out: Option<Captured> = None;
        let mut err: Option<Captured> = None;
        while out.is_none() || err.is_none() {
            tokio::select! {
                captured = &mut stdout_fut, if out.is_none() => {
                    let captured = captured?;
                    if captured.overflowed {
                        return Ok(Finish::Overflow {
                            stdout: captured,
                            stderr: err.unwrap_or_default(),
                        });
                    }
                    out = Some(captured);
                }
                captured = &mut stderr_fut, if err.is_none() => {
                    let captured = captured?;
                    if captured.overflowed {
                        return Ok(Finish::Overflow {
                            stdout: out.unwrap_or_default(),
                            stderr: captured,
                        });
                    }
                    err = Some(captured);
                }
            }
        }

        let status = child.wait().await?;
        Ok::<_, std::io::Error>(Finish::Exited {
            status,
            stdout: out.unwrap_or_default(),
            stderr: err.unwrap_or_default(),
        })
    };

    let finished = tokio::time::timeout(spec.limits.timeout, collect).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if let Some(task) = stdin_task {
        task.abort();
    }

    let outcome = match finished {
        Err(_) => {
            debug!(
                "{:?} exceeded {}ms, killing process group",
                spec.program,
                spec.limits.timeout.as_millis()
            );
            kill_process_group(pid, &mut child).await;
            ExecutionOutcome {
                status: ExecutionStatus::TimeLimitExceeded,
                elapsed_ms,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
        Ok(Err(e)) => {
            kill_process_group(pid, &mut child).await;
            return Err(e).context("Failed to collect process output");
        }
        Ok(Ok(Finish::Overflow { stdout, stderr })) => {
            debug!(
                "{:?} exceeded output limit of {} bytes, killing process group",
                spec.program, limit
            );
            kill_process_group(pid, &mut child).await;
            ExecutionOutcome {
                status: ExecutionStatus::OutputLimitExceeded,
                elapsed_ms,
                stdout: stdout.into_string(),
                stderr: stderr.into_string(),
            }
        }
        Ok(Ok(Finish::Exited {
            status,
            stdout,
            stderr,
        })) => {
            let status = match (status.code(), status.signal()) {
                (Some(code), _) => ExecutionStatus::Exited(code),
                (None, Some(sig)) => ExecutionStatus::Signaled(sig),
                (None, None) => ExecutionStatus::Exited(-1),
            };
            // Detached descendants must not outlive the run
            signal_process_group(pid);
            ExecutionOutcome {
                status,
                elapsed_ms,
                stdout: stdout.into_string(),
                stderr: stderr.into_string(),
            }
        }
    };

    debug!(
        "{:?} finished: status={:?}, elapsed_ms={}",
        spec.program, outcome.status, outcome.elapsed_ms
    );

    Ok(outcome)
}

/// SIGKILL the whole process group, then reap the direct child
async fn kill_process_group(pid: Option<u32>, child: &mut Child) {
    signal_process_group(pid);
    if let Err(e) = child.kill().await {
        debug!("Child already gone: {}", e);
    }
}

/// SIGKILL every process left in the group led by `pid`. An empty group is fine.
fn signal_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
        }
    }
}

/// Human-readable signal name, e.g. `SIGSEGV`
pub fn signal_name(sig: i32) -> String {
    Signal::try_from(sig)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", sig))
}
