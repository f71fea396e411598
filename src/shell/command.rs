//! Shell command execution.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{FlowError, Result};

/// How often a running child is checked against its timeout.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output, when captured.
    pub stdout: String,

    /// Standard error, when captured.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,

    /// Whether the command was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl CommandResult {
    fn finished(status: ExitStatus, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: status.code(),
            stdout,
            stderr,
            duration,
            success: status.success(),
            timed_out: false,
        }
    }

    fn timed_out(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: None,
            stdout,
            stderr,
            duration,
            success: false,
            timed_out: true,
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Capture stdout and stderr into the result. Ignored when `log_file`
    /// is set.
    pub capture: bool,

    /// Append combined stdout and stderr to this file.
    pub log_file: Option<PathBuf>,

    /// Wall-clock limit (None = no timeout).
    pub timeout: Option<Duration>,
}

/// Execute a command through `sh -c`.
///
/// A non-zero exit is reported in the result, not as an error. Errors are
/// reserved for failing to start the command or to open its log file.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).stdin(Stdio::null());

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    let capture = match &options.log_file {
        Some(path) => {
            let log = open_log(path)?;
            cmd.stdout(log.try_clone()?);
            cmd.stderr(log);
            false
        }
        None if options.capture => {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            true
        }
        None => false,
    };

    debug!("Running: {}", command);
    let mut child = cmd.spawn().map_err(|e| {
        warn!("Failed to start '{}': {}", command, e);
        FlowError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    let readers = capture.then(|| (drain(child.stdout.take()), drain(child.stderr.take())));

    let status = wait(&mut child, options.timeout)?;

    // Grandchildren of a killed shell may still hold the pipes open, so
    // readers are only joined for commands that exited on their own.
    let (stdout, stderr) = match (status, readers) {
        (Some(_), Some((out, err))) => (join(out), join(err)),
        _ => (String::new(), String::new()),
    };

    let duration = start.elapsed();
    Ok(match status {
        Some(status) => CommandResult::finished(status, stdout, stderr, duration),
        None => CommandResult::timed_out(stdout, stderr, duration),
    })
}

/// Execute a command and capture its output as text.
pub fn execute_capture(
    command: &str,
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<CommandResult> {
    let options = CommandOptions {
        cwd: cwd.map(Path::to_path_buf),
        capture: true,
        timeout,
        ..Default::default()
    };
    execute(command, &options)
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut source| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = source.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Wait for the child, killing it once `timeout` has elapsed.
///
/// Returns `None` when the child was killed. A timeout too large to
/// represent as a deadline waits without limit.
fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(deadline) = timeout.and_then(|t| Instant::now().checked_add(t)) else {
        return Ok(Some(child.wait()?));
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(WAIT_POLL.min(deadline - now));
    }
}
