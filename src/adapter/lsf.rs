//! Batch submission to an LSF cluster.
//!
//! A job is submitted with `bsub`, its id is read from the `Job <id>` token
//! of the submission output, and it is then polled with `bjobs` until it
//! reaches `DONE` or `EXIT`. A job that `bjobs` no longer knows about is
//! looked up in `bhist`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{FlowError, Result};
use crate::shell::execute_capture;

/// Job id token in `bsub` output, e.g. `Job <4711> is submitted to queue <normal>.`
static JOB_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Job <([^>]+)>").expect("JOB_ID_REGEX must compile"));

/// Text `bhist -l` prints for a job that exited with status 0.
const HISTORY_SUCCESS: &str = "Done successfully";

/// Limit for a single `bjobs`/`bhist` query.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_QUEUE: &str = "normal";
const DEFAULT_CPU_NUM: u64 = 1;
const DEFAULT_MEMORY: u64 = 4000;
const DEFAULT_SPAN: u64 = 1;
const DEFAULT_POLL_INTERVAL: f64 = 30.0;
const DEFAULT_MAX_WAIT: f64 = 86400.0;

/// Shortest configurable interval between status queries.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Characters that force the submitted body to be quoted.
const SHELL_METACHARACTERS: &[char] = &['|', '>', '<', '&'];

/// Resources and polling settings for one batch job.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSpec {
    pub queue: String,
    pub job_name: String,
    pub cpu_num: u64,
    pub memory: u64,
    pub span: u64,
    pub log_file: PathBuf,
    pub pre_lsf: String,
    pub wait: bool,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl BatchSpec {
    /// Resolve the batch settings for `step_name`.
    ///
    /// Fails with `InvalidBatchConfig` when a value is missing its expected
    /// shape: an empty queue, zero CPUs/memory/hosts, non-numeric
    /// resources or a negative poll setting. The poll interval is raised to
    /// at least one second.
    pub fn from_config(step_name: &str, config: &RunConfig, log_file: &Path) -> Result<Self> {
        let queue = config.get_str_or(step_name, "queue", DEFAULT_QUEUE);
        if queue.trim().is_empty() {
            return Err(invalid(step_name, "queue is empty"));
        }

        let positive = |var: &str, default: u64| -> Result<u64> {
            let value = config
                .get_u64(step_name, var)
                .map_err(|e| invalid(step_name, &e.to_string()))?
                .unwrap_or(default);
            if value == 0 {
                return Err(invalid(step_name, &format!("{} must be at least 1", var)));
            }
            Ok(value)
        };

        let seconds = |var: &str, default: f64| -> Result<Duration> {
            let value = config
                .get_f64(step_name, var)
                .map_err(|e| invalid(step_name, &e.to_string()))?
                .unwrap_or(default);
            Duration::try_from_secs_f64(value)
                .map_err(|_| invalid(step_name, &format!("{} must be a non-negative number", var)))
        };

        Ok(Self {
            queue,
            job_name: step_name.to_string(),
            cpu_num: positive("cpu_num", DEFAULT_CPU_NUM)?,
            memory: positive("memory", DEFAULT_MEMORY)?,
            span: positive("span", DEFAULT_SPAN)?,
            log_file: log_file.to_path_buf(),
            pre_lsf: config.get_str_or(step_name, "pre_lsf", ""),
            wait: config
                .get_bool(step_name, "wait_lsf")
                .map_err(|e| invalid(step_name, &e.to_string()))?
                .unwrap_or(true),
            poll_interval: seconds("lsf_poll_interval", DEFAULT_POLL_INTERVAL)?
                .max(MIN_POLL_INTERVAL),
            max_wait: seconds("lsf_max_wait_time", DEFAULT_MAX_WAIT)?,
        })
    }

    /// Compose the `bsub` command that runs `local` inside `work_dir`.
    pub fn submission_command(&self, work_dir: &Path, local: &str) -> String {
        let mut parts = Vec::new();
        if !self.pre_lsf.trim().is_empty() {
            parts.push(self.pre_lsf.trim().to_string());
        }
        parts.push(format!("bsub -q {}", self.queue));
        parts.push(format!("-J {}", self.job_name));
        parts.push(format!(
            "-n {} -R \"rusage[mem={}] span[hosts={}]\"",
            self.cpu_num, self.memory, self.span
        ));
        parts.push(format!("-o {}", self.log_file.display()));

        let body = format!("cd {} && {}", work_dir.display(), local);
        if local.contains(SHELL_METACHARACTERS) {
            parts.push(format!("'{}'", body));
        } else {
            parts.push(body);
        }

        parts.join(" ")
    }
}

fn invalid(step_name: &str, message: &str) -> FlowError {
    FlowError::InvalidBatchConfig {
        message: format!("{}: {}", step_name, message),
    }
}

/// Raw output of a status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOutput {
    pub stdout: String,
    pub stderr: String,
}

/// What a status query says about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Done,
    Exit,
    /// The scheduler no longer lists the job; consult its history.
    NotFound,
    /// Any non-terminal state such as `PEND` or `RUN`.
    Active(String),
    /// Output could not be interpreted; treated as transient.
    Unknown,
}

impl JobState {
    pub fn parse(output: &StatusOutput) -> Self {
        if output.stderr.contains("not found") {
            return JobState::NotFound;
        }

        match output.stdout.split_whitespace().nth(2) {
            Some("DONE") => JobState::Done,
            Some("EXIT") => JobState::Exit,
            Some(state) => JobState::Active(state.to_string()),
            None => JobState::Unknown,
        }
    }
}

/// Extract the job id from submission output.
pub fn parse_job_id(output: &str) -> Option<String> {
    JOB_ID_REGEX
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The external batch system.
pub trait BatchScheduler: Send + Sync {
    /// Submit a job, returning the submission output.
    fn submit(&self, command: &str, cwd: &Path) -> Result<String>;

    /// Query the current state of a job.
    fn status(&self, job_id: &str) -> Result<StatusOutput>;

    /// Query the history of a job that is no longer listed.
    fn history(&self, job_id: &str) -> Result<String>;
}

/// [`BatchScheduler`] backed by the LSF command-line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsfScheduler;

impl BatchScheduler for LsfScheduler {
    fn submit(&self, command: &str, cwd: &Path) -> Result<String> {
        let result = execute_capture(command, Some(cwd), None)?;
        let output = format!("{}{}", result.stdout, result.stderr);
        if !result.success {
            warn!("Submission failed: {}", output.trim());
            return Err(FlowError::CommandFailed {
                command: command.to_string(),
                code: result.exit_code,
            });
        }
        Ok(output)
    }

    fn status(&self, job_id: &str) -> Result<StatusOutput> {
        let command = format!("bjobs -noheader {}", job_id);
        let result = execute_capture(&command, None, Some(QUERY_TIMEOUT))?;
        if result.timed_out {
            return Err(FlowError::CommandTimedOut {
                command,
                seconds: QUERY_TIMEOUT.as_secs(),
            });
        }
        Ok(StatusOutput {
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }

    fn history(&self, job_id: &str) -> Result<String> {
        let command = format!("bhist -n 1 -l {}", job_id);
        let result = execute_capture(&command, None, Some(QUERY_TIMEOUT))?;
        if result.timed_out {
            return Err(FlowError::CommandTimedOut {
                command,
                seconds: QUERY_TIMEOUT.as_secs(),
            });
        }
        Ok(result.stdout)
    }
}

/// Poll `job_id` until it finishes.
///
/// Returns whether the job succeeded. Query errors and unreadable output
/// are retried on the next poll. Running past `max_wait` is a
/// `JobWaitTimedOut` error.
pub fn wait_for_job(
    scheduler: &dyn BatchScheduler,
    job_id: &str,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<bool> {
    info!(
        job_id = %job_id,
        "Waiting for job (poll every {:?}, at most {:?})", poll_interval, max_wait
    );
    let start = Instant::now();

    loop {
        let elapsed = start.elapsed();
        if elapsed > max_wait {
            return Err(FlowError::JobWaitTimedOut {
                job_id: job_id.to_string(),
                seconds: max_wait.as_secs(),
            });
        }

        match scheduler.status(job_id).map(|out| JobState::parse(&out)) {
            Ok(JobState::Done) => {
                info!(job_id = %job_id, "Job done");
                return Ok(true);
            }
            Ok(JobState::Exit) => {
                warn!(job_id = %job_id, "Job exited abnormally");
                return Ok(false);
            }
            Ok(JobState::NotFound) => match scheduler.history(job_id) {
                Ok(history) => {
                    let done = history.contains(HISTORY_SUCCESS);
                    if done {
                        info!(job_id = %job_id, "Job finished (from history)");
                    } else {
                        warn!(job_id = %job_id, "Job not listed and history shows no success");
                    }
                    return Ok(done);
                }
                Err(e) => warn!(job_id = %job_id, "History query failed: {}", e),
            },
            Ok(JobState::Active(state)) => debug!(job_id = %job_id, "Job state {}", state),
            Ok(JobState::Unknown) => warn!(job_id = %job_id, "Could not read job state"),
            Err(e) => warn!(job_id = %job_id, "Status query failed: {}", e),
        }

        let remaining = max_wait.saturating_sub(start.elapsed());
        thread::sleep(poll_interval.min(remaining));
    }
}
