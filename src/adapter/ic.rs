//! Runs IC tool step scripts, locally or through the batch scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::adapter::layout::StepLayout;
use crate::adapter::lsf::{parse_job_id, wait_for_job, BatchScheduler, BatchSpec, LsfScheduler};
use crate::adapter::StepAdapter;
use crate::config::RunConfig;
use crate::error::{FlowError, Result};
use crate::shell::{execute, CommandOptions};
use crate::steps::Step;

/// A fully resolved command for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedCommand {
    Local {
        command: String,
        timeout: Option<Duration>,
    },
    Batch {
        command: String,
        spec: BatchSpec,
    },
}

impl PreparedCommand {
    pub fn command(&self) -> &str {
        match self {
            PreparedCommand::Local { command, .. } | PreparedCommand::Batch { command, .. } => {
                command
            }
        }
    }
}

/// Adapter for IC design tool steps.
///
/// A step's `cmd` names a script under `cmds/<flow>/`. It runs in the
/// step's `runs/` directory with output going to its log file, either as
/// a local process or as a batch job when the `lsf` variable is set.
#[derive(Clone)]
pub struct IcCommandAdapter {
    base_dir: PathBuf,
    dry_run: bool,
    scheduler: Arc<dyn BatchScheduler>,
}

impl std::fmt::Debug for IcCommandAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcCommandAdapter")
            .field("base_dir", &self.base_dir)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl IcCommandAdapter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            dry_run: false,
            scheduler: Arc::new(LsfScheduler),
        }
    }

    /// Only log the resolved commands.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn BatchScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn layout(&self, step: &Step) -> StepLayout {
        StepLayout::new(&self.base_dir, step.name())
    }

    /// Resolve the command a step would run, with placeholders expanded.
    ///
    /// Batch mode falls back to local execution when its settings are
    /// invalid.
    pub fn prepare(
        &self,
        step: &Step,
        cmd: &str,
        config: &RunConfig,
        layout: &StepLayout,
    ) -> Result<PreparedCommand> {
        let name = step.name();
        let local = local_command(name, cmd, config);

        let batch = config.get_bool(name, "lsf").map_err(|e| FlowError::InvalidBatchConfig {
            message: e.to_string(),
        });
        let batch = batch.and_then(|enabled| {
            enabled
                .unwrap_or(false)
                .then(|| BatchSpec::from_config(name, config, layout.log_file()))
                .transpose()
        });

        let prepared = match batch {
            Ok(Some(spec)) => PreparedCommand::Batch {
                command: layout.expand(&spec.submission_command(&layout.runs, &local)),
                spec,
            },
            Ok(None) => self.prepare_local(name, &local, config, layout)?,
            Err(e) => {
                warn!(step = %name, "{}; running locally", e);
                self.prepare_local(name, &local, config, layout)?
            }
        };
        Ok(prepared)
    }

    fn prepare_local(
        &self,
        name: &str,
        local: &str,
        config: &RunConfig,
        layout: &StepLayout,
    ) -> Result<PreparedCommand> {
        let timeout = match config.get_f64(name, "timeout")? {
            Some(seconds) if seconds > 0.0 => Some(Duration::try_from_secs_f64(seconds).map_err(
                |_| FlowError::ConfigValidationError {
                    message: format!("timeout for step '{}' is out of range", name),
                },
            )?),
            _ => None,
        };
        Ok(PreparedCommand::Local {
            command: layout.expand(local),
            timeout,
        })
    }

    fn execute(&self, step: &Step, cmd: &str, config: &RunConfig) -> Result<bool> {
        let name = step.name();
        let layout = self.layout(step);
        let prepared = self.prepare(step, cmd, config, &layout)?;

        info!(step = %name, "Command: {}", prepared.command());
        debug!(step = %name, "Working directory: {}", layout.runs.display());
        debug!(step = %name, "Log file: {}", layout.log_file().display());

        if self.dry_run {
            info!(step = %name, "[dry run] would run in {}", layout.runs.display());
            return Ok(true);
        }

        layout.ensure()?;

        match prepared {
            PreparedCommand::Local { command, timeout } => {
                self.run_local(name, &command, &layout, timeout)
            }
            PreparedCommand::Batch { command, spec } => self.run_batch(name, &command, &spec),
        }
    }

    fn run_local(
        &self,
        name: &str,
        command: &str,
        layout: &StepLayout,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        match timeout {
            Some(limit) => debug!(step = %name, "Timeout {:?}", limit),
            None => debug!(step = %name, "No timeout"),
        }

        let options = CommandOptions {
            cwd: Some(layout.runs.clone()),
            log_file: Some(layout.log_file().to_path_buf()),
            timeout,
            ..Default::default()
        };
        let result = execute(command, &options)?;

        if result.timed_out {
            error!(step = %name, "Timed out after {:?}", result.duration);
            Ok(false)
        } else if result.success {
            info!(step = %name, "Finished in {:.1}s", result.duration.as_secs_f64());
            Ok(true)
        } else {
            error!(step = %name, "Exited with code {:?}", result.exit_code);
            Ok(false)
        }
    }

    fn run_batch(&self, name: &str, command: &str, spec: &BatchSpec) -> Result<bool> {
        let output = self.scheduler.submit(command, &self.base_dir)?;

        let job_id = parse_job_id(&output).ok_or_else(|| FlowError::JobIdNotFound {
            output: output.trim().to_string(),
        })?;
        info!(step = %name, job_id = %job_id, "Submitted");

        if !spec.wait {
            info!(step = %name, job_id = %job_id, "Not waiting for job");
            return Ok(true);
        }

        wait_for_job(
            self.scheduler.as_ref(),
            &job_id,
            spec.poll_interval,
            spec.max_wait,
        )
    }
}

/// `[tool_opt ]${CMDS_DIR}/<cmd>`
pub fn local_command(step_name: &str, cmd: &str, config: &RunConfig) -> String {
    let script = format!("${{CMDS_DIR}}/{}", cmd);
    let tool_opt = config.get_str_or(step_name, "tool_opt", "");
    if tool_opt.trim().is_empty() {
        script
    } else {
        format!("{} {}", tool_opt.trim(), script)
    }
}

impl StepAdapter for IcCommandAdapter {
    fn run(&self, step: &Step, config: &RunConfig) -> Result<bool> {
        let Some(cmd) = step.cmd() else {
            warn!(step = %step.name(), "No command; nothing to run");
            return Ok(true);
        };

        match self.execute(step, cmd, config) {
            Ok(success) => Ok(success),
            Err(e) => {
                error!(step = %step.name(), "{}", e);
                Ok(false)
            }
        }
    }
}
