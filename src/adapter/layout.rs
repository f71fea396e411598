//! Per-step directory layout under the project directory.
//!
//! ```text
//! <base>/runs/<flow>/<sub>/     working directory
//! <base>/logs/<flow>/<sub>/     log files
//! <base>/rpts/<flow>/<sub>/     reports
//! <base>/data/<flow>/<sub>/     data
//! <base>/hooks/<flow>/<sub>/    hooks
//! <base>/cmds/<flow>/           command scripts, shared by the flow
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::steps::flow_and_sub_dir;

/// Resolved directories for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLayout {
    pub base: PathBuf,
    pub runs: PathBuf,
    pub logs: PathBuf,
    pub rpts: PathBuf,
    pub data: PathBuf,
    pub hooks: PathBuf,
    pub cmds: PathBuf,
    log_file: PathBuf,
}

impl StepLayout {
    pub fn new(base: &Path, step_name: &str) -> Self {
        let (flow, sub) = flow_and_sub_dir(step_name);
        let scoped = |root: &str| base.join(root).join(flow).join(sub);
        let logs = scoped("logs");
        let log_file = logs.join(format!("{}.log", step_name.replace('.', "_")));

        Self {
            base: base.to_path_buf(),
            runs: scoped("runs"),
            rpts: scoped("rpts"),
            data: scoped("data"),
            hooks: scoped("hooks"),
            cmds: base.join("cmds").join(flow),
            logs,
            log_file,
        }
    }

    /// The step's log file, `logs/<flow>/<sub>/<name with . as _>.log`.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Create every directory. Existing directories are left alone.
    pub fn ensure(&self) -> Result<()> {
        for dir in self.dirs() {
            if !dir.is_dir() {
                fs::create_dir_all(dir)?;
                debug!("Created directory {}", dir.display());
            }
        }
        Ok(())
    }

    fn dirs(&self) -> [&Path; 6] {
        [
            &self.runs,
            &self.logs,
            &self.rpts,
            &self.data,
            &self.hooks,
            &self.cmds,
        ]
    }

    /// Replace `${RUNS_DIR}`-style placeholders with this layout's paths.
    pub fn expand(&self, template: &str) -> String {
        let substitutions = [
            ("${RUNS_DIR}", &self.runs),
            ("${LOGS_DIR}", &self.logs),
            ("${RPTS_DIR}", &self.rpts),
            ("${DATA_DIR}", &self.data),
            ("${HOOKS_DIR}", &self.hooks),
            ("${CMDS_DIR}", &self.cmds),
            ("${BASE_DIR}", &self.base),
        ];

        substitutions
            .iter()
            .fold(template.to_string(), |acc, (placeholder, path)| {
                acc.replace(placeholder, &path.to_string_lossy())
            })
    }
}
