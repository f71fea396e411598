//! Run command implementation.
//!
//! The `flowkit run` command executes a flow, or a single step of it.

use std::io::Write;
use std::path::{Path, PathBuf};

use console::style;
use tracing::{debug, info};

use crate::adapter::{IcCommandAdapter, RetryAdapter, StepAdapter};
use crate::cli::args::RunArgs;
use crate::config::{load_declarations, load_documents, RunConfig};
use crate::error::{FlowError, Result};
use crate::graph::Graph;
use crate::runner::Engine;

use super::display::{write_step_result, write_summary};
use super::dispatcher::{Command, CommandResult, EXIT_FAILURE, EXIT_MISSING_INPUT};

/// The run command implementation.
pub struct RunCommand {
    working_dir: PathBuf,
    args: RunArgs,
}

impl RunCommand {
    pub fn new(working_dir: &Path, args: RunArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            args,
        }
    }

    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Project directory: `--project-dir`, resolved against the working
    /// directory, or the working directory itself.
    pub fn project_dir(&self) -> PathBuf {
        match &self.args.project_dir {
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.clone(),
        }
    }

    fn engine(&self) -> Engine {
        let engine = Engine::new()
            .with_force(self.args.force)
            .with_continue_on_failure(self.args.continue_on_failure)
            .with_ignore_failed(self.args.ignore_failed);
        match self.args.jobs {
            Some(jobs) => engine.with_max_parallelism(jobs),
            None => engine,
        }
    }

    fn adapter(&self, project_dir: &Path) -> Box<dyn StepAdapter> {
        let adapter = IcCommandAdapter::new(project_dir).with_dry_run(self.args.dry_run);
        match self.args.retries {
            Some(retries) => Box::new(RetryAdapter::new(adapter).with_max_retries(retries)),
            None => Box::new(adapter),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.working_dir.join(path)
    }

    fn load(&self) -> Result<(Graph, RunConfig)> {
        let dependency: Vec<PathBuf> = self.args.dependency.iter().map(|p| self.resolve(p)).collect();
        let config: Vec<PathBuf> = self.args.config.iter().map(|p| self.resolve(p)).collect();

        let graph = Graph::from_declarations(load_declarations(&dependency)?);
        let config = RunConfig::new(load_documents(&config)?);
        Ok((graph, config))
    }
}

impl Command for RunCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let project_dir = self.project_dir();
        if !project_dir.is_dir() {
            writeln!(
                out,
                "{} project directory {} does not exist",
                style("Error:").red().bold(),
                project_dir.display()
            )?;
            return Ok(CommandResult::failure(EXIT_MISSING_INPUT));
        }

        let (mut graph, config) = match self.load() {
            Ok(loaded) => loaded,
            Err(FlowError::ConfigNotFound { path }) => {
                writeln!(
                    out,
                    "{} {} does not exist",
                    style("Error:").red().bold(),
                    path.display()
                )?;
                return Ok(CommandResult::failure(EXIT_MISSING_INPUT));
            }
            Err(e) => return Err(e),
        };

        // Cycles are reported before anything runs.
        let order = graph.topological_order()?;
        debug!("Execution order: {}", order.join(" -> "));

        let adapter = self.adapter(&project_dir);
        let engine = self.engine();

        if let Some(step) = &self.args.step {
            info!("Running step {}", step);
            let ok = engine.execute_step(&mut graph, step, adapter.as_ref(), &config)?;
            write_step_result(out, step, ok)?;
            return Ok(if ok {
                CommandResult::success()
            } else {
                CommandResult::failure(EXIT_FAILURE)
            });
        }

        info!("Running {} steps in {}", graph.len(), project_dir.display());
        let report = engine.execute_all(&mut graph, adapter.as_ref(), &config);
        write_summary(out, &graph, &report)?;

        Ok(if report.success() {
            CommandResult::success()
        } else {
            CommandResult::failure(EXIT_FAILURE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DEPS: &str = r#"
syn:
  dependency:
    default:
      - syn.compile:
          cmd: compile.sh
          out: netlist.v
pnr:
  dependency:
    default:
      - pnr.place:
          cmd: place.sh
          in: netlist.v
"#;

    fn project(place_body: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("deps.yml"), DEPS).unwrap();
        fs::write(temp.path().join("config.yml"), "tool_opt: sh\n").unwrap();
        for (flow, name, body) in [
            ("syn", "compile.sh", "echo netlist > netlist.v\n"),
            ("pnr", "place.sh", place_body),
        ] {
            let dir = temp.path().join("cmds").join(flow);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), body).unwrap();
        }
        temp
    }

    fn args() -> RunArgs {
        RunArgs {
            dependency: vec![PathBuf::from("deps.yml")],
            config: vec![PathBuf::from("config.yml")],
            project_dir: None,
            step: None,
            force: false,
            continue_on_failure: false,
            ignore_failed: false,
            dry_run: false,
            jobs: Some(2),
            retries: None,
        }
    }

    fn run(temp: &TempDir, args: RunArgs) -> (CommandResult, String) {
        console::set_colors_enabled(false);
        let mut out = Vec::<u8>::new();
        let result = RunCommand::new(temp.path(), args).execute(&mut out).unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn runs_whole_flow() {
        let temp = project("echo placed\n");
        let (result, out) = run(&temp, args());

        assert_eq!(result, CommandResult::success());
        assert!(out.contains("2/2 steps succeeded"));
        assert!(temp.path().join("runs/syn/compile/netlist.v").is_file());
    }

    #[test]
    fn failing_step_exits_one() {
        let temp = project("exit 1\n");
        let (result, out) = run(&temp, args());

        assert_eq!(result.exit_code, EXIT_FAILURE);
        assert!(out.contains("Failed: pnr.place"));
    }

    #[test]
    fn single_step_respects_dependencies() {
        let temp = project("echo placed\n");
        let mut args = args();
        args.step = Some("pnr.place".into());

        let (result, _) = run(&temp, args.clone());
        assert_eq!(result.exit_code, EXIT_FAILURE);

        args.force = true;
        let (result, out) = run(&temp, args);
        assert!(result.success);
        assert!(out.contains("pnr.place finished"));
    }

    #[test]
    fn unknown_step_is_error() {
        let temp = project("echo placed\n");
        let mut args = args();
        args.step = Some("pnr.route".into());

        let err = RunCommand::new(temp.path(), args)
            .execute(&mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, FlowError::StepNotFound { .. }));
    }

    #[test]
    fn missing_dependency_file_exits_two() {
        let temp = project("echo placed\n");
        let mut args = args();
        args.dependency = vec![PathBuf::from("nope.yml")];

        let (result, out) = run(&temp, args);
        assert_eq!(result.exit_code, EXIT_MISSING_INPUT);
        assert!(out.contains("nope.yml"));
    }

    #[test]
    fn missing_project_dir_exits_two() {
        let temp = project("echo placed\n");
        let mut args = args();
        args.project_dir = Some(PathBuf::from("missing"));

        let (result, _) = run(&temp, args);
        assert_eq!(result.exit_code, EXIT_MISSING_INPUT);
    }

    #[test]
    fn dry_run_executes_nothing() {
        let temp = project("exit 1\n");
        let mut args = args();
        args.dry_run = true;

        let (result, _) = run(&temp, args);
        assert!(result.success);
        assert!(!temp.path().join("runs").exists());
    }
}
