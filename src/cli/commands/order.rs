//! Order command implementation.
//!
//! `flowkit order` prints the sequence the declared steps would run in,
//! without running anything.

use std::io::Write;

use console::style;

use crate::cli::args::OrderArgs;
use crate::config::load_declarations;
use crate::error::{FlowError, Result};
use crate::graph::Graph;

use super::dispatcher::{Command, CommandResult, EXIT_MISSING_INPUT};

/// The order command implementation.
pub struct OrderCommand {
    args: OrderArgs,
}

impl OrderCommand {
    pub fn new(args: OrderArgs) -> Self {
        Self { args }
    }

    fn load(&self) -> Result<Graph> {
        Ok(Graph::from_declarations(load_declarations(&self.args.dependency)?))
    }

    fn write_order(&self, out: &mut dyn Write, graph: &Graph) -> Result<()> {
        let order = graph.topological_order()?;
        if self.args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&order)?)?;
            return Ok(());
        }
        let width = order.len().to_string().len();
        for (i, name) in order.iter().enumerate() {
            writeln!(out, "{:>width$}. {}", i + 1, name, width = width)?;
        }
        Ok(())
    }

    fn write_waves(&self, out: &mut dyn Write, graph: &Graph) -> Result<()> {
        let waves = graph.waves()?;
        if self.args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&waves)?)?;
            return Ok(());
        }
        for (i, wave) in waves.iter().enumerate() {
            writeln!(
                out,
                "{} {}",
                style(format!("Wave {}:", i + 1)).bold(),
                wave.join(", ")
            )?;
        }
        Ok(())
    }
}

impl Command for OrderCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let graph = match self.load() {
            Ok(graph) => graph,
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

        if self.args.waves {
            self.write_waves(out, &graph)?;
        } else {
            self.write_order(out, &graph)?;
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const DEPS: &str = r#"
syn:
  dependency:
    default:
      - syn.compile:
          out: netlist.v
pnr:
  dependency:
    default:
      - pnr.place:
          in: netlist.v
          out: placed.def
      - pnr.power:
          in: netlist.v
          out: power.rpt
      - pnr.route:
          in: [placed.def, power.rpt]
"#;

    fn order(deps: &str, waves: bool, json: bool) -> (Result<CommandResult>, String) {
        console::set_colors_enabled(false);
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deps.yml");
        fs::write(&path, deps).unwrap();

        let cmd = OrderCommand::new(OrderArgs {
            dependency: vec![path],
            waves,
            json,
        });
        let mut out = Vec::<u8>::new();
        let result = cmd.execute(&mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn prints_numbered_order() {
        let (result, out) = order(DEPS, false, false);
        assert!(result.unwrap().success);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "1. syn.compile");
        assert_eq!(lines[3], "4. pnr.route");
    }

    #[test]
    fn prints_waves() {
        let (result, out) = order(DEPS, true, false);
        assert!(result.unwrap().success);
        assert!(out.contains("Wave 1: syn.compile"));
        assert!(out.contains("Wave 2: pnr.place, pnr.power"));
        assert!(out.contains("Wave 3: pnr.route"));
    }

    #[test]
    fn prints_json_waves() {
        let (_, out) = order(DEPS, true, true);
        let waves: Vec<Vec<String>> = serde_json::from_str(&out).unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[1], vec!["pnr.place", "pnr.power"]);
    }

    #[test]
    fn cycle_is_error() {
        let deps = r#"
a:
  dependency:
    default:
      - a.one:
          in: y
          out: x
      - a.two:
          in: x
          out: y
"#;
        let (result, _) = order(deps, false, false);
        assert!(matches!(result, Err(FlowError::CycleDetected { .. })));
    }

    #[test]
    fn missing_file_exits_two() {
        let cmd = OrderCommand::new(OrderArgs {
            dependency: vec![PathBuf::from("/nonexistent/deps.yml")],
            waves: false,
            json: false,
        });
        let mut out = Vec::<u8>::new();
        let result = cmd.execute(&mut out).unwrap();
        assert_eq!(result.exit_code, EXIT_MISSING_INPUT);
    }
}
