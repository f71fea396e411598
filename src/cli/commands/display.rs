//! Shared display helpers for step status formatting.

use std::io::{self, Write};

use console::{style, Style};

use crate::graph::Graph;
use crate::runner::ExecutionReport;
use crate::steps::StepStatus;

/// Terminal style for a step status.
pub fn status_style(status: StepStatus) -> Style {
    match status {
        StepStatus::Finished => Style::new().green(),
        StepStatus::Failed => Style::new().red().bold(),
        StepStatus::Skipped => Style::new().yellow(),
        StepStatus::Running => Style::new().cyan(),
        StepStatus::Init => Style::new().dim(),
    }
}

/// Print the outcome of a single step.
pub fn write_step_result(out: &mut dyn Write, name: &str, ok: bool) -> io::Result<()> {
    let status = if ok {
        StepStatus::Finished
    } else {
        StepStatus::Failed
    };
    writeln!(
        out,
        "Step {} {}",
        style(name).bold(),
        status_style(status).apply_to(status)
    )
}

/// Print the end-of-run summary: counts per status, then failed and
/// unreached steps.
pub fn write_summary(out: &mut dyn Write, graph: &Graph, report: &ExecutionReport) -> io::Result<()> {
    writeln!(
        out,
        "Run complete: {}/{} steps succeeded in {:.1}s",
        report.succeeded(),
        report.results.len(),
        report.duration.as_secs_f64()
    )?;

    let counts: Vec<String> = graph
        .status_summary()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(status, count)| {
            format!("{} {}", status_style(status).apply_to(status), count)
        })
        .collect();
    writeln!(out, "  {}", counts.join("  "))?;

    let failed = report.failed();
    if !failed.is_empty() {
        writeln!(
            out,
            "{} {}",
            style("Failed:").red().bold(),
            failed.join(", ")
        )?;
    }
    if !report.unreached.is_empty() {
        writeln!(
            out,
            "{} {}",
            style("Not reached:").yellow(),
            report.unreached.join(", ")
        )?;
    }
    Ok(())
}
