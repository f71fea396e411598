//! The step entity: identity, command, declared artifacts and status.

use std::collections::BTreeSet;

use crate::error::{FlowError, Result};

use super::status::StepStatus;

/// Delimiter between the flow segment and the sub-step segment of a name.
pub const STEP_DELIMITER: char = '.';

/// Split a step name into its flow and sub-step segments.
///
/// Splits on the first delimiter only. A name without a delimiter has no
/// flow and the whole name is the sub-step.
///
/// ```
/// use flowkit::steps::split_step_name;
///
/// assert_eq!(split_step_name("pnr.place.opt"), (Some("pnr"), "place.opt"));
/// assert_eq!(split_step_name("drc"), (None, "drc"));
/// ```
pub fn split_step_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(STEP_DELIMITER) {
        Some((flow, sub)) => (Some(flow), sub),
        None => (None, name),
    }
}

/// Flow and sub-step directory names used for a step's on-disk layout.
///
/// Unlike [`split_step_name`], a name without a delimiter uses the whole
/// name for both segments.
///
/// ```
/// use flowkit::steps::flow_and_sub_dir;
///
/// assert_eq!(flow_and_sub_dir("pnr.place"), ("pnr", "place"));
/// assert_eq!(flow_and_sub_dir("drc"), ("drc", "drc"));
/// ```
pub fn flow_and_sub_dir(name: &str) -> (&str, &str) {
    match split_step_name(name) {
        (Some(flow), sub) => (flow, sub),
        (None, whole) => (whole, whole),
    }
}

/// A named unit of work in the dependency graph.
///
/// Structural fields are fixed once the step is built; only the status
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    cmd: Option<String>,
    inputs: BTreeSet<String>,
    outputs: BTreeSet<String>,
    status: StepStatus,
}

impl Step {
    /// Create a step with no command and no artifacts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: None,
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            status: StepStatus::Init,
        }
    }

    /// Set the command reference.
    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    /// Add declared input artifacts.
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Add declared output artifacts.
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    pub fn inputs(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeSet<String> {
        &self.outputs
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Flow segment of the name, if it has one.
    pub fn flow(&self) -> Option<&str> {
        split_step_name(&self.name).0
    }

    /// Sub-step segment of the name (the whole name when there is no flow).
    pub fn sub_step(&self) -> &str {
        split_step_name(&self.name).1
    }

    /// Set the status unconditionally.
    ///
    /// Used for caller-driven changes such as marking a step skipped.
    pub fn set_status(&mut self, status: StepStatus) {
        self.status = status;
    }

    /// Set the status from its textual name.
    pub fn set_status_str(&mut self, status: &str) -> Result<()> {
        self.status = status.parse()?;
        Ok(())
    }

    /// Move along the execution lifecycle.
    ///
    /// `Running` can be entered from any other state, `Finished` and
    /// `Failed` only from `Running`. `Init` and `Skipped` are always allowed.
    pub fn transition(&mut self, to: StepStatus) -> Result<()> {
        let allowed = match to {
            StepStatus::Init | StepStatus::Skipped => true,
            StepStatus::Running => self.status != StepStatus::Running,
            StepStatus::Finished | StepStatus::Failed => self.status == StepStatus::Running,
        };

        if !allowed {
            return Err(FlowError::InvalidTransition {
                step: self.name.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.status = to;
        Ok(())
    }

    /// Reset the status to `Init`.
    pub fn reset(&mut self) {
        self.status = StepStatus::Init;
    }

    /// Union another declaration's artifacts into this step.
    pub fn merge_artifacts(&mut self, other: &Step) {
        self.inputs.extend(other.inputs.iter().cloned());
        self.outputs.extend(other.outputs.iter().cloned());
        if self.cmd.is_none() {
            self.cmd.clone_from(&other.cmd);
        }
    }
}
