//! Step status state machine.

use std::fmt;
use std::str::FromStr;

use crate::error::FlowError;

/// Status of a step in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum StepStatus {
    /// Step has not run yet.
    #[default]
    Init,

    /// Step is currently executing.
    Running,

    /// Step completed successfully.
    Finished,

    /// Step was marked as skipped by the caller.
    Skipped,

    /// Step failed.
    Failed,
}

impl StepStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [StepStatus; 5] = [
        StepStatus::Init,
        StepStatus::Running,
        StepStatus::Finished,
        StepStatus::Skipped,
        StepStatus::Failed,
    ];

    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Finished | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Whether a predecessor in this state lets its successors run.
    ///
    /// Finished and skipped predecessors always do. Failed ones only count
    /// when `ignore_failed` is set.
    pub fn satisfies_dependency(&self, ignore_failed: bool) -> bool {
        match self {
            StepStatus::Finished | StepStatus::Skipped => true,
            StepStatus::Failed => ignore_failed,
            StepStatus::Init | StepStatus::Running => false,
        }
    }

    /// Lowercase name used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Init => "init",
            StepStatus::Running => "running",
            StepStatus::Finished => "finished",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| FlowError::InvalidState {
                value: s.to_string(),
            })
    }
}
