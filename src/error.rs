//! Error types for flowkit operations.
//!
//! This module defines [`FlowError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Structural errors (unknown step, cycle, no path) are always returned
//!   to the caller of the graph operation
//! - Configuration errors for batch submission are recovered inside the
//!   adapter by falling back to local execution
//! - Execution errors stop at the adapter boundary; the engine turns them
//!   into a failed step instead of propagating them

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for flowkit operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Referenced step does not exist in the graph.
    #[error("Step not found: {name}")]
    StepNotFound { name: String },

    /// The graph contains a dependency cycle.
    #[error("Cycle detected among steps: {steps}")]
    CycleDetected { steps: String },

    /// No dependency path connects the two steps.
    #[error("No path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },

    /// Unrecognized step status value.
    #[error("Invalid step status: {value}")]
    InvalidState { value: String },

    /// Status change not allowed by the step lifecycle.
    #[error("Step '{step}' cannot move from {from} to {to}")]
    InvalidTransition {
        step: String,
        from: String,
        to: String,
    },

    /// Input document not found at expected location.
    #[error("File not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse an input document.
    #[error("Failed to parse {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Input document has an invalid structure.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Batch scheduler parameters are missing or malformed.
    #[error("Invalid batch configuration: {message}")]
    InvalidBatchConfig { message: String },

    /// Shell command could not be run or exited unsuccessfully.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Shell command exceeded its wall-clock limit.
    #[error("Command timed out after {seconds}s: {command}")]
    CommandTimedOut { command: String, seconds: u64 },

    /// Submission output carried no recognizable job identifier.
    #[error("No job id in submission output: {output}")]
    JobIdNotFound { output: String },

    /// Batch job did not reach a terminal state in time.
    #[error("Job {job_id} still pending after {seconds}s")]
    JobWaitTimedOut { job_id: String, seconds: u64 },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for flowkit operations.
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_not_found_displays_name() {
        let err = FlowError::StepNotFound {
            name: "pnr.place".into(),
        };
        assert!(err.to_string().contains("pnr.place"));
    }

    #[test]
    fn cycle_detected_displays_steps() {
        let err = FlowError::CycleDetected {
            steps: "a -> b -> a".into(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn no_path_displays_both_ends() {
        let err = FlowError::NoPath {
            from: "syn".into(),
            to: "drc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("syn"));
        assert!(msg.contains("drc"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = FlowError::ConfigParseError {
            path: PathBuf::from("/flow/dependency.yaml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/flow/dependency.yaml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn command_timed_out_displays_seconds() {
        let err = FlowError::CommandTimedOut {
            command: "innovus -init place.tcl".into(),
            seconds: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("30s"));
        assert!(msg.contains("innovus"));
    }

    #[test]
    fn job_wait_timed_out_displays_job() {
        let err = FlowError::JobWaitTimedOut {
            job_id: "12345".into(),
            seconds: 60,
        };
        assert!(err.to_string().contains("12345"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: FlowError = io_err.into();
        assert!(matches!(err, FlowError::Io(_)));
    }
}
