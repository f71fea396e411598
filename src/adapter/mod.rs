//! Adapters that perform a step's side effect.
//!
//! The engine only knows about [`StepAdapter`]: something that runs one
//! step under a resolved [`RunConfig`] and reports success. This module
//! provides the IC command adapter, which runs step scripts locally or
//! through an LSF cluster, and a retry wrapper for any adapter.
//!
//! - [`layout`] - Per-step directory layout and placeholder expansion
//! - [`ic`] - Local and batch execution of step commands
//! - [`lsf`] - Batch scheduler protocol and job polling
//! - [`retry`] - Re-running a failed adapter

pub mod ic;
pub mod layout;
pub mod lsf;
pub mod retry;

pub use ic::IcCommandAdapter;
pub use layout::StepLayout;
pub use lsf::{BatchScheduler, BatchSpec, JobState, LsfScheduler};
pub use retry::RetryAdapter;

use crate::config::RunConfig;
use crate::error::Result;
use crate::steps::Step;

/// Runs a single step.
///
/// `Ok(false)` and `Err(_)` both mean the step failed; the engine marks it
/// failed either way and never propagates the error.
pub trait StepAdapter: Send + Sync {
    fn run(&self, step: &Step, config: &RunConfig) -> Result<bool>;
}

impl<F> StepAdapter for F
where
    F: Fn(&Step, &RunConfig) -> Result<bool> + Send + Sync,
{
    fn run(&self, step: &Step, config: &RunConfig) -> Result<bool> {
        self(step, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_adapters() {
        let adapter = |step: &Step, _: &RunConfig| -> Result<bool> { Ok(step.name() != "bad") };
        let config = RunConfig::default();

        assert!(adapter.run(&Step::new("good"), &config).unwrap());
        assert!(!adapter.run(&Step::new("bad"), &config).unwrap());
    }

    #[test]
    fn boxed_adapters_run_through_deref() {
        let adapter: Box<dyn StepAdapter> =
            Box::new(|_: &Step, _: &RunConfig| -> Result<bool> { Ok(true) });
        assert!(adapter.run(&Step::new("a"), &RunConfig::default()).unwrap());
    }
}
