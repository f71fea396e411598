//! Wave-based execution of a step graph.
//!
//! The engine repeatedly takes the graph's ready set, runs it on a bounded
//! pool of worker threads and writes the outcomes back into the graph.
//! Steps of one wave run concurrently; a wave starts only after the
//! previous one has been fully applied.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::adapter::StepAdapter;
use crate::config::RunConfig;
use crate::error::{FlowError, Result};
use crate::graph::Graph;
use crate::steps::{Step, StepStatus};

use super::pool::run_bounded;

/// Outcome of a whole-graph run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Success of every step that was dispatched.
    pub results: BTreeMap<String, bool>,
    /// Steps left in `Init` because a failure or cycle blocked them.
    pub unreached: Vec<String>,
    /// Names dispatched in each wave, in order.
    pub waves: Vec<Vec<String>>,
    pub duration: Duration,
}

impl ExecutionReport {
    /// Every step ran and succeeded.
    pub fn success(&self) -> bool {
        self.unreached.is_empty() && self.results.values().all(|ok| *ok)
    }

    /// Steps that were dispatched and failed.
    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }
}

/// Drives step execution against a [`Graph`].
#[derive(Debug, Clone)]
pub struct Engine {
    max_parallelism: usize,
    force: bool,
    ignore_failed: bool,
    continue_on_failure: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            max_parallelism: default_parallelism(),
            force: false,
            ignore_failed: false,
            continue_on_failure: false,
        }
    }
}

fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit concurrent steps per wave (at least 1).
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    /// Run steps even when their predecessors are not done.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Treat failed predecessors as done.
    pub fn with_ignore_failed(mut self, ignore_failed: bool) -> Self {
        self.ignore_failed = ignore_failed;
        self
    }

    /// Keep scheduling waves after a failure.
    pub fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Run a single step.
    ///
    /// Fails with `StepNotFound` for an unknown name. A step whose
    /// predecessors are not done is not run and reports `false`, unless the
    /// engine forces execution.
    pub fn execute_step(
        &self,
        graph: &mut Graph,
        name: &str,
        adapter: &dyn StepAdapter,
        config: &RunConfig,
    ) -> Result<bool> {
        if !self.force && !graph.can_run(name, self.ignore_failed)? {
            warn!(step = %name, "Predecessors not done; not running");
            return Ok(false);
        }

        let step = start(graph, name)?;
        let ok = run_guarded(adapter, &step, config);
        finish(graph, name, ok);
        Ok(ok)
    }

    /// Run several steps concurrently.
    ///
    /// Every requested name gets an entry in the result; unknown names and
    /// steps that may not run yet are `false` without touching the adapter.
    pub fn execute_batch<S: AsRef<str>>(
        &self,
        graph: &mut Graph,
        names: &[S],
        adapter: &dyn StepAdapter,
        config: &RunConfig,
    ) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        let mut runnable = Vec::new();
        let mut seen = BTreeSet::new();

        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            match graph.can_run(name, self.ignore_failed) {
                Ok(ready) if ready || self.force => match start(graph, name) {
                    Ok(step) => runnable.push(step),
                    Err(e) => {
                        warn!(step = %name, "{}", e);
                        results.insert(name.to_string(), false);
                    }
                },
                Ok(_) => {
                    debug!(step = %name, "Predecessors not done; not running");
                    results.insert(name.to_string(), false);
                }
                Err(e) => {
                    warn!("{}", e);
                    results.insert(name.to_string(), false);
                }
            }
        }

        if runnable.is_empty() {
            return results;
        }

        debug!(
            "Dispatching {} step(s) on up to {} worker(s)",
            runnable.len(),
            self.max_parallelism
        );
        let outcomes = run_bounded(runnable, self.max_parallelism, |step: Step| {
            let ok = run_guarded(adapter, &step, config);
            (step.name().to_string(), ok)
        });

        for (name, ok) in outcomes {
            finish(graph, &name, ok);
            results.insert(name, ok);
        }
        results
    }

    /// Run the current ready set.
    pub fn execute_ready(
        &self,
        graph: &mut Graph,
        adapter: &dyn StepAdapter,
        config: &RunConfig,
    ) -> BTreeMap<String, bool> {
        let ready: Vec<String> = graph
            .ready_with(self.ignore_failed)
            .into_iter()
            .map(String::from)
            .collect();
        self.execute_batch(graph, &ready, adapter, config)
    }

    /// Reset the graph and run it wave by wave until nothing is ready.
    ///
    /// Without `continue_on_failure` the run stops after the first wave
    /// that had a failure.
    pub fn execute_all(
        &self,
        graph: &mut Graph,
        adapter: &dyn StepAdapter,
        config: &RunConfig,
    ) -> ExecutionReport {
        let started = Instant::now();
        let mut report = ExecutionReport::default();
        graph.reset_all();

        loop {
            let ready: Vec<String> = graph
                .ready_with(self.ignore_failed)
                .into_iter()
                .map(String::from)
                .collect();
            if ready.is_empty() {
                break;
            }

            info!("Wave {}: {}", report.waves.len() + 1, ready.join(", "));
            let results = self.execute_batch(graph, &ready, adapter, config);
            let wave_failed = results.values().any(|ok| !ok);
            report.results.extend(results);
            report.waves.push(ready);

            if wave_failed && !self.continue_on_failure {
                warn!("Stopping after failed wave");
                break;
            }
        }

        report.unreached = graph
            .with_status(StepStatus::Init)
            .into_iter()
            .map(String::from)
            .collect();
        if !report.unreached.is_empty() {
            info!("Not reached: {}", report.unreached.join(", "));
        }
        report.duration = started.elapsed();
        report
    }
}

/// Mark `name` running and hand back a copy for the worker.
fn start(graph: &mut Graph, name: &str) -> Result<Step> {
    let step = graph
        .get_mut(name)
        .ok_or_else(|| FlowError::StepNotFound {
            name: name.to_string(),
        })?;
    step.transition(StepStatus::Running)?;
    Ok(step.clone())
}

fn finish(graph: &mut Graph, name: &str, ok: bool) {
    let status = if ok {
        StepStatus::Finished
    } else {
        StepStatus::Failed
    };
    if let Some(step) = graph.get_mut(name) {
        if let Err(e) = step.transition(status) {
            warn!(step = %name, "{}", e);
            step.set_status(status);
        }
    }
}

/// Run the adapter, turning errors and panics into a failed outcome.
fn run_guarded(adapter: &dyn StepAdapter, step: &Step, config: &RunConfig) -> bool {
    let name = step.name();
    info!(step = %name, "Running");

    match panic::catch_unwind(AssertUnwindSafe(|| adapter.run(step, config))) {
        Ok(Ok(true)) => {
            info!(step = %name, "Finished");
            true
        }
        Ok(Ok(false)) => {
            error!(step = %name, "Failed");
            false
        }
        Ok(Err(e)) => {
            error!(step = %name, "Failed: {}", e);
            false
        }
        Err(payload) => {
            error!(step = %name, "Adapter panicked: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
