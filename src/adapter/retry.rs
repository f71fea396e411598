//! Re-running a failing adapter.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::adapter::StepAdapter;
use crate::config::RunConfig;
use crate::error::Result;
use crate::steps::Step;

const DEFAULT_MAX_RETRIES: u64 = 3;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Wraps an adapter and runs it up to `max_retries` times in total.
///
/// The per-step variables `max_retries` and `retry_interval` (seconds)
/// override the wrapper's own settings. An error from the inner adapter
/// counts as a failed attempt.
#[derive(Debug, Clone)]
pub struct RetryAdapter<A> {
    inner: A,
    max_retries: u64,
    interval: Duration,
}

impl<A: StepAdapter> RetryAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            max_retries: DEFAULT_MAX_RETRIES,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u64) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn settings(&self, step: &str, config: &RunConfig) -> (u64, Duration) {
        let attempts = match config.get_u64(step, "max_retries") {
            Ok(value) => value.unwrap_or(self.max_retries),
            Err(e) => {
                warn!(step = %step, "{}; using {}", e, self.max_retries);
                self.max_retries
            }
        };
        let interval = match config.get_f64(step, "retry_interval") {
            Ok(Some(seconds)) => Duration::try_from_secs_f64(seconds).unwrap_or(self.interval),
            Ok(None) => self.interval,
            Err(e) => {
                warn!(step = %step, "{}; using {:?}", e, self.interval);
                self.interval
            }
        };
        (attempts.max(1), interval)
    }
}

impl<A: StepAdapter> StepAdapter for RetryAdapter<A> {
    fn run(&self, step: &Step, config: &RunConfig) -> Result<bool> {
        let (attempts, interval) = self.settings(step.name(), config);

        for attempt in 1..=attempts {
            info!(step = %step.name(), "Attempt {}/{}", attempt, attempts);

            match self.inner.run(step, config) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => warn!(step = %step.name(), "Attempt {} errored: {}", attempt, e),
            }

            if attempt < attempts {
                warn!(step = %step.name(), "Failed; retrying in {:?}", interval);
                thread::sleep(interval);
            }
        }

        error!(step = %step.name(), "Still failing after {} attempts", attempts);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn flaky(succeed_on: usize, calls: &AtomicUsize) -> impl StepAdapter + '_ {
        move |_: &Step, _: &RunConfig| -> Result<bool> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                return Err(FlowError::CommandFailed {
                    command: "tool".into(),
                    code: None,
                });
            }
            Ok(n >= succeed_on)
        }
    }

    #[test]
    fn succeeds_on_later_attempt() {
        let calls = AtomicUsize::new(0);
        let adapter = RetryAdapter::new(flaky(3, &calls))
            .with_max_retries(5)
            .with_interval(Duration::ZERO);

        assert!(adapter.run(&Step::new("a"), &RunConfig::default()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let calls = AtomicUsize::new(0);
        let adapter = RetryAdapter::new(flaky(10, &calls))
            .with_max_retries(2)
            .with_interval(Duration::ZERO);

        assert!(!adapter.run(&Step::new("a"), &RunConfig::default()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn config_overrides_attempts() {
        let calls = AtomicUsize::new(0);
        let adapter = RetryAdapter::new(flaky(10, &calls)).with_interval(Duration::ZERO);
        let config = RunConfig::new(
            serde_yaml::from_str("syn:\n  max_retries: 4\n  retry_interval: 0\n").unwrap(),
        );

        assert!(!adapter.run(&Step::new("syn.compile"), &config).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_retries_still_runs_once() {
        let calls = AtomicUsize::new(0);
        let adapter = RetryAdapter::new(flaky(1, &calls)).with_max_retries(0);

        assert!(!adapter.run(&Step::new("a"), &RunConfig::default()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
