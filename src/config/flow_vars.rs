//! Layered lookup of per-step run-time variables.
//!
//! A variable is resolved for a step named `flow.sub` by looking, most
//! specific first, at:
//!
//! 1. `config[flow][sub][var]`
//! 2. `config[flow]["default"][var]`
//! 3. `config[flow][var]`
//! 4. `config["edp"][var]`
//! 5. `config[var]`
//!
//! and finally the caller's default. A step name without a delimiter has
//! no flow, so only the last two levels apply. An explicit `null` at some
//! level counts as a value and hides the levels below it.

use std::sync::Arc;

use serde_yaml::Value;

use crate::error::{FlowError, Result};
use crate::steps::split_step_name;

/// Name of the flow-wide defaults block.
pub const FLOW_DEFAULTS: &str = "default";

/// Name of the global section consulted before top-level keys.
pub const GLOBAL_SECTION: &str = "edp";

/// Read-only run configuration, shareable across worker threads.
#[derive(Debug, Clone)]
pub struct RunConfig {
    root: Arc<Value>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(Value::Mapping(Default::default()))
    }
}

impl From<Value> for RunConfig {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl RunConfig {
    pub fn new(root: Value) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// The whole underlying document.
    pub fn document(&self) -> &Value {
        &self.root
    }

    /// Resolve `var` for `step`, returning the raw value.
    pub fn get(&self, step: &str, var: &str) -> Option<&Value> {
        let (flow, sub) = split_step_name(step);

        if let Some(flow_map) = flow.and_then(|flow| mapping_at(&self.root, flow)) {
            let scoped = [sub, FLOW_DEFAULTS]
                .into_iter()
                .filter_map(|section| mapping_at(flow_map, section))
                .find_map(|section| section.get(var));
            if let Some(value) = scoped.or_else(|| flow_map.get(var)) {
                return Some(value);
            }
        }

        mapping_at(&self.root, GLOBAL_SECTION)
            .and_then(|global| global.get(var))
            .or_else(|| self.root.get(var))
    }

    /// Resolve a scalar as text. Numbers and booleans are rendered.
    pub fn get_str(&self, step: &str, var: &str) -> Option<String> {
        match self.get(step, var)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Resolve a scalar as text, falling back to `default`.
    pub fn get_str_or(&self, step: &str, var: &str, default: &str) -> String {
        self.get_str(step, var)
            .unwrap_or_else(|| default.to_string())
    }

    /// Resolve a non-negative integer. Numeric strings are accepted.
    pub fn get_u64(&self, step: &str, var: &str) -> Result<Option<u64>> {
        match self.get(step, var) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(step, var, "a non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(step, var, "a non-negative integer")),
            Some(_) => Err(invalid(step, var, "a non-negative integer")),
        }
    }

    /// Resolve a number of (possibly fractional) units such as seconds.
    pub fn get_f64(&self, step: &str, var: &str) -> Result<Option<f64>> {
        match self.get(step, var) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(step, var, "a number")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(step, var, "a number")),
            Some(_) => Err(invalid(step, var, "a number")),
        }
    }

    /// Resolve a flag.
    ///
    /// Accepts YAML booleans, integers (non-zero is true) and the strings
    /// `true`/`yes`/`on`/`1` and `false`/`no`/`off`/`0`.
    pub fn get_bool(&self, step: &str, var: &str) -> Result<Option<bool>> {
        match self.get(step, var) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64().is_some_and(|n| n != 0.0))),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" | "" => Ok(Some(false)),
                _ => Err(invalid(step, var, "a boolean")),
            },
            Some(_) => Err(invalid(step, var, "a boolean")),
        }
    }
}

fn mapping_at<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| v.is_mapping())
}

fn invalid(step: &str, var: &str, expected: &str) -> FlowError {
    FlowError::ConfigValidationError {
        message: format!("'{}' for step '{}' is not {}", var, step, expected),
    }
}
