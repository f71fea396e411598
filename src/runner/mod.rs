//! Step execution orchestration.
//!
//! # Example
//!
//! ```
//! use flowkit::config::RunConfig;
//! use flowkit::graph::Graph;
//! use flowkit::runner::Engine;
//! use flowkit::steps::{Step, StepStatus};
//!
//! let mut graph = Graph::from_steps([
//!     Step::new("syn.compile").with_outputs(["netlist.v"]),
//!     Step::new("pnr.place").with_inputs(["netlist.v"]),
//! ]);
//! let adapter = |_: &Step, _: &RunConfig| -> flowkit::Result<bool> { Ok(true) };
//!
//! let report = Engine::new().execute_all(&mut graph, &adapter, &RunConfig::default());
//! assert!(report.success());
//! assert_eq!(graph.get("pnr.place").unwrap().status(), StepStatus::Finished);
//! ```

pub mod engine;
mod pool;

pub use crate::adapter::StepAdapter;
pub use engine::{Engine, ExecutionReport};
