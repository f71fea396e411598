//! flowkit - Dependency-graph orchestration for IC design tool flows.
//!
//! A flow is a set of named steps (`flow.sub`) that consume and produce
//! artifacts. flowkit derives the dependency graph from those artifacts,
//! runs ready steps concurrently, and dispatches each one either as a
//! local shell command or as an LSF batch job.
//!
//! # Modules
//!
//! - [`adapter`] - Step adapters: local/LSF command execution and retries
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Dependency and run-configuration documents
//! - [`error`] - Error types and result aliases
//! - [`graph`] - Dependency graph, ordering, and subgraph algebra
//! - [`runner`] - Concurrent execution engine
//! - [`shell`] - Shell command execution
//! - [`steps`] - Step and status types
//!
//! # Example
//!
//! ```
//! use flowkit::graph::Graph;
//! use flowkit::steps::Step;
//!
//! let graph = Graph::from_steps([
//!     Step::new("syn.compile").with_outputs(["netlist.v"]),
//!     Step::new("pnr.place").with_inputs(["netlist.v"]).with_outputs(["placed.def"]),
//!     Step::new("pnr.route").with_inputs(["placed.def"]),
//! ]);
//!
//! let order = graph.topological_order().unwrap();
//! assert_eq!(order, ["syn.compile", "pnr.place", "pnr.route"]);
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod runner;
pub mod shell;
pub mod steps;

pub use error::{FlowError, Result};
