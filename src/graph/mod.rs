//! Dependency graph of steps.
//!
//! - [`dependency`] - The [`Graph`] itself: construction from artifacts,
//!   structural queries, ready set and topological order
//! - [`subgraph`] - Graph algebra and subgraph extraction
//!
//! # Example
//!
//! ```
//! use flowkit::graph::Graph;
//! use flowkit::steps::Step;
//!
//! let graph = Graph::from_steps([
//!     Step::new("syn.compile").with_outputs(["netlist.v"]),
//!     Step::new("pnr.place").with_inputs(["netlist.v"]).with_outputs(["place.def"]),
//!     Step::new("pnr.route").with_inputs(["place.def"]),
//! ]);
//!
//! assert_eq!(graph.roots(), vec!["syn.compile"]);
//! assert_eq!(
//!     graph.topological_order().unwrap(),
//!     vec!["syn.compile", "pnr.place", "pnr.route"]
//! );
//! ```

pub mod dependency;
pub mod subgraph;

pub use dependency::Graph;
