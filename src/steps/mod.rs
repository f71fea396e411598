//! Steps and their status lifecycle.
//!
//! - [`Step`] - A named unit of work with a command and declared artifacts
//! - [`StepStatus`] - Where a step is in its lifecycle
//! - [`split_step_name`] - Split `flow.sub_step` names into their segments
//!
//! # Example
//!
//! ```
//! use flowkit::steps::{Step, StepStatus};
//!
//! let mut step = Step::new("pnr.place")
//!     .with_cmd("place.tcl")
//!     .with_inputs(["floorplan.def"])
//!     .with_outputs(["place.def"]);
//!
//! step.transition(StepStatus::Running).unwrap();
//! step.transition(StepStatus::Finished).unwrap();
//! assert_eq!(step.status(), StepStatus::Finished);
//! assert_eq!(step.flow(), Some("pnr"));
//! ```

pub mod status;
pub mod step;

pub use status::StepStatus;
pub use step::{flow_and_sub_dir, split_step_name, Step, STEP_DELIMITER};
