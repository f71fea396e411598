//! Loading and interpreting flowkit's YAML documents.
//!
//! - Document loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Step declaration extraction in [`declarations`]
//! - Layered per-step variable lookup in [`flow_vars`]
//!
//! # Example
//!
//! ```
//! use flowkit::config::{parse_declarations, RunConfig};
//!
//! let deps: serde_yaml::Value = serde_yaml::from_str(
//!     "syn:\n  dependency:\n    default:\n      - syn.compile:\n          out: netlist.v\n",
//! )
//! .unwrap();
//! let declarations = parse_declarations(&deps).unwrap();
//! assert_eq!(declarations[0].outputs, vec!["netlist.v"]);
//!
//! let config = RunConfig::new(serde_yaml::from_str("syn:\n  queue: long\n").unwrap());
//! assert_eq!(config.get_str_or("syn.compile", "queue", "normal"), "long");
//! ```

pub mod declarations;
pub mod flow_vars;
pub mod loader;
pub mod merger;

pub use declarations::{load_declarations, parse_declarations, StepDeclaration};
pub use flow_vars::RunConfig;
pub use loader::{load_document, load_documents};
pub use merger::{deep_merge, merge_documents};
