//! Step declarations extracted from dependency documents.
//!
//! A dependency document is keyed by flow name. Each flow may carry a
//! `dependency` section mapping mode labels to ordered lists of
//! single-key mappings:
//!
//! ```yaml
//! pnr:
//!   dependency:
//!     default:
//!       - pnr.place:
//!           cmd: place.tcl
//!           in: floorplan.def
//!           out: [place.def, place.rpt]
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::config::loader::load_documents;
use crate::error::{FlowError, Result};
use crate::steps::Step;

/// Section of a flow that holds its step declarations.
pub const DEPENDENCY_SECTION: &str = "dependency";

/// A plain step record, before it becomes part of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepDeclaration {
    pub name: String,
    pub cmd: Option<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl StepDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Convert into a fresh `Init` step.
    pub fn into_step(self) -> Step {
        let step = Step::new(self.name)
            .with_inputs(self.inputs)
            .with_outputs(self.outputs);
        match self.cmd {
            Some(cmd) => step.with_cmd(cmd),
            None => step,
        }
    }
}

/// A single artifact name or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Artifacts {
    One(String),
    Many(Vec<String>),
}

impl Artifacts {
    fn into_vec(self) -> Vec<String> {
        match self {
            Artifacts::One(name) => vec![name],
            Artifacts::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeclarationBody {
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default, rename = "in")]
    inputs: Option<Artifacts>,
    #[serde(default, rename = "out")]
    outputs: Option<Artifacts>,
}

/// Extract every step declaration from a merged dependency document.
///
/// Declarations come out in document order. Entries that are not mappings
/// are ignored. A body with the wrong shape (e.g. `in` given as a mapping)
/// is a `ConfigValidationError`.
pub fn parse_declarations(document: &Value) -> Result<Vec<StepDeclaration>> {
    let mut declarations = Vec::new();

    let Some(flows) = document.as_mapping() else {
        return Ok(declarations);
    };

    for (flow, flow_body) in flows {
        let Some(modes) = flow_body
            .get(DEPENDENCY_SECTION)
            .and_then(Value::as_mapping)
        else {
            continue;
        };

        for (mode, entries) in modes {
            let Some(entries) = entries.as_sequence() else {
                debug!(
                    "Ignoring non-list dependency mode {:?} in flow {:?}",
                    mode, flow
                );
                continue;
            };

            for entry in entries.iter().filter_map(Value::as_mapping) {
                for (name, body) in entry {
                    if let Some(declaration) = parse_entry(name, body)? {
                        declarations.push(declaration);
                    }
                }
            }
        }
    }

    Ok(declarations)
}

fn parse_entry(name: &Value, body: &Value) -> Result<Option<StepDeclaration>> {
    let Some(name) = name.as_str() else {
        return Ok(None);
    };
    if !body.is_mapping() {
        debug!("Ignoring step {} without a declaration body", name);
        return Ok(None);
    }

    let body: DeclarationBody =
        serde_yaml::from_value(body.clone()).map_err(|e| FlowError::ConfigValidationError {
            message: format!("step '{}': {}", name, e),
        })?;

    Ok(Some(StepDeclaration {
        name: name.to_string(),
        cmd: body.cmd,
        inputs: body.inputs.map(Artifacts::into_vec).unwrap_or_default(),
        outputs: body.outputs.map(Artifacts::into_vec).unwrap_or_default(),
    }))
}

/// Load, merge and parse dependency documents.
pub fn load_declarations(paths: &[PathBuf]) -> Result<Vec<StepDeclaration>> {
    parse_declarations(&load_documents(paths)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merger::merge_documents;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    const PNR: &str = r#"
pnr:
  dependency:
    default:
      - pnr.place:
          cmd: place.tcl
          in: floorplan.def
          out: [place.def, place.rpt]
      - pnr.route:
          cmd: route.tcl
          in:
            - place.def
          out: route.def
"#;

    #[test]
    fn parses_steps_in_document_order() {
        let declarations = parse_declarations(&yaml(PNR)).unwrap();

        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "pnr.place");
        assert_eq!(declarations[0].cmd.as_deref(), Some("place.tcl"));
        assert_eq!(declarations[0].inputs, vec!["floorplan.def"]);
        assert_eq!(declarations[0].outputs, vec!["place.def", "place.rpt"]);
        assert_eq!(declarations[1].inputs, vec!["place.def"]);
    }

    #[test]
    fn missing_or_null_artifacts_are_empty() {
        let doc = yaml(
            r#"
sta:
  dependency:
    signoff:
      - sta.setup:
          cmd: setup.tcl
          in: ~
"#,
        );
        let declarations = parse_declarations(&doc).unwrap();

        assert!(declarations[0].inputs.is_empty());
        assert!(declarations[0].outputs.is_empty());
    }

    #[test]
    fn ignores_non_mapping_entries_and_flows_without_dependency() {
        let doc = yaml(
            r#"
edp:
  queue: normal
syn:
  dependency:
    default:
      - just_a_string
      - syn.compile: ~
      - syn.elab:
          out: elab.ddc
"#,
        );
        let declarations = parse_declarations(&doc).unwrap();

        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "syn.elab");
        assert!(declarations[0].cmd.is_none());
    }

    #[test]
    fn malformed_body_is_validation_error() {
        let doc = yaml(
            r#"
syn:
  dependency:
    default:
      - syn.compile:
          in: {nested: true}
"#,
        );
        let err = parse_declarations(&doc).unwrap_err();
        assert!(matches!(err, FlowError::ConfigValidationError { .. }));
        assert!(err.to_string().contains("syn.compile"));
    }

    #[test]
    fn merged_documents_concatenate_mode_lists() {
        let extra = yaml(
            r#"
pnr:
  dependency:
    default:
      - pnr.cts:
          in: place.def
          out: cts.def
"#,
        );
        let merged = merge_documents(&[yaml(PNR), extra]);
        let names: Vec<_> = parse_declarations(&merged)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();

        assert_eq!(names, vec!["pnr.place", "pnr.route", "pnr.cts"]);
    }

    #[test]
    fn into_step_carries_fields() {
        let step = StepDeclaration {
            name: "pnr.place".into(),
            cmd: Some("place.tcl".into()),
            inputs: vec!["a".into()],
            outputs: vec!["b".into(), "b".into()],
        }
        .into_step();

        assert_eq!(step.cmd(), Some("place.tcl"));
        assert!(step.inputs().contains("a"));
        assert_eq!(step.outputs().len(), 1);
    }
}
