//! Reading YAML documents from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::config::merger::merge_documents;
use crate::error::{FlowError, Result};

/// Load a single document as a raw YAML value.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FlowError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            FlowError::Io(e)
        }
    })?;

    parse_document(&content, path)
}

/// Parse YAML text, attributing errors to `source_path`.
pub fn parse_document(content: &str, source_path: &Path) -> Result<Value> {
    serde_yaml::from_str(content).map_err(|e| FlowError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load several documents and deep-merge them in the given order.
pub fn load_documents(paths: &[PathBuf]) -> Result<Value> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        debug!("Loading {}", path.display());
        documents.push(load_document(path)?);
    }
    Ok(merge_documents(&documents))
}
