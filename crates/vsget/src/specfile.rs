//! Seed lists from JSON spec files.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::extension::ExtensionId;
use crate::{Result, VsgetError};

#[derive(Debug, Deserialize)]
struct SpecFile {
    #[serde(default)]
    extensions: Vec<String>,
}

/// Load extension IDs from a JSON spec file.
///
/// Extension IDs are provided by an `"extensions"` field as a list of
/// strings, e.g.:
///
/// ```json
/// {
///     "extensions": [
///         "ms-python.python",
///         "ms-python.vscode-pylance"
///     ]
/// }
/// ```
///
/// A file without the field reads as an empty list.
pub fn load_spec_file(path: &Path) -> Result<Vec<ExtensionId>> {
    if !path.exists() {
        return Err(VsgetError::SpecNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let spec: SpecFile = serde_json::from_str(&content)?;

    spec.extensions.iter().map(|id| id.parse()).collect()
}
