//! Dependency extraction from VSIX packages.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use serde::Deserialize;
use zip::result::ZipError;

use crate::extension::ExtensionId;
use crate::{Result, VsgetError};

/// Well-known manifest entry inside every VSIX package.
pub const MANIFEST_ENTRY: &str = "extension/package.json";

#[derive(Debug, Deserialize)]
struct ExtensionManifest {
    #[serde(default, rename = "extensionDependencies")]
    extension_dependencies: Vec<String>,
}

/// Read the extension IDs a VSIX package declares as dependencies.
///
/// Every VSIX should carry an `extension/package.json` describing the
/// extension; dependencies, if any, are declared in an
/// `extensionDependencies` field as a list of extension ID strings.
/// A package without the manifest entry, or without the field, simply has
/// no dependencies. A manifest that exists but cannot be parsed is an
/// error, as is a malformed declared ID.
pub fn extract_dependencies(vsix: &Path) -> Result<HashSet<ExtensionId>> {
    let file = File::open(vsix)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    // Pull the manifest out into a scratch dir; the TempDir guard removes
    // it again on every exit path.
    let scratch = tempfile::tempdir()?;
    let extracted = scratch.path().join("package.json");
    {
        let mut entry = match archive.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = File::create(&extracted)?;
        io::copy(&mut entry, &mut out)?;
    }

    let content = std::fs::read_to_string(&extracted)?;
    let manifest: ExtensionManifest =
        serde_json::from_str(&content).map_err(|e| VsgetError::MalformedManifest {
            path: vsix.to_path_buf(),
            reason: e.to_string(),
        })?;

    manifest
        .extension_dependencies
        .iter()
        .map(|id| id.parse())
        .collect()
}
