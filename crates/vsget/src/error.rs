use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsgetError {
    // Identifier errors
    #[error("Malformed extension identifier '{0}': expected <publisher>.<name>")]
    MalformedIdentifier(String),

    // Manifest errors
    #[error("Malformed extension manifest in {}: {}", .path.display(), .reason)]
    MalformedManifest { path: PathBuf, reason: String },

    // Cache errors
    #[error("Cache filename does not match <publisher>.<name>_<version>.vsix: {0}")]
    MalformedCacheFilename(String),

    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("`{}` does not appear to be a VSIX package", .0.display())]
    NotAVsix(PathBuf),

    #[error("Extension not available in cache: '{0}'")]
    NotCached(String),

    #[error("Destination is not a directory or does not exist: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Could not determine the user cache directory")]
    NoCacheDir,

    // Download errors
    #[error("Download target directory does not exist: {}", .0.display())]
    InvalidTarget(PathBuf),

    #[error("Registry lookup failed for '{extension}': {reason}")]
    RegistryUnavailable { extension: String, reason: String },

    // Spec file errors
    #[error("Spec file does not exist: {}", .0.display())]
    SpecNotFound(PathBuf),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] crate::http::HttpError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // Archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, VsgetError>;
