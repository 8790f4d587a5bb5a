use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::extension::ExtensionId;
use crate::{Result, VsgetError};

/// Recognized file extension for cached packages.
pub const VSIX_EXTENSION: &str = "vsix";

pub(crate) const MEGABYTE: u64 = 1 << 20;

/// Convert a byte count to megabytes.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / MEGABYTE as f64
}

/// One cached VSIX package.
///
/// `created_at` and `size_bytes` are read from the filesystem when the
/// entry is built, so they always reflect the real file at that moment.
#[derive(Debug, Clone)]
pub struct CachedVsix {
    extension: ExtensionId,
    version: String,
    created_at: SystemTime,
    path: PathBuf,
    size_bytes: u64,
}

impl CachedVsix {
    /// Build an entry from a `<publisher>.<name>_<version>.vsix` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VsgetError::NotFound(path.to_path_buf()));
        }

        let is_vsix = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(VSIX_EXTENSION));
        if !is_vsix {
            return Err(VsgetError::NotAVsix(path.to_path_buf()));
        }

        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let (id_part, version) = match stem.split_once('_') {
            Some((id_part, version)) if !version.is_empty() && !version.contains('_') => {
                (id_part, version)
            }
            _ => return Err(VsgetError::MalformedCacheFilename(stem.to_string())),
        };
        let extension: ExtensionId = id_part.parse()?;

        let metadata = path.metadata()?;

        Ok(Self {
            extension,
            version: version.to_string(),
            created_at: metadata.modified()?,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }

    pub fn extension(&self) -> &ExtensionId {
        &self.extension
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_megabytes(&self) -> f64 {
        bytes_to_megabytes(self.size_bytes)
    }

    /// Canonical file name for this entry.
    pub fn file_name(&self) -> String {
        format!("{}_{}.{}", self.extension, self.version, VSIX_EXTENSION)
    }
}

impl fmt::Display for CachedVsix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{} ({:.2} MB)",
            self.extension,
            self.version,
            self.size_megabytes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = CachedVsix::from_path(&temp.path().join("a.b_1.0.0.vsix"));
        assert!(matches!(result, Err(VsgetError::NotFound(_))));
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.b_1.0.0.zip");
        std::fs::write(&path, b"data").unwrap();

        let result = CachedVsix::from_path(&path);
        assert!(matches!(result, Err(VsgetError::NotAVsix(_))));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.b_1.0.0.VSIX");
        std::fs::write(&path, b"data").unwrap();

        let entry = CachedVsix::from_path(&path).unwrap();
        assert_eq!(entry.version(), "1.0.0");
    }

    #[test]
    fn test_stem_without_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.b.vsix");
        std::fs::write(&path, b"data").unwrap();

        let result = CachedVsix::from_path(&path);
        assert!(matches!(result, Err(VsgetError::MalformedCacheFilename(_))));
    }

    #[test]
    fn test_stem_with_extra_separator_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.b_1.0.0_extra.vsix");
        std::fs::write(&path, b"data").unwrap();

        let result = CachedVsix::from_path(&path);
        assert!(matches!(result, Err(VsgetError::MalformedCacheFilename(_))));
    }

    #[test]
    fn test_malformed_id_part_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nodots_1.0.0.vsix");
        std::fs::write(&path, b"data").unwrap();

        let result = CachedVsix::from_path(&path);
        assert!(matches!(result, Err(VsgetError::MalformedIdentifier(_))));
    }

    #[test]
    fn test_fields_come_from_the_filesystem() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ms-python.python_2024.4.1.vsix");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();

        let entry = CachedVsix::from_path(&path).unwrap();
        assert_eq!(entry.extension(), &ExtensionId::new("ms-python", "python"));
        assert_eq!(entry.version(), "2024.4.1");
        assert_eq!(entry.size_bytes(), 1024);
        assert_eq!(entry.path(), path);
        assert_eq!(entry.file_name(), "ms-python.python_2024.4.1.vsix");
    }

    #[test]
    fn test_display_includes_id_version_and_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.b_1.0.0.vsix");
        std::fs::write(&path, vec![0u8; MEGABYTE as usize / 2]).unwrap();

        let entry = CachedVsix::from_path(&path).unwrap();
        assert_eq!(entry.to_string(), "a.b_1.0.0 (0.50 MB)");
    }
}
