//! Zip bundling of the download directory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Bundle every file in `dir` into `zipped_extensions.zip` next to it,
/// returning the bundle path.
pub fn zip_directory(dir: &Path) -> Result<PathBuf> {
    let parent = dir.parent().filter(|p| !p.as_os_str().is_empty());
    let bundle_path = parent
        .unwrap_or_else(|| Path::new("."))
        .join("zipped_extensions.zip");

    let mut files: Vec<PathBuf> = dir
        .read_dir()
        .with_context(|| format!("Could not read '{}'", dir.display()))?
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut writer = ZipWriter::new(
        File::create(&bundle_path)
            .with_context(|| format!("Could not create '{}'", bundle_path.display()))?,
    );
    let options = SimpleFileOptions::default();

    for file in &files {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(name, options)?;

        let mut input = File::open(file)?;
        io::copy(&mut input, &mut writer)?;
    }

    writer.finish()?;
    Ok(bundle_path)
}
