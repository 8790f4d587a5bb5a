//! Size-bounded local cache of downloaded VSIX packages.
//!
//! The cache directory itself is the index: a flat directory of
//! `<publisher>.<name>_<version>.vsix` files, re-scanned on every open.
//! The in-memory map is always reconstructible from that scan, so no
//! separate index file exists to drift out of sync.

mod entry;

pub use entry::{bytes_to_megabytes, CachedVsix, VSIX_EXTENSION};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::extension::ExtensionId;
use crate::{Result, VsgetError};

/// Default cache budget, in megabytes.
pub const DEFAULT_CACHE_MAX_SIZE_MB: u64 = 512;

/// Directory-backed cache of VSIX packages, at most one version per
/// extension.
///
/// After every insertion the cache prunes itself back under its size
/// budget, evicting oldest entries first.
pub struct VsixCache {
    directory: PathBuf,
    max_size_mb: u64,
    entries: HashMap<ExtensionId, CachedVsix>,
}

impl VsixCache {
    /// Open the cache at the platform user cache directory.
    pub fn open_default(max_size_mb: u64) -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "vsget")
            .ok_or(VsgetError::NoCacheDir)?;
        Self::open(dirs.cache_dir(), max_size_mb)
    }

    /// Open a cache rooted at `directory`.
    ///
    /// A missing directory is created (parents included) and starts empty.
    /// An existing one is scanned and every `*.vsix` file parsed into an
    /// entry; the scan is filename-sorted, so a directory holding two
    /// files for one extension resolves deterministically (last parsed
    /// wins).
    pub fn open(directory: impl Into<PathBuf>, max_size_mb: u64) -> Result<Self> {
        let directory = directory.into();
        let mut entries = HashMap::new();

        if directory.exists() {
            let mut files: Vec<PathBuf> = fs::read_dir(&directory)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|dir_entry| dir_entry.path())
                .filter(|path| {
                    path.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(VSIX_EXTENSION))
                })
                .collect();
            files.sort();

            for file in files {
                let entry = CachedVsix::from_path(&file)?;
                entries.insert(entry.extension().clone(), entry);
            }
        } else {
            fs::create_dir_all(&directory)?;
        }

        Ok(Self {
            directory,
            max_size_mb,
            entries,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, extension: &ExtensionId) -> bool {
        self.entries.contains_key(extension)
    }

    pub fn get(&self, extension: &ExtensionId) -> Option<&CachedVsix> {
        self.entries.get(extension)
    }

    /// Version currently cached for `extension`, if any.
    pub fn cached_version(&self, extension: &ExtensionId) -> Option<&str> {
        self.entries.get(extension).map(|entry| entry.version())
    }

    /// Entries sorted by extension ID, for stable listings.
    pub fn entries(&self) -> Vec<&CachedVsix> {
        let mut entries: Vec<&CachedVsix> = self.entries.values().collect();
        entries.sort_by(|a, b| a.extension().cmp(b.extension()));
        entries
    }

    fn size_bytes(&self) -> u64 {
        self.entries.values().map(|entry| entry.size_bytes()).sum()
    }

    /// Current cache size, in megabytes.
    pub fn size_megabytes(&self) -> f64 {
        bytes_to_megabytes(self.size_bytes())
    }

    /// Copy the package at `source` into the cache.
    ///
    /// Inserting a version that is already cached is a no-op unless
    /// `force` is set. Any other cached version of the same extension is
    /// replaced, so the cache never holds two versions of one extension.
    pub fn insert(&mut self, source: &Path, force: bool) -> Result<()> {
        let incoming = CachedVsix::from_path(source)?;

        if let Some(existing) = self.entries.get(incoming.extension()) {
            if existing.version() == incoming.version() && !force {
                log::debug!("'{incoming}' already cached, skipping copy");
                return Ok(());
            }

            // Only the latest release is ever downloaded, so whatever is
            // being inserted supersedes the cached version.
            let superseded = incoming.extension().clone();
            self.remove(&superseded)?;
        }

        let dest = self.directory.join(incoming.file_name());
        copy_preserving_mtime(source, &dest)?;

        let entry = CachedVsix::from_path(&dest)?;
        self.entries.insert(entry.extension().clone(), entry);

        self.prune()?;
        Ok(())
    }

    /// Evict oldest entries until the cache fits its size budget.
    ///
    /// Returns the number of bytes freed. Whole files are evicted, so the
    /// freed amount can overshoot what was needed.
    pub fn prune(&mut self) -> Result<u64> {
        let size_mb = self.size_megabytes();
        if size_mb <= self.max_size_mb as f64 {
            return Ok(0);
        }

        log::info!(
            "Cache size exceeded ({size_mb:.2} MB > {} MB), pruning",
            self.max_size_mb
        );
        let bytes_needed =
            ((size_mb - self.max_size_mb as f64) * entry::MEGABYTE as f64) as u64;

        // Oldest first, tie-broken on the ID so eviction order is stable.
        let mut by_age: Vec<(std::time::SystemTime, ExtensionId, u64)> = self
            .entries
            .values()
            .map(|entry| {
                (
                    entry.created_at(),
                    entry.extension().clone(),
                    entry.size_bytes(),
                )
            })
            .collect();
        by_age.sort();

        let mut freed = 0u64;
        for (_, extension, size_bytes) in by_age {
            if freed >= bytes_needed {
                break;
            }
            self.remove(&extension)?;
            freed += size_bytes;
        }

        Ok(freed)
    }

    /// Remove `extension` from the cache, deleting its backing file.
    ///
    /// Removing an extension that is not cached is a no-op; the return
    /// value says whether anything was actually removed.
    pub fn remove(&mut self, extension: &ExtensionId) -> Result<bool> {
        let Some(entry) = self.entries.remove(extension) else {
            log::debug!("Extension not in cache: '{extension}'");
            return Ok(false);
        };

        fs::remove_file(entry.path())?;
        log::debug!("Removed '{entry}' from cache");
        Ok(true)
    }

    /// Delete every cached package.
    pub fn purge(&mut self) -> Result<()> {
        for entry in self.entries.values() {
            fs::remove_file(entry.path())?;
        }
        self.entries.clear();
        Ok(())
    }

    /// Copy the cached package for `extension` into the `destination`
    /// directory, returning the new path. The cached copy stays put.
    pub fn copy_to(&self, extension: &ExtensionId, destination: &Path) -> Result<PathBuf> {
        if !destination.is_dir() {
            return Err(VsgetError::NotADirectory(destination.to_path_buf()));
        }

        let entry = self
            .entries
            .get(extension)
            .ok_or_else(|| VsgetError::NotCached(extension.to_string()))?;

        let dest = destination.join(entry.file_name());
        copy_preserving_mtime(entry.path(), &dest)?;
        Ok(dest)
    }
}

/// Copy a file and carry its modification time over, so `created_at`
/// survives round trips through the cache.
fn copy_preserving_mtime(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(source, dest)?;
    let metadata = fs::metadata(source)?;
    filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&metadata))?;
    Ok(())
}
