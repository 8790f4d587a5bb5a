//! The dependency-following download engine.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{VsixCache, VSIX_EXTENSION};
use crate::extension::ExtensionId;
use crate::manifest;
use crate::registry::Registry;
use crate::{Result, VsgetError};

/// Per-extension outcomes of one download batch.
///
/// Every seeded or discovered extension lands in exactly one of these
/// buckets, so partial success is fully auditable.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Extensions fetched from the registry, with their resolved versions.
    pub downloaded: Vec<(ExtensionId, String)>,
    /// Extensions served out of the local cache.
    pub from_cache: Vec<(ExtensionId, String)>,
    /// Extensions whose version resolution or transfer failed.
    pub failed: Vec<(ExtensionId, VsgetError)>,
    /// Extensions that downloaded fine but whose manifest could not be
    /// read, so their dependencies were not followed.
    pub metadata_failures: Vec<(ExtensionId, VsgetError)>,
}

impl DownloadReport {
    /// Number of extensions that produced an artifact in the target
    /// directory.
    pub fn succeeded(&self) -> usize {
        self.downloaded.len() + self.from_cache.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Work-queue driven downloader for extension packages.
///
/// Given a seed set of extensions, resolves each one's latest version,
/// streams its package into the target directory, and (optionally)
/// follows declared dependencies, feeding newly discovered extensions
/// back into the queue. Every extension is attempted at most once per
/// batch, so dependency cycles terminate.
pub struct Downloader<R> {
    registry: R,
    cache: Option<VsixCache>,
}

impl<R: Registry> Downloader<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            cache: None,
        }
    }

    /// Serve cache hits from `cache` and register fresh downloads into it.
    pub fn with_cache(mut self, cache: VsixCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&VsixCache> {
        self.cache.as_ref()
    }

    /// Download `seed` (and, with `follow_dependencies`, everything it
    /// transitively depends on) into `target_dir`.
    ///
    /// A single unresolvable or unfetchable extension never aborts the
    /// batch; it is recorded in the report and the traversal moves on.
    /// Filesystem errors do abort, since continuing would leave the
    /// target directory in an inconsistent state.
    pub async fn download(
        &mut self,
        seed: &[ExtensionId],
        target_dir: &Path,
        follow_dependencies: bool,
    ) -> Result<DownloadReport> {
        if !target_dir.is_dir() {
            return Err(VsgetError::InvalidTarget(target_dir.to_path_buf()));
        }

        let mut report = DownloadReport::default();

        // Everything ever queued; keeps each extension to one attempt
        let mut enqueued: HashSet<ExtensionId> = HashSet::new();
        let mut queue: Vec<ExtensionId> = Vec::new();
        for extension in seed {
            if enqueued.insert(extension.clone()) {
                queue.push(extension.clone());
            }
        }

        // Successfully materialized extensions; dependencies already here
        // are never re-fetched
        let mut seen: HashSet<ExtensionId> = HashSet::new();

        while let Some(extension) = queue.pop() {
            let version = match self.registry.resolve_latest_version(&extension).await {
                Ok(version) => version,
                Err(VsgetError::Io(e)) => return Err(VsgetError::Io(e)),
                Err(e) => {
                    log::warn!("Could not resolve '{extension}': {e}");
                    report.failed.push((extension, e));
                    continue;
                }
            };

            let (artifact, cached) =
                match self.materialize(&extension, &version, target_dir).await {
                    Ok(outcome) => outcome,
                    Err(VsgetError::Io(e)) => return Err(VsgetError::Io(e)),
                    Err(e) => {
                        log::warn!("Could not download '{extension}': {e}");
                        report.failed.push((extension, e));
                        continue;
                    }
                };

            seen.insert(extension.clone());
            if cached {
                log::info!("Loaded '{extension}' {version} from cache");
                report.from_cache.push((extension.clone(), version));
            } else {
                log::info!("Downloaded '{extension}' {version}");
                report.downloaded.push((extension.clone(), version));

                if let Some(cache) = self.cache.as_mut() {
                    cache.insert(&artifact, false)?;
                }
            }

            if follow_dependencies {
                let dependencies = match manifest::extract_dependencies(&artifact) {
                    Ok(dependencies) => dependencies,
                    Err(VsgetError::Io(e)) => return Err(VsgetError::Io(e)),
                    Err(e) => {
                        log::warn!("Could not read dependencies of '{extension}': {e}");
                        report.metadata_failures.push((extension, e));
                        continue;
                    }
                };

                log::debug!(
                    "'{extension}' declares {} dependencies",
                    dependencies.len()
                );
                for dependency in dependencies {
                    if !seen.contains(&dependency) && enqueued.insert(dependency.clone()) {
                        queue.push(dependency);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Produce the artifact file in `target_dir`, from the cache when it
    /// already holds the resolved version.
    ///
    /// Fresh fetches stream into a `.part` file that is renamed into
    /// place only once the transfer completes, so a half-written file is
    /// never mistakable for a finished package.
    async fn materialize(
        &self,
        extension: &ExtensionId,
        version: &str,
        target_dir: &Path,
    ) -> Result<(PathBuf, bool)> {
        if let Some(cache) = self.cache.as_ref() {
            if cache.cached_version(extension) == Some(version) {
                let path = cache.copy_to(extension, target_dir)?;
                return Ok((path, true));
            }
        }

        let final_path =
            target_dir.join(format!("{extension}_{version}.{VSIX_EXTENSION}"));
        let partial = final_path.with_extension(format!("{VSIX_EXTENSION}.part"));

        match self.registry.fetch_artifact(extension, version, &partial).await {
            Ok(()) => {
                fs::rename(&partial, &final_path)?;
                Ok((final_path, false))
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn id(s: &str) -> ExtensionId {
        s.parse().unwrap()
    }

    /// Build an in-memory VSIX archive carrying the given manifest JSON.
    fn vsix_bytes(manifest_json: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer
            .start_file(crate::manifest::MANIFEST_ENTRY, options)
            .unwrap();
        writer.write_all(manifest_json.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[derive(Default)]
    struct FakeRegistry {
        packages: HashMap<ExtensionId, (String, Vec<u8>)>,
        /// Fetches for this extension die halfway through the transfer.
        truncate: Option<ExtensionId>,
    }

    impl FakeRegistry {
        fn add(&mut self, extension: &str, version: &str, dependencies: &[&str]) {
            let manifest =
                serde_json::json!({ "extensionDependencies": dependencies }).to_string();
            self.packages
                .insert(id(extension), (version.to_string(), vsix_bytes(&manifest)));
        }

        fn add_raw(&mut self, extension: &str, version: &str, bytes: Vec<u8>) {
            self.packages
                .insert(id(extension), (version.to_string(), bytes));
        }

        fn missing(extension: &ExtensionId) -> VsgetError {
            VsgetError::RegistryUnavailable {
                extension: extension.to_string(),
                reason: "HTTP 404".to_string(),
            }
        }
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn resolve_latest_version(&self, extension: &ExtensionId) -> Result<String> {
            self.packages
                .get(extension)
                .map(|(version, _)| version.clone())
                .ok_or_else(|| Self::missing(extension))
        }

        async fn fetch_artifact(
            &self,
            extension: &ExtensionId,
            _version: &str,
            dest: &Path,
        ) -> Result<()> {
            let (_, bytes) = self
                .packages
                .get(extension)
                .ok_or_else(|| Self::missing(extension))?;

            if self.truncate.as_ref() == Some(extension) {
                fs::write(dest, &bytes[..bytes.len() / 2])?;
                return Err(VsgetError::RegistryUnavailable {
                    extension: extension.to_string(),
                    reason: "connection reset".to_string(),
                });
            }

            fs::write(dest, bytes)?;
            Ok(())
        }
    }

    fn downloaded_ids(report: &DownloadReport) -> HashSet<ExtensionId> {
        report
            .downloaded
            .iter()
            .map(|(extension, _)| extension.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_target_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut downloader = Downloader::new(FakeRegistry::default());

        let result = downloader
            .download(&[id("a.b")], &temp.path().join("nope"), true)
            .await;

        assert!(matches!(result, Err(VsgetError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_downloads_single_extension() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.b", "1.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader.download(&[id("a.b")], temp.path(), true).await.unwrap();

        assert_eq!(report.downloaded, vec![(id("a.b"), "1.0.0".to_string())]);
        assert!(report.failed.is_empty());
        assert!(temp.path().join("a.b_1.0.0.vsix").exists());
    }

    #[tokio::test]
    async fn test_follows_declared_dependencies() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.root", "1.0.0", &["b.leaf"]);
        registry.add("b.leaf", "2.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader
            .download(&[id("a.root")], temp.path(), true)
            .await
            .unwrap();

        assert_eq!(
            downloaded_ids(&report),
            HashSet::from([id("a.root"), id("b.leaf")])
        );
        assert!(temp.path().join("a.root_1.0.0.vsix").exists());
        assert!(temp.path().join("b.leaf_2.0.0.vsix").exists());
    }

    #[tokio::test]
    async fn test_dependency_cycles_terminate() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.x", "1.0.0", &["b.y"]);
        registry.add("b.y", "1.0.0", &["a.x"]);

        let mut downloader = Downloader::new(registry);
        let report = downloader.download(&[id("a.x")], temp.path(), true).await.unwrap();

        assert_eq!(report.downloaded.len(), 2);
        assert_eq!(
            downloaded_ids(&report),
            HashSet::from([id("a.x"), id("b.y")])
        );
    }

    #[tokio::test]
    async fn test_duplicate_seeds_fetch_once() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.b", "1.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader
            .download(&[id("a.b"), id("a.b")], temp.path(), true)
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_extension_does_not_abort_batch() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.good", "1.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader
            .download(&[id("a.good"), id("z.missing")], temp.path(), true)
            .await
            .unwrap();

        assert_eq!(report.downloaded, vec![(id("a.good"), "1.0.0".to_string())]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, id("z.missing"));
    }

    #[tokio::test]
    async fn test_no_follow_skips_dependencies() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.root", "1.0.0", &["b.leaf"]);
        registry.add("b.leaf", "2.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader
            .download(&[id("a.root")], temp.path(), false)
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 1);
        assert!(!temp.path().join("b.leaf_2.0.0.vsix").exists());
    }

    #[tokio::test]
    async fn test_truncated_transfer_leaves_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.b", "1.0.0", &[]);
        registry.truncate = Some(id("a.b"));

        let mut downloader = Downloader::new(registry);
        let report = downloader.download(&[id("a.b")], temp.path(), true).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add_raw("a.broken", "1.0.0", b"not a zip archive".to_vec());
        registry.add("b.good", "1.0.0", &[]);

        let mut downloader = Downloader::new(registry);
        let report = downloader
            .download(&[id("a.broken"), id("b.good")], temp.path(), true)
            .await
            .unwrap();

        // Both artifacts landed, but only the broken one is flagged
        assert_eq!(report.downloaded.len(), 2);
        assert_eq!(report.metadata_failures.len(), 1);
        assert_eq!(report.metadata_failures[0].0, id("a.broken"));
        assert!(temp.path().join("a.broken_1.0.0.vsix").exists());
    }

    #[tokio::test]
    async fn test_successful_downloads_are_cached() {
        let out = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let mut registry = FakeRegistry::default();
        registry.add("a.b", "1.0.0", &[]);

        let cache = VsixCache::open(cache_dir.path(), 512).unwrap();
        let mut downloader = Downloader::new(registry).with_cache(cache);
        downloader.download(&[id("a.b")], out.path(), true).await.unwrap();

        let cache = downloader.cache().unwrap();
        assert_eq!(cache.cached_version(&id("a.b")), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_the_fetch() {
        let out_first = TempDir::new().unwrap();
        let out_second = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();

        let mut registry = FakeRegistry::default();
        registry.add("a.b", "1.0.0", &[]);
        let cache = VsixCache::open(cache_dir.path(), 512).unwrap();
        let mut downloader = Downloader::new(registry).with_cache(cache);
        downloader
            .download(&[id("a.b")], out_first.path(), true)
            .await
            .unwrap();

        // Second run: same version still latest, so the artifact must come
        // out of the cache even though the registry would now 404 the
        // transfer.
        let mut registry = FakeRegistry::default();
        registry.add_raw("a.b", "1.0.0", Vec::new());
        registry.truncate = Some(id("a.b"));
        let cache = VsixCache::open(cache_dir.path(), 512).unwrap();
        let mut downloader = Downloader::new(registry).with_cache(cache);
        let report = downloader
            .download(&[id("a.b")], out_second.path(), true)
            .await
            .unwrap();

        assert!(report.downloaded.is_empty());
        assert_eq!(report.from_cache, vec![(id("a.b"), "1.0.0".to_string())]);
        assert!(out_second.path().join("a.b_1.0.0.vsix").exists());
    }
}
