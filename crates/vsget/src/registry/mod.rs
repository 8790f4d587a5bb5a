//! Registry boundary: version resolution and artifact fetching.

mod gallery;

pub use gallery::GalleryClient;

use std::path::Path;

use async_trait::async_trait;

use crate::extension::ExtensionId;
use crate::Result;

/// Remote registry the download engine fetches from.
///
/// The engine only ever talks to this trait; `GalleryClient` implements it
/// against the Visual Studio Marketplace.
#[async_trait]
pub trait Registry {
    /// Resolve the latest released version of an extension.
    async fn resolve_latest_version(&self, extension: &ExtensionId) -> Result<String>;

    /// Stream the package for `extension` at `version` into `dest`.
    async fn fetch_artifact(
        &self,
        extension: &ExtensionId,
        version: &str,
        dest: &Path,
    ) -> Result<()>;
}
