pub mod cache;
pub mod downloader;
pub mod error;
pub mod extension;
pub mod http;
pub mod manifest;
pub mod registry;
pub mod specfile;

pub use cache::{CachedVsix, VsixCache, DEFAULT_CACHE_MAX_SIZE_MB};
pub use downloader::{DownloadReport, Downloader};
pub use error::{Result, VsgetError};
pub use extension::ExtensionId;
pub use registry::{GalleryClient, Registry};
