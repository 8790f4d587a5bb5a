//! Visual Studio Marketplace Gallery API client.
//!
//! Protocol reverse engineered from:
//! github.com/microsoft/vscode-vsce/blob/main/src/show.ts

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::extension::ExtensionId;
use crate::http::{HttpClient, HttpError};
use crate::registry::Registry;
use crate::{Result, VsgetError};

const QUERY_URL: &str =
    "https://marketplace.visualstudio.com/_apis/public/gallery/extensionquery";
const API_VERSION: &str = "3.0-preview.1";

/// Query flag: only return the latest version of each matched extension.
const FLAG_INCLUDE_LATEST_VERSION_ONLY: u32 = 512;

/// Filter criterion type: match on the extension name (`publisher.name`).
const FILTER_TYPE_NAME: u32 = 7;

#[derive(Debug, Serialize)]
struct QueryRequest {
    filters: Vec<QueryFilter>,
    #[serde(rename = "assetTypes")]
    asset_types: Vec<String>,
    flags: u32,
}

#[derive(Debug, Serialize)]
struct QueryFilter {
    #[serde(rename = "pageNumber")]
    page_number: u32,
    #[serde(rename = "pageSize")]
    page_size: u32,
    criteria: Vec<QueryCriterion>,
}

#[derive(Debug, Serialize)]
struct QueryCriterion {
    #[serde(rename = "filterType")]
    filter_type: u32,
    value: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    extensions: Vec<QueryExtension>,
}

#[derive(Debug, Deserialize)]
struct QueryExtension {
    #[serde(default)]
    versions: Vec<QueryVersion>,
}

#[derive(Debug, Deserialize)]
struct QueryVersion {
    version: String,
}

/// Marketplace Gallery API client.
pub struct GalleryClient {
    http: HttpClient,
}

impl GalleryClient {
    pub fn new() -> Result<Self> {
        let http = HttpClient::new().map_err(HttpError::from)?;
        Ok(Self { http })
    }

    pub fn with_http(http: HttpClient) -> Self {
        Self { http }
    }

    /// Build the query body asking for the latest version of `extension`.
    fn latest_version_query(extension: &ExtensionId) -> QueryRequest {
        QueryRequest {
            filters: vec![QueryFilter {
                page_number: 1,
                page_size: 1,
                criteria: vec![QueryCriterion {
                    filter_type: FILTER_TYPE_NAME,
                    value: extension.to_string(),
                }],
            }],
            asset_types: Vec::new(),
            flags: FLAG_INCLUDE_LATEST_VERSION_ONLY,
        }
    }

    /// URL of the VSIX package for `extension` at `version`.
    fn vsix_url(extension: &ExtensionId, version: &str) -> String {
        format!(
            "https://{publisher}.gallery.vsassets.io/_apis/public/gallery\
             /publisher/{publisher}/extension/{name}/{version}\
             /assetbyname/Microsoft.VisualStudio.Services.VSIXPackage",
            publisher = extension.publisher(),
            name = extension.name(),
        )
    }

    fn registry_error(extension: &ExtensionId, error: HttpError) -> VsgetError {
        match error {
            // Local write failures are filesystem problems, not registry ones
            HttpError::Io(e) => VsgetError::Io(e),
            e => VsgetError::RegistryUnavailable {
                extension: extension.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl Registry for GalleryClient {
    async fn resolve_latest_version(&self, extension: &ExtensionId) -> Result<String> {
        let accept = format!("application/json;api-version={API_VERSION}");
        let body = Self::latest_version_query(extension);

        let response: QueryResponse = self
            .http
            .post_json(QUERY_URL, &body, &accept)
            .await
            .map_err(|e| Self::registry_error(extension, e))?;

        // Platform-specific builds come back as separate version records,
        // but all carry the same version string when only the latest is
        // requested.
        response
            .results
            .first()
            .and_then(|result| result.extensions.first())
            .and_then(|matched| matched.versions.first())
            .map(|v| v.version.clone())
            .ok_or_else(|| VsgetError::RegistryUnavailable {
                extension: extension.to_string(),
                reason: "extension not found in gallery response".to_string(),
            })
    }

    async fn fetch_artifact(
        &self,
        extension: &ExtensionId,
        version: &str,
        dest: &Path,
    ) -> Result<()> {
        let url = Self::vsix_url(extension, version);

        self.http
            .download(&url, dest, None::<fn(u64, u64)>)
            .await
            .map_err(|e| Self::registry_error(extension, e))
    }
}
