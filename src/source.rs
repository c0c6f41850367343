//! Site document sources.
//!
//! The site content (manifest, member folders, data files, partials) is a plain
//! directory tree. It can be read straight from disk or from the static origin
//! that serves it. Both implement [`SiteSource`], so every loader in the crate
//! works against either.

use crate::error::{LabsiteError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Read-only access to documents of the site tree, addressed by
/// slash-separated relative paths such as `members/alice/profile.json`.
pub trait SiteSource: Send + Sync {
    /// Fetch a document as text.
    ///
    /// Returns [`LabsiteError::NotFound`] when the document does not exist.
    fn fetch_text(&self, path: &str) -> impl Future<Output = Result<String>> + Send;

    /// Check whether a document exists without reading it.
    fn exists(&self, path: &str) -> impl Future<Output = bool> + Send;
}

/// Fetch and decode a JSON document.
pub async fn fetch_json<S, T>(source: &S, path: &str) -> Result<T>
where
    S: SiteSource,
    T: DeserializeOwned,
{
    let text = source.fetch_text(path).await?;
    serde_json::from_str(&text)
        .map_err(|e| LabsiteError::Parse(format!("{} invalid JSON: {}", path, e)))
}

/// Site tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a site path below the root. Absolute paths and `..` are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(LabsiteError::Config(format!("path escapes site root: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

impl SiteSource for FsSource {
    async fn fetch_text(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        debug!(path = %full.display(), "Reading site document");
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LabsiteError::NotFound(path.to_string()))
            }
            Err(e) => Err(LabsiteError::Io(e)),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::metadata(&full)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Site tree served over HTTP (the deployed static site).
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    client: Client,
}

impl HttpSource {
    /// Create a source rooted at `base_url`. A trailing slash is added when missing
    /// so relative joins stay below the base.
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| LabsiteError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| LabsiteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base, client })
    }

    /// Build the document URL. Each path segment is percent-encoded and a
    /// timestamp parameter defeats intermediate caches.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let encoded = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = self
            .base
            .join(&encoded)
            .map_err(|e| LabsiteError::Config(format!("Invalid site path {}: {}", path, e)))?;
        url.query_pairs_mut()
            .append_pair("_", &chrono::Utc::now().timestamp_millis().to_string());
        Ok(url)
    }
}

impl SiteSource for HttpSource {
    async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.url_for(path)?;
        debug!(url = %url, "Fetching site document");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(LabsiteError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(LabsiteError::Api {
                code: status.as_u16() as i32,
                message: format!("{} HTTP {}", path, status),
            });
        }

        Ok(response.text().await?)
    }

    async fn exists(&self, path: &str) -> bool {
        let Ok(url) = self.url_for(path) else {
            return false;
        };
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(path = path, error = %e, "HEAD request failed");
                false
            }
        }
    }
}

/// Either kind of source, chosen at runtime from the command line.
#[derive(Debug, Clone)]
pub enum Site {
    Local(FsSource),
    Remote(HttpSource),
}

impl Site {
    /// The local root, when the site is read from disk.
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            Site::Local(fs) => Some(fs.root()),
            Site::Remote(_) => None,
        }
    }
}

impl SiteSource for Site {
    async fn fetch_text(&self, path: &str) -> Result<String> {
        match self {
            Site::Local(fs) => fs.fetch_text(path).await,
            Site::Remote(http) => http.fetch_text(path).await,
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self {
            Site::Local(fs) => fs.exists(path).await,
            Site::Remote(http) => http.exists(path).await,
        }
    }
}
