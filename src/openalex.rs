//! OpenAlex API Client
//!
//! Fallback DOI lookup for venue/URL enrichment when Crossref has no
//! container title for a work.
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Implement exponential backoff for retries

use crate::enrichment::WorkLinks;
use crate::error::{LabsiteError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAlex API base URL
pub const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Email for polite pool access
const POLITE_EMAIL: &str = "labsite@example.org";

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    doi: Option<String>,
    primary_location: Option<OpenAlexLocation>,
    best_oa_location: Option<OpenAlexLocation>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    source: Option<OpenAlexSource>,
    landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexSource {
    display_name: Option<String>,
}

/// OpenAlex client for single-work lookups.
#[derive(Debug, Clone)]
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LabsiteError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: OPENALEX_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Look up venue and landing page for a DOI. `Ok(None)` when unknown.
    pub async fn lookup_doi(&self, doi: &str) -> Result<Option<WorkLinks>> {
        let doi = doi.trim();
        if doi.is_empty() {
            return Ok(None);
        }

        let url = work_url(&self.base_url, doi);
        let mut retries = 0;
        let max_retries = 3;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("mailto", POLITE_EMAIL),
                    ("select", "doi,primary_location,best_oa_location"),
                ])
                .send()
                .await?;
            let status = response.status();

            if status.is_success() {
                let work: OpenAlexWork = response.json().await.map_err(|e| {
                    LabsiteError::Parse(format!("Failed to parse OpenAlex response: {}", e))
                })?;
                return Ok(Some(parse_work(work)));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                debug!(doi = doi, "DOI not found in OpenAlex");
                return Ok(None);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retries < max_retries {
                    let backoff = Duration::from_secs(2u64.pow(retries));
                    warn!(
                        retries = retries,
                        backoff_secs = backoff.as_secs(),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                    continue;
                }
                return Err(LabsiteError::RateLimited(60));
            }

            return Err(LabsiteError::Api {
                code: status.as_u16() as i32,
                message: format!("OpenAlex API error: {}", status),
            });
        }
    }
}

fn parse_work(work: OpenAlexWork) -> WorkLinks {
    let venue = work
        .primary_location
        .as_ref()
        .and_then(|l| l.source.as_ref())
        .and_then(|s| s.display_name.clone())
        .filter(|v| !v.trim().is_empty());

    let url = work
        .primary_location
        .and_then(|l| l.landing_page_url)
        .or_else(|| work.best_oa_location.and_then(|l| l.landing_page_url))
        .or(work.doi)
        .filter(|u| !u.trim().is_empty());

    WorkLinks { venue, url }
}

/// `works/doi:` endpoint with the DOI percent-encoded, so `#` and `;` in
/// SICI-style DOIs stay in the path.
fn work_url(base_url: &str, doi: &str) -> String {
    format!("{}/works/doi:{}", base_url, urlencoding::encode(doi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_url_encodes_doi() {
        let url = work_url(OPENALEX_API_BASE, "10.1002/(SICI)1097-4571(199806)49:8<693::AID-ASI4>3.0.CO;2-#");
        assert!(url.starts_with(&format!("{}/works/doi:10.1002%2F", OPENALEX_API_BASE)));
        assert!(url.ends_with("3.0.CO%3B2-%23"));
        assert!(!url.contains('#'));
    }

    #[test]
    fn test_parse_work() {
        let body = r#"{
            "doi": "https://doi.org/10.1038/s41586-020-1",
            "primary_location": {
                "source": {"display_name": "Nature"},
                "landing_page_url": "https://www.nature.com/articles/s41586-020-1"
            },
            "best_oa_location": null
        }"#;
        let work: OpenAlexWork = serde_json::from_str(body).expect("valid work");
        let links = parse_work(work);
        assert_eq!(links.venue.as_deref(), Some("Nature"));
        assert_eq!(links.url.as_deref(), Some("https://www.nature.com/articles/s41586-020-1"));
    }

    #[test]
    fn test_parse_work_falls_back_to_doi_url() {
        let body = r#"{"doi": "https://doi.org/10.1/x", "primary_location": {"source": null}}"#;
        let work: OpenAlexWork = serde_json::from_str(body).expect("valid work");
        let links = parse_work(work);
        assert_eq!(links.venue, None);
        assert_eq!(links.url.as_deref(), Some("https://doi.org/10.1/x"));
    }
}
