//! Crossref API client for venue/URL enrichment.
//!
//! Looks up a work by DOI and returns its container title (journal or
//! proceedings name) and canonical URL.

use crate::enrichment::WorkLinks;
use crate::error::{LabsiteError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Crossref API base URL
pub const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Polite pool email for Crossref API
const MAILTO: &str = "labsite@example.org";

/// Crossref API client with retry on rate limiting
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl CrossrefClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("labsite/0.1 (mailto:{})", MAILTO))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| LabsiteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: CROSSREF_API_URL.to_string(),
            max_retries: 3,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Look up venue and URL for a DOI.
    ///
    /// `Ok(None)` means Crossref does not know the DOI. Rate limiting is retried
    /// with exponential backoff; other errors are returned.
    pub async fn lookup_doi(&self, doi: &str) -> Result<Option<WorkLinks>> {
        let doi = doi.trim();
        if doi.is_empty() {
            return Ok(None);
        }

        let mut backoff = Duration::from_millis(500);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match self.do_lookup(doi).await {
                Ok(found) => return Ok(found),
                Err(LabsiteError::RateLimited(secs)) => {
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        doi = doi,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                    last_error = Some(LabsiteError::RateLimited(secs));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LabsiteError::RateLimited(0)))
    }

    async fn do_lookup(&self, doi: &str) -> Result<Option<WorkLinks>> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(doi));
        let response = self
            .client
            .get(&url)
            .query(&[("mailto", MAILTO)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(doi = doi, "DOI not found in Crossref");
            return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LabsiteError::RateLimited(5));
        }
        if !status.is_success() {
            return Err(LabsiteError::Api {
                code: status.as_u16() as i32,
                message: format!("Crossref API error: {}", status),
            });
        }

        let data: CrossrefResponse = response.json().await?;
        Ok(Some(parse_crossref_work(data.message)))
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefWork,
}

#[derive(Debug, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

fn parse_crossref_work(work: CrossrefWork) -> WorkLinks {
    WorkLinks {
        venue: work
            .container_title
            .into_iter()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty()),
        url: work.url.filter(|u| !u.trim().is_empty()),
    }
}
