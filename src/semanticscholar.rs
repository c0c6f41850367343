//! Semantic Scholar API Client
//!
//! Fetches the paper list of an author so members with a `semanticScholarId`
//! can be listed without a hand-maintained `publications.json`.
//!
//! API Details:
//! - Author papers endpoint: GET /graph/v1/author/{id}/papers
//! - Max 1000 papers per page, paginated with `offset` / `next`
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::error::{LabsiteError, Result};
use crate::model::RawPublication;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Papers requested per page
const PAGE_SIZE: usize = 1000;

/// Upper bound on pages fetched for one author
const MAX_PAGES: usize = 10;

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,year,venue,url,externalIds,authors";

#[derive(Debug, Deserialize)]
struct SSAuthorPapers {
    #[serde(default)]
    next: Option<usize>,
    #[serde(default)]
    data: Vec<SSPaper>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    url: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
    #[serde(default)]
    authors: Vec<SSAuthor>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

impl From<SSPaper> for RawPublication {
    fn from(paper: SSPaper) -> Self {
        let (doi, arxiv_id) = match paper.external_ids {
            Some(ids) => (ids.doi, ids.arxiv),
            None => (None, None),
        };
        RawPublication {
            paper_id: paper.paper_id,
            title: paper.title,
            year: paper.year,
            venue: paper.venue.filter(|v| !v.trim().is_empty()),
            doi,
            url: paper.url,
            arxiv_id,
            authors: paper
                .authors
                .into_iter()
                .filter_map(|a| a.name)
                .filter(|n| !n.trim().is_empty())
                .collect(),
        }
    }
}

/// Semantic Scholar client for author paper lists.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    /// Create a client, optionally with an API key for higher rate limits.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LabsiteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: SS_API_BASE.to_string(),
            api_key,
        })
    }

    /// Point the client at a different API root (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch all papers of one author.
    pub async fn author_papers(&self, author_id: &str) -> Result<Vec<RawPublication>> {
        let mut papers = Vec::new();
        let mut offset = 0usize;

        for page in 0..MAX_PAGES {
            let batch = self.fetch_page(author_id, offset).await?;
            let count = batch.data.len();
            debug!(author = author_id, page = page + 1, count = count, "Fetched papers page");
            papers.extend(batch.data.into_iter().map(RawPublication::from));

            match batch.next {
                Some(next) if count > 0 && next > offset => offset = next,
                _ => break,
            }

            // Rate limiting: 1 second between requests (unauthenticated)
            if self.api_key.is_none() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        info!(author = author_id, total = papers.len(), "Semantic Scholar author lookup complete");
        Ok(papers)
    }

    /// Fetch the papers of several author ids and keep the `limit` most recent.
    pub async fn recent_papers(&self, author_ids: &[String], limit: usize) -> Vec<RawPublication> {
        let mut all = Vec::new();
        for author_id in author_ids {
            match self.author_papers(author_id).await {
                Ok(papers) => all.extend(papers),
                Err(e) => warn!(author = %author_id, error = %e, "Author lookup failed"),
            }
        }
        most_recent(all, limit)
    }

    async fn fetch_page(&self, author_id: &str, offset: usize) -> Result<SSAuthorPapers> {
        let url = format!(
            "{}/author/{}/papers",
            self.base_url,
            urlencoding::encode(author_id)
        );

        let mut request = self.client.get(&url).query(&[
            ("fields", PAPER_FIELDS.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ]);

        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LabsiteError::RateLimited(1));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "API error");
            return Err(LabsiteError::Api {
                code: status.as_u16() as i32,
                message: format!("Semantic Scholar API error: {} - {}", status, error_text),
            });
        }

        response.json().await.map_err(|e| {
            LabsiteError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })
    }
}

/// Keep the `limit` newest records, year descending; records without a year go last.
pub fn most_recent(mut papers: Vec<RawPublication>, limit: usize) -> Vec<RawPublication> {
    papers.sort_by(|a, b| b.year.unwrap_or(0).cmp(&a.year.unwrap_or(0)));
    papers.truncate(limit);
    papers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_author_papers_page() {
        let body = r#"{
            "offset": 0,
            "next": 2,
            "data": [
                {"paperId": "p1", "title": "Entangled Photons", "year": 2023, "venue": "",
                 "url": "https://www.semanticscholar.org/paper/p1",
                 "externalIds": {"DOI": "10.1103/X", "ArXiv": "2301.00001"},
                 "authors": [{"authorId": "1", "name": "Jane Doe"}, {"authorId": null, "name": null}]},
                {"paperId": "p2", "title": "Old Work", "year": null}
            ]
        }"#;
        let page: SSAuthorPapers = serde_json::from_str(body).expect("valid page");
        assert_eq!(page.next, Some(2));

        let records: Vec<RawPublication> = page.data.into_iter().map(RawPublication::from).collect();
        assert_eq!(records[0].doi.as_deref(), Some("10.1103/X"));
        assert_eq!(records[0].arxiv_id.as_deref(), Some("2301.00001"));
        assert_eq!(records[0].venue, None);
        assert_eq!(records[0].authors, vec!["Jane Doe"]);
        assert_eq!(records[1].year, None);
    }

    #[test]
    fn test_most_recent_caps_by_year() {
        let papers = [2019, 2023, 2021, 2022]
            .into_iter()
            .map(|year| RawPublication {
                title: Some(format!("P{}", year)),
                year: Some(year),
                ..Default::default()
            })
            .chain(std::iter::once(RawPublication::default()))
            .collect();
        let recent = most_recent(papers, 3);
        let years: Vec<_> = recent.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![Some(2023), Some(2022), Some(2021)]);
    }
}
