//! DOI-keyed venue/URL enrichment.
//!
//! Publications that carry a DOI but only an arXiv placeholder venue (or no
//! venue or link at all) are looked up in Crossref, then OpenAlex. Every
//! failure is swallowed: enrichment improves records, it never removes them.

use crate::cache::{doi_key, ExpiringCache};
use crate::crossref::CrossrefClient;
use crate::error::Result;
use crate::merge::{is_arxiv_placeholder, is_placeholder_url};
use crate::model::MergedPublication;
use crate::openalex::OpenAlexClient;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Venue and canonical URL of a work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLinks {
    pub venue: Option<String>,
    pub url: Option<String>,
}

impl WorkLinks {
    pub fn is_empty(&self) -> bool {
        self.venue.is_none() && self.url.is_none()
    }
}

/// Whether a publication would gain anything from a DOI lookup.
pub fn needs_enrichment(publication: &MergedPublication) -> bool {
    publication.doi.is_some()
        && (publication.venue.is_empty()
            || is_arxiv_placeholder(&publication.venue)
            || is_placeholder_url(&publication.url))
}

/// Fill a placeholder venue or URL from lookup results.
pub fn apply_links(publication: &mut MergedPublication, links: &WorkLinks) {
    if let Some(venue) = &links.venue {
        let replace = publication.venue.is_empty()
            || (is_arxiv_placeholder(&publication.venue) && !is_arxiv_placeholder(venue));
        if replace {
            publication.venue = venue.clone();
        }
    }
    if let Some(url) = &links.url {
        if is_placeholder_url(&publication.url) && !is_placeholder_url(url) {
            publication.url = url.clone();
        }
    }
}

/// Crossref-first, OpenAlex-second DOI lookup.
#[derive(Debug, Clone)]
pub struct Enricher {
    crossref: CrossrefClient,
    openalex: Option<OpenAlexClient>,
    max_workers: usize,
}

impl Enricher {
    pub fn new(max_workers: usize) -> Result<Self> {
        Ok(Self {
            crossref: CrossrefClient::new()?,
            openalex: Some(OpenAlexClient::new()?),
            max_workers: max_workers.max(1),
        })
    }

    pub fn from_clients(
        crossref: CrossrefClient,
        openalex: Option<OpenAlexClient>,
        max_workers: usize,
    ) -> Self {
        Self {
            crossref,
            openalex,
            max_workers: max_workers.max(1),
        }
    }

    /// Look up one DOI. `None` when no provider answered: errors are logged
    /// and must not be cached as an empty result.
    pub async fn lookup(&self, doi: &str) -> Option<WorkLinks> {
        let mut answered = false;
        let mut links = match self.crossref.lookup_doi(doi).await {
            Ok(found) => {
                answered = true;
                found.unwrap_or_default()
            }
            Err(e) => {
                debug!(doi = doi, error = %e, "Crossref lookup failed");
                WorkLinks::default()
            }
        };

        let incomplete = links.venue.as_deref().map_or(true, is_arxiv_placeholder)
            || links.url.is_none();
        let Some(openalex) = self.openalex.as_ref().filter(|_| incomplete) else {
            return answered.then_some(links);
        };
        match openalex.lookup_doi(doi).await {
            Ok(Some(fallback)) => {
                answered = true;
                if links.venue.as_deref().map_or(true, is_arxiv_placeholder) {
                    links.venue = fallback.venue.or(links.venue);
                }
                links.url = links.url.or(fallback.url);
            }
            Ok(None) => answered = true,
            Err(e) => debug!(doi = doi, error = %e, "OpenAlex lookup failed"),
        }

        answered.then_some(links)
    }

    /// Enrich every publication that needs it, reading and writing the
    /// DOI cache when one is given.
    pub async fn enrich(&self, publications: &mut [MergedPublication], cache: Option<&ExpiringCache>) {
        let dois: BTreeSet<String> = publications
            .iter()
            .filter(|p| needs_enrichment(p))
            .filter_map(|p| p.doi.as_ref().map(|d| d.to_lowercase()))
            .collect();

        if dois.is_empty() {
            return;
        }

        let mut found: HashMap<String, WorkLinks> = HashMap::new();
        let mut pending = Vec::new();
        for doi in dois {
            match cache.and_then(|c| c.get::<WorkLinks>(&doi_key(&doi))) {
                Some(links) => {
                    found.insert(doi, links);
                }
                None => pending.push(doi),
            }
        }

        info!(
            cached = found.len(),
            pending = pending.len(),
            "Enriching publications by DOI"
        );

        let semaphore = Semaphore::new(self.max_workers);
        let lookups = pending.iter().map(|doi| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                let links = self.lookup(doi).await?;
                Some((doi.clone(), links))
            }
        });

        for (doi, links) in join_all(lookups).await.into_iter().flatten() {
            if let Some(cache) = cache {
                if let Err(e) = cache.put(&doi_key(&doi), &links) {
                    debug!(doi = %doi, error = %e, "Failed to cache enrichment");
                }
            }
            found.insert(doi, links);
        }

        let mut updated = 0;
        for publication in publications.iter_mut() {
            let Some(doi) = publication.doi.as_ref().map(|d| d.to_lowercase()) else {
                continue;
            };
            if let Some(links) = found.get(&doi) {
                let before = (publication.venue.clone(), publication.url.clone());
                apply_links(publication, links);
                if before != (publication.venue.clone(), publication.url.clone()) {
                    updated += 1;
                }
            }
        }

        info!(updated = updated, "DOI enrichment complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn publication(venue: &str, url: &str, doi: Option<&str>) -> MergedPublication {
        MergedPublication {
            title: "Paper".into(),
            venue: venue.into(),
            url: url.into(),
            doi: doi.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_needs_enrichment() {
        assert!(needs_enrichment(&publication("arXiv preprint", "https://x", Some("10.1/a"))));
        assert!(needs_enrichment(&publication("Optica", "#", Some("10.1/a"))));
        assert!(!needs_enrichment(&publication("Optica", "https://x", Some("10.1/a"))));
        assert!(!needs_enrichment(&publication("", "", None)));
    }

    #[test]
    fn test_apply_links_only_replaces_placeholders() {
        let links = WorkLinks {
            venue: Some("Nature Photonics".into()),
            url: Some("https://doi.org/10.1/a".into()),
        };

        let mut preprint = publication("arXiv", "", Some("10.1/a"));
        apply_links(&mut preprint, &links);
        assert_eq!(preprint.venue, "Nature Photonics");
        assert_eq!(preprint.url, "https://doi.org/10.1/a");

        let mut published = publication("Optica", "https://optica.org/a", Some("10.1/a"));
        apply_links(&mut published, &links);
        assert_eq!(published.venue, "Optica");
        assert_eq!(published.url, "https://optica.org/a");
    }

    #[tokio::test]
    async fn test_enrich_uses_cached_links() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = ExpiringCache::open(dir.path().join("cache.json"), Duration::hours(1));
        cache.put(
            &doi_key("10.1/A"),
            &WorkLinks {
                venue: Some("Physical Review A".into()),
                url: None,
            },
        )?;

        // Unreachable endpoints: a cache miss would fail and leave the record untouched.
        let enricher = Enricher::from_clients(
            CrossrefClient::new()?.with_base_url("http://127.0.0.1:9"),
            None,
            2,
        );
        let mut pubs = vec![publication("arXiv", "https://arxiv.org/abs/1", Some("10.1/a"))];
        enricher.enrich(&mut pubs, Some(&cache)).await;
        assert_eq!(pubs[0].venue, "Physical Review A");
        assert_eq!(pubs[0].url, "https://arxiv.org/abs/1");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = ExpiringCache::open(dir.path().join("cache.json"), Duration::hours(1));
        let enricher = Enricher::from_clients(
            CrossrefClient::new()?.with_base_url("http://127.0.0.1:9"),
            None,
            1,
        );

        assert!(enricher.lookup("10.1/a").await.is_none());

        let mut pubs = vec![publication("arXiv", "https://arxiv.org/abs/1", Some("10.1/a"))];
        enricher.enrich(&mut pubs, Some(&cache)).await;
        assert_eq!(pubs[0].venue, "arXiv");
        assert!(cache.get::<WorkLinks>(&doi_key("10.1/a")).is_none());
        Ok(())
    }
}
