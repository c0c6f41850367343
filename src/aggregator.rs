//! Publication aggregation pipeline.
//!
//! Roster → profiles → per-member publication lists → merged, matched,
//! enriched and sorted publications. Per-member failures are logged and the
//! member simply contributes nothing; only an empty set of profiles fails the
//! whole load.

use crate::cache::{member_key, ExpiringCache};
use crate::documents::{load_local_publications, load_manifest, load_profile};
use crate::enrichment::Enricher;
use crate::error::{LabsiteError, Result};
use crate::matching::{assign_group_authors, MatchStrategy, NameMatcher};
use crate::merge::{sort_publications, PublicationMerger};
use crate::model::{MemberProfile, MergedPublication, RawPublication};
use crate::semanticscholar::SemanticScholarClient;
use crate::source::SiteSource;
use futures::future::join_all;
use serde::Serialize;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default number of member documents fetched at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default cap on papers taken from Semantic Scholar per member
pub const DEFAULT_MAX_REMOTE: usize = 50;

/// Options for [`Aggregator`]
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Maximum concurrent member fetches (1 serializes them)
    pub concurrency: usize,
    /// Query Semantic Scholar for members that have an author id
    pub remote: bool,
    /// Most recent papers kept per member from Semantic Scholar
    pub max_remote: usize,
    /// Look up venue/URL by DOI for preprint-only records
    pub enrich: bool,
    /// Group-author matching strategy
    pub matching: MatchStrategy,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            remote: false,
            max_remote: DEFAULT_MAX_REMOTE,
            enrich: false,
            matching: MatchStrategy::default(),
        }
    }
}

/// Result of one load: the profiles that loaded (roster order) and the merged
/// publication list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregate {
    pub profiles: Vec<MemberProfile>,
    pub publications: Vec<MergedPublication>,
}

/// Merge per-member publication lists, credit group authors and sort.
pub fn aggregate_publications(
    profiles: &[MemberProfile],
    per_member: &[Vec<RawPublication>],
    matcher: &dyn NameMatcher,
) -> Vec<MergedPublication> {
    let mut merger = PublicationMerger::new();
    for records in per_member {
        merger.extend(records);
    }
    let mut publications = merger.into_publications();
    for publication in publications.iter_mut() {
        assign_group_authors(publication, profiles, matcher);
    }
    sort_publications(&mut publications);
    publications
}

/// Loads and aggregates the group's publications from a site source.
pub struct Aggregator<S> {
    source: S,
    options: AggregatorOptions,
    semantic_scholar: Option<SemanticScholarClient>,
    enricher: Option<Enricher>,
    cache: Option<ExpiringCache>,
}

impl<S: SiteSource> Aggregator<S> {
    pub fn new(source: S, options: AggregatorOptions) -> Self {
        Self {
            source,
            options,
            semantic_scholar: None,
            enricher: None,
            cache: None,
        }
    }

    pub fn with_semantic_scholar(mut self, client: SemanticScholarClient) -> Self {
        self.semantic_scholar = Some(client);
        self
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_cache(mut self, cache: ExpiringCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Load every profile in `ids`, at most `concurrency` at a time.
    /// Members whose profile fails to load are dropped.
    pub async fn load_profiles(&self, ids: &[String]) -> Vec<MemberProfile> {
        let semaphore = Semaphore::new(self.options.concurrency.max(1));
        let loads = ids.iter().map(|id| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match load_profile(&self.source, id).await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        warn!(member = %id, error = %e, "Skipping member profile");
                        None
                    }
                }
            }
        });
        join_all(loads).await.into_iter().flatten().collect()
    }

    /// Publications of one member: Semantic Scholar when enabled and the
    /// member has an author id, otherwise (or when that yields nothing) the
    /// local `publications.json`.
    pub async fn member_publications(&self, profile: &MemberProfile) -> Vec<RawPublication> {
        if let Some(remote) = self.remote_publications(profile).await {
            if !remote.is_empty() {
                return remote;
            }
            debug!(member = %profile.id, "No remote papers, using local file");
        }
        load_local_publications(&self.source, &profile.id).await
    }

    async fn remote_publications(&self, profile: &MemberProfile) -> Option<Vec<RawPublication>> {
        if !self.options.remote || profile.semantic_scholar_ids.is_empty() {
            return None;
        }
        let client = self.semantic_scholar.as_ref()?;

        let key = member_key(&profile.id);
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get::<Vec<RawPublication>>(&key)) {
            debug!(member = %profile.id, count = cached.len(), "Using cached papers");
            return Some(cached);
        }

        let papers = client
            .recent_papers(&profile.semantic_scholar_ids, self.options.max_remote)
            .await;
        if !papers.is_empty() {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put(&key, &papers) {
                    warn!(member = %profile.id, error = %e, "Failed to cache papers");
                }
            }
        }
        Some(papers)
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the manifest cannot be read or when no profile loads.
    pub async fn load(&self) -> Result<Aggregate> {
        let started = Instant::now();
        let ids = load_manifest(&self.source).await?;
        info!(members = ids.len(), "Loaded manifest");

        let profiles = self.load_profiles(&ids).await;
        if profiles.is_empty() {
            return Err(LabsiteError::NoProfiles);
        }

        let semaphore = Semaphore::new(self.options.concurrency.max(1));
        let loads = profiles.iter().map(|profile| {
            let semaphore = &semaphore;
            async move {
                match semaphore.acquire().await {
                    Ok(_permit) => self.member_publications(profile).await,
                    Err(_) => Vec::new(),
                }
            }
        });
        let per_member: Vec<Vec<RawPublication>> = join_all(loads).await;

        let raw_count: usize = per_member.iter().map(Vec::len).sum();
        let matcher = self.options.matching.matcher();
        let mut publications = aggregate_publications(&profiles, &per_member, matcher.as_ref());

        if self.options.enrich {
            if let Some(enricher) = &self.enricher {
                enricher.enrich(&mut publications, self.cache.as_ref()).await;
            }
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save() {
                warn!(error = %e, "Failed to save cache");
            }
        }

        info!(
            profiles = profiles.len(),
            raw = raw_count,
            merged = publications.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation complete"
        );

        Ok(Aggregate {
            profiles,
            publications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::ExactAliasMatcher;
    use crate::source::FsSource;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Filesystem source that records the peak number of in-flight reads.
    struct CountingSource {
        inner: FsSource,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingSource {
        fn new(root: &Path) -> Self {
            Self {
                inner: FsSource::new(root),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl SiteSource for CountingSource {
        async fn fetch_text(&self, path: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let text = self.inner.fetch_text(path).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            text
        }

        async fn exists(&self, path: &str) -> bool {
            self.inner.exists(path).await
        }
    }

    fn remote_profile() -> MemberProfile {
        MemberProfile {
            id: "klee".into(),
            name: "K. Lee".into(),
            semantic_scholar_ids: vec!["42".into()],
            ..Default::default()
        }
    }

    fn unreachable_s2() -> Result<SemanticScholarClient> {
        Ok(SemanticScholarClient::new(Some("test".into()))?.with_base_url("http://127.0.0.1:9"))
    }

    fn write(root: &Path, path: &str, content: &str) -> Result<()> {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, content)?;
        Ok(())
    }

    fn site() -> Result<TempDir> {
        let dir = TempDir::new()?;
        let root = dir.path();
        write(root, "members/manifest.json", r#"["jdoe", "klee", "ghost"]"#)?;
        write(
            root,
            "members/jdoe/profile.json",
            r#"{"name": ["Jane Doe", "J. Doe"], "categories": ["Photonics"], "photo": "img/jdoe.jpg"}"#,
        )?;
        write(
            root,
            "members/jdoe/publications.json",
            r#"[{"title": "A Study", "year": 2023, "authors": ["J. Doe"]},
                {"title": "Older Work", "year": 2019, "venue": "Optica", "authors": ["Jane Doe"]}]"#,
        )?;
        write(
            root,
            "members/klee/profile.json",
            r#"{"name": "K. Lee", "topics": ["Quantum"]}"#,
        )?;
        write(
            root,
            "members/klee/publications.json",
            r#"{"publications": [{"doi": "10.1/x", "title": "A Study", "year": 2023,
                                   "authors": ["Jane Doe", "K. Lee"]}]}"#,
        )?;
        // "ghost" has no profile.json and must not break the load.
        Ok(dir)
    }

    #[tokio::test]
    async fn test_load_merges_across_members() -> Result<()> {
        let dir = site()?;
        let options = AggregatorOptions {
            concurrency: 1,
            matching: MatchStrategy::Exact,
            ..Default::default()
        };
        let aggregator = Aggregator::new(FsSource::new(dir.path()), options);
        let aggregate = aggregator.load().await?;

        let ids: Vec<_> = aggregate.profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["jdoe", "klee"]);

        assert_eq!(aggregate.publications.len(), 2);
        let study = &aggregate.publications[0];
        assert_eq!(study.title, "A Study");
        assert_eq!(study.doi.as_deref(), Some("10.1/x"));
        assert_eq!(study.authors, vec!["J. Doe", "Jane Doe", "K. Lee"]);
        let group: Vec<_> = study.group_authors.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(group, vec!["jdoe", "klee"]);
        assert_eq!(study.categories, vec!["Photonics", "Quantum"]);
        assert_eq!(study.group_authors[0].photo.as_deref(), Some("img/jdoe.jpg"));

        assert_eq!(aggregate.publications[1].title, "Older Work");
        Ok(())
    }

    #[tokio::test]
    async fn test_load_without_profiles_fails() -> Result<()> {
        let dir = TempDir::new()?;
        write(dir.path(), "members/manifest.json", r#"{"members": ["nobody"]}"#)?;
        let aggregator = Aggregator::new(FsSource::new(dir.path()), AggregatorOptions::default());
        assert!(matches!(aggregator.load().await, Err(LabsiteError::NoProfiles)));
        Ok(())
    }

    #[tokio::test]
    async fn test_member_without_author_id_uses_local_file() -> Result<()> {
        let dir = site()?;
        let options = AggregatorOptions {
            remote: true,
            ..Default::default()
        };
        let aggregator = Aggregator::new(FsSource::new(dir.path()), options);
        let profile = load_profile(aggregator.source(), "jdoe").await?;
        assert_eq!(aggregator.member_publications(&profile).await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_papers_skip_semantic_scholar() -> Result<()> {
        let dir = site()?;
        let cache = ExpiringCache::open(dir.path().join("cache.json"), chrono::Duration::hours(1));
        let cached = vec![RawPublication {
            title: Some("Cached Paper".into()),
            year: Some(2024),
            ..Default::default()
        }];
        cache.put(&member_key("klee"), &cached)?;

        let options = AggregatorOptions {
            remote: true,
            ..Default::default()
        };
        let aggregator = Aggregator::new(FsSource::new(dir.path()), options)
            .with_semantic_scholar(unreachable_s2()?)
            .with_cache(cache);
        assert_eq!(aggregator.member_publications(&remote_profile()).await, cached);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_remote_falls_back_to_local_file() -> Result<()> {
        let dir = site()?;
        let cache = ExpiringCache::open(dir.path().join("cache.json"), chrono::Duration::hours(1));
        let options = AggregatorOptions {
            remote: true,
            ..Default::default()
        };
        let aggregator = Aggregator::new(FsSource::new(dir.path()), options)
            .with_semantic_scholar(unreachable_s2()?)
            .with_cache(cache);

        let papers = aggregator.member_publications(&remote_profile()).await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].doi.as_deref(), Some("10.1/x"));

        let cache = aggregator.cache.as_ref().expect("cache configured");
        assert!(cache.get::<Vec<RawPublication>>(&member_key("klee")).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrency_one_serializes_fetches() -> Result<()> {
        let dir = site()?;
        let options = AggregatorOptions {
            concurrency: 1,
            ..Default::default()
        };
        let aggregator = Aggregator::new(CountingSource::new(dir.path()), options);
        let aggregate = aggregator.load().await?;
        assert_eq!(aggregate.profiles.len(), 2);
        assert_eq!(aggregator.source().peak(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_honoured() -> Result<()> {
        let dir = site()?;
        let options = AggregatorOptions {
            concurrency: 2,
            ..Default::default()
        };
        let aggregator = Aggregator::new(CountingSource::new(dir.path()), options);
        aggregator.load().await?;
        assert_eq!(aggregator.source().peak(), 2);
        Ok(())
    }

    #[test]
    fn test_aggregate_publications_exact_matching() {
        let profiles = vec![MemberProfile {
            id: "a".into(),
            name: "Ada Byron".into(),
            categories: vec!["Optics".into()],
            ..Default::default()
        }];
        let per_member = vec![vec![RawPublication {
            title: Some("Notes".into()),
            year: Some(2020),
            authors: vec!["ada byron".into()],
            ..Default::default()
        }]];
        let pubs = aggregate_publications(&profiles, &per_member, &ExactAliasMatcher);
        assert_eq!(pubs[0].group_authors.len(), 1);
        assert_eq!(pubs[0].categories, vec!["Optics"]);
    }
}
