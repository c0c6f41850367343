//! Refresh members' local `publications.json` from Semantic Scholar.
//!
//! Writes go to the local site tree only. Each member is handled on its own:
//! a failed lookup leaves that member's existing file untouched.

use crate::documents::{load_manifest, load_profile, publications_path};
use crate::error::{LabsiteError, Result};
use crate::model::{MemberProfile, RawPublication};
use crate::semanticscholar::SemanticScholarClient;
use crate::source::FsSource;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Length of the title prefix used as a last-resort identity
const TITLE_KEY_LEN: usize = 120;

/// Identity of a paper: id, DOI, URL, then lowercased title prefix.
fn paper_key(paper: &RawPublication) -> Option<String> {
    let non_empty = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    non_empty(&paper.paper_id)
        .or_else(|| non_empty(&paper.doi))
        .or_else(|| non_empty(&paper.url))
        .or_else(|| {
            let title: String = paper.title_str().to_lowercase().chars().take(TITLE_KEY_LEN).collect();
            Some(title).filter(|t| !t.trim().is_empty())
        })
}

/// Drop repeated papers, keeping the first occurrence. Papers without any
/// identity are dropped too.
pub fn dedupe_papers(papers: Vec<RawPublication>) -> Vec<RawPublication> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| paper_key(p).is_some_and(|key| seen.insert(key)))
        .collect()
}

/// Write pretty JSON through a temporary file and rename it into place.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Members whose file was written, with the paper count
    pub written: Vec<(String, usize)>,
    /// Members without a Semantic Scholar id
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Syncs member publication files under a local site root.
pub struct PublicationSync {
    client: SemanticScholarClient,
    source: FsSource,
}

impl PublicationSync {
    pub fn new(client: SemanticScholarClient, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            source: FsSource::new(root),
        }
    }

    /// Fetch and write one member's papers. Fails when every author id
    /// lookup fails.
    pub async fn sync_member(&self, profile: &MemberProfile) -> Result<usize> {
        let mut papers = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;

        for author_id in &profile.semantic_scholar_ids {
            match self.client.author_papers(author_id).await {
                Ok(batch) => {
                    any_ok = true;
                    papers.extend(batch);
                }
                Err(e) => {
                    warn!(member = %profile.id, author = %author_id, error = %e, "Author lookup failed");
                    last_error = Some(e);
                }
            }
        }

        if !any_ok {
            return Err(last_error.unwrap_or_else(|| {
                LabsiteError::Config(format!("{} has no Semantic Scholar id", profile.id))
            }));
        }

        let papers = dedupe_papers(papers);
        let path = self.source.root().join(publications_path(&profile.id));
        write_json_atomic(&path, &papers)?;
        info!(member = %profile.id, count = papers.len(), path = %path.display(), "Wrote publications");
        Ok(papers.len())
    }

    /// Sync every roster member that has a Semantic Scholar id, one at a time.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let ids = load_manifest(&self.source).await?;
        let mut report = SyncReport::default();

        for id in ids {
            let profile = match load_profile(&self.source, &id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(member = %id, error = %e, "Skipping member profile");
                    report.failed.push(id);
                    continue;
                }
            };
            if profile.semantic_scholar_ids.is_empty() {
                report.skipped.push(id);
                continue;
            }
            match self.sync_member(&profile).await {
                Ok(count) => report.written.push((id, count)),
                Err(_) => report.failed.push(id),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paper(id: Option<&str>, doi: Option<&str>, title: &str) -> RawPublication {
        RawPublication {
            paper_id: id.map(str::to_string),
            doi: doi.map(str::to_string),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedupe_papers() {
        let long_a = format!("{}A", "x".repeat(TITLE_KEY_LEN));
        let long_b = format!("{}B", "X".repeat(TITLE_KEY_LEN));
        let papers = vec![
            paper(Some("p1"), None, "First"),
            paper(Some("p1"), Some("10.1/a"), "First again"),
            paper(None, Some("10.1/b"), "Second"),
            paper(None, Some("10.1/b"), "Second copy"),
            paper(None, None, &long_a),
            paper(None, None, &long_b),
            paper(None, None, "  "),
        ];
        let titles: Vec<_> = dedupe_papers(papers).iter().map(|p| p.title_str().to_string()).collect();
        assert_eq!(titles, vec!["First".to_string(), "Second".to_string(), long_a]);
    }

    #[test]
    fn test_write_json_atomic() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("members/a/publications.json");
        write_json_atomic(&path, &vec![paper(Some("p"), None, "T")])?;
        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains(r#""paperId": "p""#));
        assert!(!path.with_extension("json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_all_skips_members_without_ids() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("members/a"))?;
        std::fs::create_dir_all(dir.path().join("members/b"))?;
        std::fs::write(dir.path().join("members/manifest.json"), r#"["a", "b", "c"]"#)?;
        std::fs::write(dir.path().join("members/a/profile.json"), r#"{"name": "A"}"#)?;
        std::fs::write(
            dir.path().join("members/b/profile.json"),
            r#"{"name": "B", "semanticScholarId": 42}"#,
        )?;
        std::fs::write(dir.path().join("members/b/publications.json"), "[]")?;

        let client = SemanticScholarClient::new(Some("test".into()))?.with_base_url("http://127.0.0.1:9");
        let sync = PublicationSync::new(client, dir.path());
        let report = sync.sync_all().await?;

        assert_eq!(report.skipped, vec!["a"]);
        assert_eq!(report.failed, vec!["b", "c"]);
        assert!(report.written.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("members/b/publications.json"))?, "[]");
        Ok(())
    }
}
