//! Site paths and loaders for member documents.

use crate::error::{LabsiteError, Result};
use crate::model::{publications_from_value, ManifestDocument, MemberProfile, ProfileDocument, RawPublication};
use crate::source::{fetch_json, SiteSource};
use serde_json::Value;
use tracing::warn;

pub const MANIFEST_PATH: &str = "members/manifest.json";

pub fn profile_path(id: &str) -> String {
    format!("members/{}/profile.json", id)
}

pub fn publications_path(id: &str) -> String {
    format!("members/{}/publications.json", id)
}

pub fn member_file(id: &str, file: &str) -> String {
    format!("members/{}/{}", id, file)
}

/// Load the roster of member ids.
pub async fn load_manifest<S: SiteSource>(source: &S) -> Result<Vec<String>> {
    let value: Value = fetch_json(source, MANIFEST_PATH).await?;
    let manifest: ManifestDocument = serde_json::from_value(value).map_err(|_| {
        LabsiteError::Parse(r#"manifest.json must be an array or { "members": [...] }"#.to_string())
    })?;
    Ok(manifest
        .into_ids()
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Load and normalize one member profile.
pub async fn load_profile<S: SiteSource>(source: &S, id: &str) -> Result<MemberProfile> {
    let doc: ProfileDocument = fetch_json(source, &profile_path(id)).await?;
    Ok(MemberProfile::from_document(id, doc))
}

/// Load a member's local publication list. Missing or malformed files yield an
/// empty list with a warning.
pub async fn load_local_publications<S: SiteSource>(source: &S, id: &str) -> Vec<RawPublication> {
    let value: Value = match fetch_json(source, &publications_path(id)).await {
        Ok(value) => value,
        Err(e) => {
            warn!(member = id, error = %e, "Skipping publications");
            return Vec::new();
        }
    };

    publications_from_value(id, value).unwrap_or_else(|| {
        warn!(member = id, "publications.json has no array");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FsSource;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_manifest_errors_on_wrong_shape() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("members"))?;
        std::fs::write(dir.path().join(MANIFEST_PATH), r#"{"people": ["a"]}"#)?;
        let source = FsSource::new(dir.path());
        assert!(matches!(load_manifest(&source).await, Err(LabsiteError::Parse(_))));

        std::fs::write(dir.path().join(MANIFEST_PATH), r#"{"members": ["a", " ", "b "]}"#)?;
        assert_eq!(load_manifest(&source).await?, vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_local_publications_tolerate_bad_files() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("members/a"))?;
        std::fs::create_dir_all(dir.path().join("members/b"))?;
        std::fs::write(dir.path().join(publications_path("a")), "{ broken")?;
        std::fs::write(dir.path().join(publications_path("b")), r#"{"items": []}"#)?;
        let source = FsSource::new(dir.path());

        assert!(load_local_publications(&source, "a").await.is_empty());
        assert!(load_local_publications(&source, "b").await.is_empty());
        assert!(load_local_publications(&source, "missing").await.is_empty());
        Ok(())
    }
}
