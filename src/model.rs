//! Site data model.
//!
//! Member profiles and publication records arrive as loosely shaped JSON
//! (hand-edited files and tool output). The `*Document` types absorb that
//! variation; the public types are what the rest of the crate works with.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A group member, loaded once per session from `members/<id>/profile.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: String,
    /// Display name
    pub name: String,
    /// Other spellings of the name as they appear on papers
    pub aliases: Vec<String>,
    /// Research category tags
    pub categories: Vec<String>,
    pub photo: Option<String>,
    /// Semantic Scholar author ids
    pub semantic_scholar_ids: Vec<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub orcid: Option<String>,
    pub scholar: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
}

impl MemberProfile {
    /// Build a profile from its JSON document. `fallback_id` is the manifest id,
    /// used when the document has no `id` or `name` of its own.
    pub fn from_document(fallback_id: &str, doc: ProfileDocument) -> Self {
        let (name, mut aliases) = match doc.name {
            Some(NameField::Many(names)) if !names.is_empty() => {
                let mut names = names.into_iter();
                let display = names.next().unwrap_or_default();
                (display, names.collect())
            }
            Some(NameField::One(name)) if !name.trim().is_empty() => (name, Vec::new()),
            _ => (fallback_id.to_string(), Vec::new()),
        };
        aliases.extend(doc.aliases);

        let categories = if doc.categories.is_empty() {
            doc.topics
        } else {
            doc.categories
        };

        let semantic_scholar_ids = match doc.semantic_scholar_id {
            Some(ids) => ids.into_ids(),
            None => Vec::new(),
        };

        Self {
            id: doc
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| fallback_id.to_string()),
            name,
            aliases,
            categories,
            photo: non_empty(doc.photo),
            semantic_scholar_ids,
            role: non_empty(doc.role),
            email: non_empty(doc.email),
            phone: non_empty(doc.phone),
            orcid: non_empty(doc.orcid),
            scholar: non_empty(doc.scholar),
            linkedin: non_empty(doc.linkedin),
            github: non_empty(doc.github),
            website: non_empty(doc.website),
        }
    }

    /// Display name followed by all aliases.
    pub fn name_variants(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Raw shape of `profile.json`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_name")]
    name: Option<NameField>,
    #[serde(default, deserialize_with = "string_list")]
    aliases: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    categories: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    topics: Vec<String>,
    #[serde(default, deserialize_with = "string_only")]
    photo: Option<String>,
    #[serde(rename = "semanticScholarId", default)]
    semantic_scholar_id: Option<IdField>,
    #[serde(default, deserialize_with = "lenient_string")]
    role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    orcid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    scholar: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    linkedin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    github: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    website: Option<String>,
}

#[derive(Debug)]
enum NameField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdField {
    Text(String),
    Number(i64),
    Many(Vec<Value>),
}

impl IdField {
    fn into_ids(self) -> Vec<String> {
        let ids = match self {
            IdField::Text(id) => vec![id],
            IdField::Number(n) => vec![n.to_string()],
            IdField::Many(values) => values.into_iter().filter_map(scalar_to_string).collect(),
        };
        ids.into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A string or number; any other value is treated as missing.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_to_string))
}

fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Name as one string or a list of spellings. Non-string entries are skipped.
fn lenient_name<'de, D>(deserializer: D) -> Result<Option<NameField>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(NameField::Many(
            items.into_iter().filter_map(scalar_to_string).collect(),
        )),
        Some(other) => scalar_to_string(other).map(NameField::One),
        None => None,
    })
}

/// Accepts a list of strings, tolerating `null` and non-string entries.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    })
}

/// A publication as stored in a member's `publications.json` or returned by an
/// author lookup, before cross-member merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPublication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_year", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, deserialize_with = "author_names", skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

impl RawPublication {
    pub fn title_str(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn venue_str(&self) -> &str {
        self.venue.as_deref().unwrap_or("")
    }

    pub fn url_str(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    /// DOI with surrounding whitespace removed, `None` when blank.
    pub fn doi_str(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

/// Year as a number or a numeric string; anything else is treated as missing.
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Authors as plain strings or as `{ "name": ... }` objects.
fn author_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(de::Error::custom(format!("authors must be a list, got {}", other)))
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Object(mut map) => map.remove("name").and_then(scalar_to_string),
            _ => None,
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// A roster member credited on a merged publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAuthor {
    pub id: String,
    pub name: String,
    pub photo: Option<String>,
}

impl From<&MemberProfile> for GroupAuthor {
    fn from(profile: &MemberProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            photo: profile.photo.clone(),
        }
    }
}

/// A publication after cross-member deduplication and enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedPublication {
    pub title: String,
    pub year: Option<i32>,
    pub venue: String,
    pub doi: Option<String>,
    pub url: String,
    /// Every author name seen across sources
    pub authors: Vec<String>,
    pub group_authors: Vec<GroupAuthor>,
    pub categories: Vec<String>,
}

/// Member ids from `members/manifest.json`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ManifestDocument {
    List(Vec<String>),
    Wrapped { members: Vec<String> },
}

impl ManifestDocument {
    pub fn into_ids(self) -> Vec<String> {
        match self {
            ManifestDocument::List(ids) | ManifestDocument::Wrapped { members: ids } => ids,
        }
    }
}

/// Extract publication records from a `publications.json` document, which is
/// either an array or `{ "publications": [...] }`.
///
/// Returns `None` when the document holds no such array. Entries that are not
/// publication objects are skipped.
pub fn publications_from_value(member: &str, value: Value) -> Option<Vec<RawPublication>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("publications") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let records = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawPublication>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(member = member, error = %e, "Skipping malformed publication entry");
                None
            }
        })
        .collect();
    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(id: &str, value: Value) -> MemberProfile {
        let doc: ProfileDocument = serde_json::from_value(value).expect("valid profile document");
        MemberProfile::from_document(id, doc)
    }

    #[test]
    fn test_profile_name_array_becomes_aliases() {
        let p = profile(
            "jdoe",
            json!({"name": ["Jane Doe", "J. Doe"], "aliases": ["Jane A. Doe"], "topics": ["Optics"]}),
        );
        assert_eq!(p.id, "jdoe");
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.aliases, vec!["J. Doe", "Jane A. Doe"]);
        assert_eq!(p.categories, vec!["Optics"]);
    }

    #[test]
    fn test_profile_defaults_and_ids() {
        let p = profile(
            "klee",
            json!({"categories": ["Photonics"], "topics": ["Ignored"], "semanticScholarId": [123, "456", null], "photo": ""}),
        );
        assert_eq!(p.name, "klee");
        assert_eq!(p.categories, vec!["Photonics"]);
        assert_eq!(p.semantic_scholar_ids, vec!["123", "456"]);
        assert_eq!(p.photo, None);

        let single = profile("x", json!({"name": "X", "semanticScholarId": 42}));
        assert_eq!(single.semantic_scholar_ids, vec!["42"]);
    }

    #[test]
    fn test_profile_tolerates_non_string_fields() {
        let p = profile(
            "abyron",
            json!({"name": ["Ada Byron", 7, "A. Byron"], "photo": false, "phone": 5551234, "email": null, "role": {"x": 1}}),
        );
        assert_eq!(p.name, "Ada Byron");
        assert_eq!(p.aliases, vec!["7", "A. Byron"]);
        assert_eq!(p.photo, None);
        assert_eq!(p.phone.as_deref(), Some("5551234"));
        assert_eq!(p.email, None);
        assert_eq!(p.role, None);

        let numeric = profile("n", json!({"name": 12, "id": 34, "photo": 1}));
        assert_eq!(numeric.name, "12");
        assert_eq!(numeric.id, "34");
        assert_eq!(numeric.photo, None);
    }

    #[test]
    fn test_publication_lenient_fields() {
        let record: RawPublication = serde_json::from_value(json!({
            "title": "Paper",
            "year": "2021",
            "authors": ["A. One", {"name": "B. Two", "authorId": "9"}, 7],
            "paperId": "abc"
        }))
        .expect("valid record");
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.authors, vec!["A. One", "B. Two"]);
        assert_eq!(record.paper_id.as_deref(), Some("abc"));
        assert_eq!(record.doi_str(), None);
    }

    #[test]
    fn test_publications_document_shapes() {
        let wrapped = json!({"publications": [{"title": "One"}, "not a record", {"title": "Two"}]});
        let records = publications_from_value("m", wrapped).expect("wrapped array");
        assert_eq!(records.len(), 2);

        let bare = json!([{"title": "Only"}]);
        assert_eq!(publications_from_value("m", bare).map(|r| r.len()), Some(1));

        assert!(publications_from_value("m", json!({"papers": []})).is_none());
    }

    #[test]
    fn test_manifest_shapes() {
        let list: ManifestDocument = serde_json::from_value(json!(["a", "b"])).expect("list");
        assert_eq!(list.into_ids(), vec!["a", "b"]);
        let wrapped: ManifestDocument =
            serde_json::from_value(json!({"members": ["c"]})).expect("wrapped");
        assert_eq!(wrapped.into_ids(), vec!["c"]);
        assert!(serde_json::from_value::<ManifestDocument>(json!({"people": []})).is_err());
    }
}
