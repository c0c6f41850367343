//! Cross-member publication deduplication.
//!
//! Records are keyed by lowercased DOI, then by normalized title, then by a
//! synthetic year + random-suffix key. The synthetic key exists so that every
//! record has one; two untitled, DOI-less records are never merged and the same
//! record gets a different key on every load.

use crate::model::{MergedPublication, RawPublication};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Deduplication key of a raw record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicationKey {
    Doi(String),
    Title(String),
    Synthetic(String),
}

impl fmt::Display for PublicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationKey::Doi(doi) => write!(f, "doi:{}", doi),
            PublicationKey::Title(title) => write!(f, "t:{}", title),
            PublicationKey::Synthetic(key) => write!(f, "u:{}", key),
        }
    }
}

/// Lowercase and collapse runs of whitespace into single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Compute the deduplication key of a record.
pub fn key_for(record: &RawPublication) -> PublicationKey {
    if let Some(doi) = record.doi_str() {
        return PublicationKey::Doi(doi.to_lowercase());
    }

    let title = normalize_text(record.title_str());
    if !title.is_empty() {
        return PublicationKey::Title(title);
    }

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    PublicationKey::Synthetic(format!("{}:{}", record.year.unwrap_or(0), suffix.to_lowercase()))
}

/// Venue strings that only say "this is a preprint".
pub fn is_arxiv_placeholder(venue: &str) -> bool {
    venue.to_lowercase().contains("arxiv")
}

/// Empty or dead-link URLs.
pub fn is_placeholder_url(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "#"
}

/// Accumulates raw records into merged publications.
#[derive(Debug, Default)]
pub struct PublicationMerger {
    records: Vec<MergedPublication>,
    by_key: HashMap<PublicationKey, usize>,
    by_title: HashMap<String, usize>,
}

impl PublicationMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one record, merging it into an existing publication when the DOI
    /// matches, or when the titles match and at most one side carries a DOI.
    pub fn add(&mut self, record: &RawPublication) {
        let key = key_for(record);
        let title = normalize_text(record.title_str());

        let existing = self.by_key.get(&key).copied().or_else(|| {
            if title.is_empty() {
                return None;
            }
            self.by_title.get(&title).copied().filter(|&idx| {
                self.records[idx].doi.is_none() || record.doi_str().is_none()
            })
        });

        let idx = match existing {
            Some(idx) => {
                merge_into(&mut self.records[idx], record);
                idx
            }
            None => {
                self.records.push(new_publication(record));
                self.records.len() - 1
            }
        };

        self.by_key.entry(key).or_insert(idx);
        if let Some(doi) = &self.records[idx].doi {
            self.by_key
                .entry(PublicationKey::Doi(doi.to_lowercase()))
                .or_insert(idx);
        }
        if !title.is_empty() {
            self.by_title.entry(title).or_insert(idx);
        }
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a RawPublication>) {
        for record in records {
            self.add(record);
        }
    }

    pub fn into_publications(self) -> Vec<MergedPublication> {
        self.records
    }
}

fn new_publication(record: &RawPublication) -> MergedPublication {
    let mut authors = Vec::new();
    union_authors(&mut authors, &record.authors);
    MergedPublication {
        title: record.title_str().trim().to_string(),
        year: record.year,
        venue: record.venue_str().trim().to_string(),
        doi: record.doi_str().map(str::to_string),
        url: record.url_str().trim().to_string(),
        authors,
        group_authors: Vec::new(),
        categories: Vec::new(),
    }
}

fn merge_into(target: &mut MergedPublication, record: &RawPublication) {
    if target.doi.is_none() {
        target.doi = record.doi_str().map(str::to_string);
    }
    if target.title.is_empty() {
        target.title = record.title_str().trim().to_string();
    }
    if target.year.is_none() {
        target.year = record.year;
    }

    let venue = record.venue_str().trim();
    let replace_venue = target.venue.is_empty()
        || (is_arxiv_placeholder(&target.venue) && !is_arxiv_placeholder(venue));
    if replace_venue && !venue.is_empty() {
        target.venue = venue.to_string();
    }

    let url = record.url_str().trim();
    if is_placeholder_url(&target.url) && !is_placeholder_url(url) {
        target.url = url.to_string();
    }

    union_authors(&mut target.authors, &record.authors);
}

/// Case-insensitive set union keeping first-seen spelling and order.
fn union_authors(target: &mut Vec<String>, incoming: &[String]) {
    let mut seen: HashSet<String> = target.iter().map(|a| a.to_lowercase()).collect();
    for author in incoming {
        let author = author.trim();
        if author.is_empty() {
            continue;
        }
        if seen.insert(author.to_lowercase()) {
            target.push(author.to_string());
        }
    }
}

/// Merge every record of every member into a deduplicated list.
pub fn merge_all<'a>(records: impl IntoIterator<Item = &'a RawPublication>) -> Vec<MergedPublication> {
    let mut merger = PublicationMerger::new();
    merger.extend(records);
    merger.into_publications()
}

/// Newest first, then by title.
pub fn compare_publications(a: &MergedPublication, b: &MergedPublication) -> Ordering {
    b.year
        .unwrap_or(0)
        .cmp(&a.year.unwrap_or(0))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

pub fn sort_publications(publications: &mut [MergedPublication]) {
    publications.sort_by(compare_publications);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, year: Option<i32>, doi: Option<&str>, authors: &[&str]) -> RawPublication {
        RawPublication {
            title: Some(title.to_string()),
            year,
            doi: doi.map(str::to_string),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_priority() {
        let with_doi = raw("A Study", Some(2023), Some("10.1/X"), &[]);
        assert_eq!(key_for(&with_doi).to_string(), "doi:10.1/x");

        let titled = raw("  A   Study ", Some(2023), None, &[]);
        assert_eq!(key_for(&titled).to_string(), "t:a study");

        let untitled = raw("", Some(2020), None, &[]);
        let key = key_for(&untitled).to_string();
        assert!(key.starts_with("u:2020:"));
        assert_eq!(key.len(), "u:2020:".len() + 6);
    }

    #[test]
    fn test_title_record_merges_with_doi_record() {
        let records = vec![
            raw("A Study", Some(2023), None, &["J. Doe"]),
            raw("A Study", Some(2023), Some("10.1/x"), &["Jane Doe", "K. Lee"]),
        ];
        let merged = merge_all(&records);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].doi.as_deref(), Some("10.1/x"));
        assert_eq!(merged[0].authors, vec!["J. Doe", "Jane Doe", "K. Lee"]);
    }

    #[test]
    fn test_same_doi_unions_authors_case_insensitively() {
        let records = vec![
            raw("Paper", Some(2022), Some("10.5/ABC"), &["A. One", "b. two"]),
            raw("Paper (preprint)", Some(2022), Some("10.5/abc"), &["B. Two", "C. Three"]),
        ];
        let merged = merge_all(&records);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Paper");
        assert_eq!(merged[0].authors, vec!["A. One", "b. two", "C. Three"]);
    }

    #[test]
    fn test_different_dois_with_same_title_stay_apart() {
        let records = vec![
            raw("Erratum", Some(2021), Some("10.1/a"), &[]),
            raw("Erratum", Some(2022), Some("10.1/b"), &[]),
        ];
        assert_eq!(merge_all(&records).len(), 2);
    }

    #[test]
    fn test_venue_and_url_preferences() {
        let mut first = raw("Paper", Some(2022), Some("10.1/p"), &[]);
        first.venue = Some("arXiv".to_string());
        first.url = Some("#".to_string());
        let mut second = raw("Paper", Some(2022), Some("10.1/p"), &[]);
        second.venue = Some("Physical Review Letters".to_string());
        second.url = Some("https://doi.org/10.1/p".to_string());
        let mut third = raw("Paper", Some(2022), Some("10.1/p"), &[]);
        third.venue = Some("Optica".to_string());

        let merged = merge_all(&[first, second, third]);
        assert_eq!(merged[0].venue, "Physical Review Letters");
        assert_eq!(merged[0].url, "https://doi.org/10.1/p");
    }

    #[test]
    fn test_untitled_records_never_merge() {
        let records = vec![raw("", Some(2020), None, &["X"]), raw("", Some(2020), None, &["X"])];
        assert_eq!(merge_all(&records).len(), 2);
    }

    #[test]
    fn test_sort_order_is_total() {
        let mut pubs = vec![
            MergedPublication { title: "beta".into(), year: Some(2022), ..Default::default() },
            MergedPublication { title: "Alpha".into(), year: Some(2022), ..Default::default() },
            MergedPublication { title: "Zed".into(), year: None, ..Default::default() },
            MergedPublication { title: "alpha".into(), year: Some(2022), ..Default::default() },
            MergedPublication { title: "Old".into(), year: Some(2019), ..Default::default() },
        ];
        sort_publications(&mut pubs);
        let titles: Vec<_> = pubs.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "alpha", "beta", "Old", "Zed"]);

        for pair in pubs.windows(2) {
            assert_ne!(compare_publications(&pair[0], &pair[1]), Ordering::Greater);
        }
    }
}
