//! Filtering and pagination over an aggregate.
//!
//! [`PublicationBrowser`] owns the whole state of the publications page: the
//! loaded records, the active filter, the filtered list and how much of it is
//! visible.

use crate::aggregator::Aggregate;
use crate::merge::normalize_text;
use crate::model::{MemberProfile, MergedPublication};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Results shown per page
pub const DEFAULT_PAGE_SIZE: usize = 24;

/// Active filter. Empty fields match everything; set fields compose by AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationFilter {
    /// Free text over title, venue and group-author names
    #[serde(default, rename = "q")]
    pub query: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Member id
    #[serde(default)]
    pub member: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl PublicationFilter {
    pub fn is_empty(&self) -> bool {
        self.normalized_query().is_none()
            && self.year.is_none()
            && self.member.as_deref().map_or(true, str::is_empty)
            && self.category.as_deref().map_or(true, str::is_empty)
    }

    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(normalize_text)
            .filter(|q| !q.is_empty())
    }

    pub fn matches(&self, publication: &MergedPublication) -> bool {
        let by_year = self.year.map_or(true, |year| publication.year == Some(year));

        let by_member = match self.member.as_deref().filter(|m| !m.is_empty()) {
            Some(member) => publication.group_authors.iter().any(|a| a.id == member),
            None => true,
        };

        let by_category = match self.category.as_deref().filter(|c| !c.is_empty()) {
            Some(category) => publication.categories.iter().any(|c| c == category),
            None => true,
        };

        let by_text = match self.normalized_query() {
            Some(query) => {
                normalize_text(&publication.title).contains(&query)
                    || normalize_text(&publication.venue).contains(&query)
                    || publication
                        .group_authors
                        .iter()
                        .any(|a| normalize_text(&a.name).contains(&query))
            }
            None => true,
        };

        by_year && by_member && by_category && by_text
    }
}

/// A selectable author in the author filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorOption {
    pub id: String,
    pub name: String,
}

/// Values offered by the filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Distinct years, newest first
    pub years: Vec<i32>,
    /// Loaded members, roster order
    pub authors: Vec<AuthorOption>,
    /// Distinct categories, sorted
    pub categories: Vec<String>,
}

impl FilterOptions {
    pub fn from_aggregate(profiles: &[MemberProfile], publications: &[MergedPublication]) -> Self {
        let years: BTreeSet<i32> = publications.iter().filter_map(|p| p.year).collect();
        let categories: BTreeSet<&str> = publications
            .iter()
            .flat_map(|p| p.categories.iter().map(String::as_str))
            .collect();

        Self {
            years: years.into_iter().rev().collect(),
            authors: profiles
                .iter()
                .map(|p| AuthorOption {
                    id: p.id.clone(),
                    name: p.name.clone(),
                })
                .collect(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty() && self.authors.is_empty() && self.categories.is_empty()
    }
}

/// Filter + "load more" controller for the publications page.
#[derive(Debug, Clone)]
pub struct PublicationBrowser {
    all: Vec<MergedPublication>,
    options: FilterOptions,
    filter: PublicationFilter,
    filtered: Vec<usize>,
    visible: usize,
    page_size: usize,
}

impl PublicationBrowser {
    pub fn new(aggregate: Aggregate, page_size: usize) -> Self {
        let options = FilterOptions::from_aggregate(&aggregate.profiles, &aggregate.publications);
        let mut browser = Self {
            all: aggregate.publications,
            options,
            filter: PublicationFilter::default(),
            filtered: Vec::new(),
            visible: 0,
            page_size: page_size.max(1),
        };
        browser.apply(PublicationFilter::default());
        browser
    }

    /// Browser for a page whose load failed: no records, no filter options.
    pub fn empty(page_size: usize) -> Self {
        Self::new(Aggregate::default(), page_size)
    }

    /// Replace the filter and go back to the first page.
    pub fn apply(&mut self, filter: PublicationFilter) {
        self.filtered = self
            .all
            .iter()
            .enumerate()
            .filter(|(_, p)| filter.matches(p))
            .map(|(i, _)| i)
            .collect();
        self.filter = filter;
        self.visible = self.page_size.min(self.filtered.len());
    }

    /// Reset every filter field.
    pub fn clear(&mut self) {
        self.apply(PublicationFilter::default());
    }

    /// Reveal one more page of the current results. Returns how many records
    /// became visible.
    pub fn load_more(&mut self) -> usize {
        let before = self.visible;
        self.visible = (self.visible + self.page_size).min(self.filtered.len());
        self.visible - before
    }

    /// Make the first `pages` pages visible.
    pub fn show_pages(&mut self, pages: usize) {
        self.visible = pages
            .max(1)
            .saturating_mul(self.page_size)
            .min(self.filtered.len());
    }

    /// Make every matching record visible.
    pub fn show_all(&mut self) {
        self.visible = self.filtered.len();
    }

    pub fn visible(&self) -> impl Iterator<Item = &MergedPublication> {
        self.filtered[..self.visible].iter().map(|&i| &self.all[i])
    }

    pub fn visible_count(&self) -> usize {
        self.visible
    }

    pub fn has_more(&self) -> bool {
        self.visible < self.filtered.len()
    }

    /// Number of records matching the filter.
    pub fn matching(&self) -> usize {
        self.filtered.len()
    }

    pub fn total(&self) -> usize {
        self.all.len()
    }

    pub fn filter(&self) -> &PublicationFilter {
        &self.filter
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupAuthor;

    fn publication(title: &str, year: i32, venue: &str, members: &[(&str, &str)], categories: &[&str]) -> MergedPublication {
        MergedPublication {
            title: title.into(),
            year: Some(year),
            venue: venue.into(),
            group_authors: members
                .iter()
                .map(|(id, name)| GroupAuthor {
                    id: id.to_string(),
                    name: name.to_string(),
                    photo: None,
                })
                .collect(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn aggregate() -> Aggregate {
        Aggregate {
            profiles: vec![
                MemberProfile { id: "jdoe".into(), name: "Jane Doe".into(), ..Default::default() },
                MemberProfile { id: "klee".into(), name: "Kim Lee".into(), ..Default::default() },
            ],
            publications: vec![
                publication("Squeezed Light", 2023, "Optica", &[("jdoe", "Jane Doe")], &["Photonics"]),
                publication("Qubit Routing", 2023, "PRX Quantum", &[("klee", "Kim Lee")], &["Quantum"]),
                publication("Joint Work", 2021, "Nature", &[("jdoe", "Jane Doe"), ("klee", "Kim Lee")], &["Photonics", "Quantum"]),
                publication("External", 2020, "arXiv", &[], &[]),
            ],
        }
    }

    #[test]
    fn test_filter_options() {
        let browser = PublicationBrowser::new(aggregate(), 24);
        let options = browser.options();
        assert_eq!(options.years, vec![2023, 2021, 2020]);
        assert_eq!(options.categories, vec!["Photonics", "Quantum"]);
        let ids: Vec<_> = options.authors.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["jdoe", "klee"]);
    }

    #[test]
    fn test_filters_compose() {
        let mut browser = PublicationBrowser::new(aggregate(), 24);
        assert_eq!(browser.matching(), 4);

        browser.apply(PublicationFilter {
            category: Some("Quantum".into()),
            ..Default::default()
        });
        let titles: Vec<_> = browser.visible().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Qubit Routing", "Joint Work"]);

        browser.apply(PublicationFilter {
            category: Some("Quantum".into()),
            member: Some("jdoe".into()),
            ..Default::default()
        });
        assert_eq!(browser.matching(), 1);

        browser.apply(PublicationFilter {
            query: Some("  kim   LEE ".into()),
            year: Some(2023),
            ..Default::default()
        });
        let titles: Vec<_> = browser.visible().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Qubit Routing"]);

        browser.apply(PublicationFilter {
            query: Some("nature".into()),
            ..Default::default()
        });
        assert_eq!(browser.matching(), 1);

        browser.clear();
        assert!(browser.filter().is_empty());
        assert_eq!(browser.matching(), 4);
    }

    #[test]
    fn test_load_more_extends_slice() {
        let mut browser = PublicationBrowser::new(aggregate(), 3);
        assert_eq!(browser.visible_count(), 3);
        assert!(browser.has_more());
        assert_eq!(browser.load_more(), 1);
        assert!(!browser.has_more());
        assert_eq!(browser.load_more(), 0);

        browser.apply(PublicationFilter::default());
        assert_eq!(browser.visible_count(), 3);
        browser.show_pages(5);
        assert_eq!(browser.visible_count(), 4);

        browser.apply(PublicationFilter::default());
        browser.show_pages(usize::MAX);
        assert_eq!(browser.visible_count(), 4);
        browser.apply(PublicationFilter::default());
        browser.show_all();
        assert!(!browser.has_more());
    }

    #[test]
    fn test_empty_browser_has_no_options() {
        let browser = PublicationBrowser::empty(24);
        assert!(browser.options().is_empty());
        assert_eq!(browser.visible().count(), 0);
        assert!(!browser.has_more());
    }
}
